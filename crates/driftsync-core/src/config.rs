//! Declared-configuration input types
//!
//! These are the read-only structures an external config-loading collaborator
//! hands to the core: the ordered list of declared files and the resolved
//! tool instances they fan out across. The core never parses or validates
//! configuration syntax itself; by the time these types exist they are
//! already validated.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One source-to-target path mapping of a declared file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    /// Absolute path in the canonical source tree
    pub source: PathBuf,
    /// Path relative to the instance's config directory
    pub target: PathBuf,
}

/// How a declared file is materialized at its targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SyncStrategy {
    /// Target must be a symlink pointing at the source
    Symlink,
    /// Every file matching `pattern` under the source is copied to the
    /// corresponding path under the target
    Copy { pattern: String },
}

/// A declared file, asset, or tool-specific config entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredFile {
    /// Logical name, first component of every state key
    pub name: String,
    /// Source-to-target mappings
    pub mappings: Vec<PathMapping>,
    /// When true, the installed target is authoritative and content flows
    /// back into the source tree
    #[serde(default)]
    pub pullback: bool,
    /// Materialization strategy
    pub strategy: SyncStrategy,
}

/// A resolved, physical tool instance (one local directory belonging to one
/// installed AI coding-assistant tool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInstance {
    /// Tool identifier, e.g. `"claude"` or `"cursor"`
    pub tool_id: String,
    /// Instance identifier, unique per tool (a tool may have several
    /// installs or profiles)
    pub instance_id: String,
    /// Human-readable instance name
    pub name: String,
    /// Root configuration directory of this instance
    pub config_dir: PathBuf,
    /// Subdirectory for skill files, when the tool has one
    #[serde(default)]
    pub skills_subdir: Option<String>,
    /// Subdirectory for command files, when the tool has one
    #[serde(default)]
    pub commands_subdir: Option<String>,
    /// Subdirectory for agent files, when the tool has one
    #[serde(default)]
    pub agents_subdir: Option<String>,
    /// Disabled instances are skipped during planning and counted as
    /// undeclared during orphan cleanup
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ToolInstance {
    /// Composite `tool:instance` identifier used in manifest keys.
    pub fn qualified_id(&self) -> String {
        format!("{}:{}", self.tool_id, self.instance_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn instance_defaults_to_enabled() {
        let json = r#"{
            "tool_id": "claude",
            "instance_id": "default",
            "name": "Claude Code",
            "config_dir": "/home/user/.claude"
        }"#;
        let instance: ToolInstance = serde_json::from_str(json).unwrap();
        assert!(instance.enabled);
        assert_eq!(instance.skills_subdir, None);
        assert_eq!(instance.qualified_id(), "claude:default");
    }

    #[test]
    fn strategy_round_trips_tagged() {
        let copy = SyncStrategy::Copy {
            pattern: "**/*.md".to_string(),
        };
        let json = serde_json::to_string(&copy).unwrap();
        assert!(json.contains("\"kind\":\"copy\""));
        assert_eq!(serde_json::from_str::<SyncStrategy>(&json).unwrap(), copy);
    }

    #[test]
    fn declared_file_pullback_defaults_false() {
        let json = r#"{
            "name": "AGENTS.md",
            "mappings": [{"source": "/src/AGENTS.md", "target": "AGENTS.md"}],
            "strategy": {"kind": "symlink"}
        }"#;
        let file: DeclaredFile = serde_json::from_str(json).unwrap();
        assert!(!file.pullback);
        assert_eq!(file.mappings.len(), 1);
    }
}
