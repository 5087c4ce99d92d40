//! Step planning
//!
//! Expands declared files against enabled tool instances into the ordered
//! list of orchestrator steps. Declaration order is preserved: instances in
//! configuration order, files in declaration order, mappings in listed
//! order, so a run report reads the same way the configuration does.

use std::path::{Path, PathBuf};

use crate::backup::{BackupPolicy, DEFAULT_RETENTION};
use crate::config::{DeclaredFile, SyncStrategy, ToolInstance};
use crate::modules::{GlobCopyModule, GlobCopyParams, SymlinkModule};
use crate::orchestrator::OrchestratorStep;

/// Shared inputs the planner threads into every copy module.
#[derive(Debug, Clone)]
pub struct PlanContext {
    /// Sync-state document path
    pub state_path: PathBuf,
    /// Cache root under which backups live
    pub cache_root: PathBuf,
    /// Backups kept per owner
    pub retention: usize,
}

impl PlanContext {
    pub fn new(state_path: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            cache_root: cache_root.into(),
            retention: DEFAULT_RETENTION,
        }
    }
}

/// Build the full step list for one run.
///
/// Disabled instances contribute no steps. Labels take the form
/// `<file name> -> <tool>:<instance>` and are what the orchestrator's
/// apply filter matches against.
pub fn build_steps(
    files: &[DeclaredFile],
    instances: &[ToolInstance],
    ctx: &PlanContext,
) -> Vec<OrchestratorStep> {
    let mut steps = Vec::new();

    for instance in instances.iter().filter(|i| i.enabled) {
        for file in files {
            let label = format!("{} -> {}", file.name, instance.qualified_id());
            for mapping in &file.mappings {
                let target = instance.config_dir.join(&mapping.target);
                let module: Box<dyn crate::modules::SyncModule> = match &file.strategy {
                    SyncStrategy::Symlink => {
                        Box::new(SymlinkModule::new(&mapping.source, target))
                    }
                    SyncStrategy::Copy { pattern } => Box::new(GlobCopyModule::new(
                        copy_params(file, instance, &mapping.source, target, pattern, ctx),
                    )),
                };
                steps.push(OrchestratorStep::new(label.clone(), module));
            }
        }
    }

    tracing::debug!(steps = steps.len(), "planned sync steps");
    steps
}

fn copy_params(
    file: &DeclaredFile,
    instance: &ToolInstance,
    source_dir: &Path,
    target_dir: PathBuf,
    pattern: &str,
    ctx: &PlanContext,
) -> GlobCopyParams {
    GlobCopyParams {
        name: file.name.clone(),
        tool_id: instance.tool_id.clone(),
        instance_id: instance.instance_id.clone(),
        source_dir: source_dir.to_path_buf(),
        target_dir,
        pattern: pattern.to_string(),
        pullback: file.pullback,
        state_path: ctx.state_path.clone(),
        backups: BackupPolicy {
            cache_root: ctx.cache_root.clone(),
            owner: file.name.clone(),
            retention: ctx.retention,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathMapping;
    use pretty_assertions::assert_eq;

    fn ctx() -> PlanContext {
        PlanContext::new("/var/state.json", "/var/cache")
    }

    fn symlink_file(name: &str) -> DeclaredFile {
        DeclaredFile {
            name: name.to_string(),
            mappings: vec![PathMapping {
                source: PathBuf::from("/canonical").join(name),
                target: PathBuf::from(name),
            }],
            pullback: false,
            strategy: SyncStrategy::Symlink,
        }
    }

    fn copy_file(name: &str, pattern: &str) -> DeclaredFile {
        DeclaredFile {
            name: name.to_string(),
            mappings: vec![PathMapping {
                source: PathBuf::from("/canonical").join(name),
                target: PathBuf::from(name),
            }],
            pullback: false,
            strategy: SyncStrategy::Copy {
                pattern: pattern.to_string(),
            },
        }
    }

    fn instance(tool_id: &str, instance_id: &str, enabled: bool) -> ToolInstance {
        ToolInstance {
            tool_id: tool_id.to_string(),
            instance_id: instance_id.to_string(),
            name: tool_id.to_string(),
            config_dir: PathBuf::from("/tools").join(tool_id).join(instance_id),
            skills_subdir: None,
            commands_subdir: None,
            agents_subdir: None,
            enabled,
        }
    }

    #[test]
    fn one_step_per_enabled_instance_file_mapping() {
        let files = vec![symlink_file("AGENTS.md"), copy_file("skills", "**/*.md")];
        let instances = vec![
            instance("claude", "default", true),
            instance("cursor", "work", true),
            instance("codex", "default", false),
        ];

        let steps = build_steps(&files, &instances, &ctx());
        assert_eq!(steps.len(), 4);
    }

    #[test]
    fn labels_name_file_and_qualified_instance() {
        let steps = build_steps(
            &[symlink_file("AGENTS.md")],
            &[instance("claude", "default", true)],
            &ctx(),
        );
        assert_eq!(steps[0].label, "AGENTS.md -> claude:default");
    }

    #[test]
    fn declaration_order_is_preserved() {
        let files = vec![symlink_file("b-second"), symlink_file("a-first")];
        let instances = vec![
            instance("zeta", "default", true),
            instance("alpha", "default", true),
        ];

        let labels: Vec<String> = build_steps(&files, &instances, &ctx())
            .into_iter()
            .map(|s| s.label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "b-second -> zeta:default",
                "a-first -> zeta:default",
                "b-second -> alpha:default",
                "a-first -> alpha:default",
            ]
        );
    }

    #[test]
    fn modules_match_declared_strategy() {
        let steps = build_steps(
            &[symlink_file("AGENTS.md"), copy_file("skills", "**/*.md")],
            &[instance("claude", "default", true)],
            &ctx(),
        );
        assert_eq!(steps[0].module.name(), "symlink-create");
        assert_eq!(steps[1].module.name(), "glob-copy");
    }

    #[test]
    fn multiple_mappings_share_one_label() {
        let file = DeclaredFile {
            name: "settings".to_string(),
            mappings: vec![
                PathMapping {
                    source: PathBuf::from("/canonical/settings.json"),
                    target: PathBuf::from("settings.json"),
                },
                PathMapping {
                    source: PathBuf::from("/canonical/keybindings.json"),
                    target: PathBuf::from("keybindings.json"),
                },
            ],
            pullback: false,
            strategy: SyncStrategy::Symlink,
        };

        let steps = build_steps(&[file], &[instance("claude", "default", true)], &ctx());
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].label, steps[1].label);
    }
}
