//! Orphan detection and cleanup
//!
//! An orphan is a state entry whose key no longer matches anything in the
//! current declared configuration: the declared file was removed, or the
//! tool instance it targeted is gone or disabled. Cleanup scope is strictly
//! the set of keys found in the state document; files this system never
//! tracked are never touched, whatever their names look like.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{DeclaredFile, ToolInstance};
use crate::state::{StateKey, SyncState};
use crate::Result;

/// One orphaned state entry and the physical path it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub key: StateKey,
    pub target_path: PathBuf,
}

/// Report from an applied cleanup.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Keys whose entries were cleared
    pub cleared: Vec<String>,
    /// Per-orphan removal errors; the entry is cleared regardless
    pub errors: Vec<String>,
}

/// `(name, tool_id, instance_id)` triples currently derivable from
/// declared configuration. Disabled instances contribute nothing.
pub fn declared_targets(
    files: &[DeclaredFile],
    instances: &[ToolInstance],
) -> HashSet<(String, String, String)> {
    let mut targets = HashSet::new();
    for instance in instances.iter().filter(|i| i.enabled) {
        for file in files {
            targets.insert((
                file.name.clone(),
                instance.tool_id.clone(),
                instance.instance_id.clone(),
            ));
        }
    }
    targets
}

/// Find state entries no longer backed by declared configuration.
///
/// Keys that fail to parse (possible only after hand edits to the state
/// document) are skipped with a warning rather than acted on.
pub fn check_cleanup(
    state: &SyncState,
    declared: &HashSet<(String, String, String)>,
) -> Vec<Orphan> {
    let mut orphans = Vec::new();

    for (raw_key, entry) in &state.files {
        let Ok(key) = StateKey::parse(raw_key) else {
            tracing::warn!(key = %raw_key, "skipping unparsable state key");
            continue;
        };

        let triple = (
            key.name.clone(),
            key.tool_id.clone(),
            key.instance_id.clone(),
        );
        if !declared.contains(&triple) {
            orphans.push(Orphan {
                key,
                target_path: entry.target_path.clone(),
            });
        }
    }
    orphans
}

/// Remove each orphan's target (tolerating "already gone") and clear its
/// state entry unconditionally.
pub fn apply_cleanup(state_path: &Path, orphans: &[Orphan]) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();

    for orphan in orphans {
        if let Err(e) = driftsync_fs::remove_path(&orphan.target_path) {
            report
                .errors
                .push(format!("{}: {e}", orphan.target_path.display()));
        } else {
            tracing::info!(
                key = %orphan.key,
                target = %orphan.target_path.display(),
                "removed orphaned target"
            );
        }

        // The entry goes away even when removal failed; the declared
        // config no longer owns this target.
        SyncState::clear_entry(state_path, &orphan.key)?;
        report.cleared.push(orphan.key.to_string());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PathMapping, SyncStrategy};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn declared_file(name: &str) -> DeclaredFile {
        DeclaredFile {
            name: name.to_string(),
            mappings: vec![PathMapping {
                source: PathBuf::from("/src").join(name),
                target: PathBuf::from(name),
            }],
            pullback: false,
            strategy: SyncStrategy::Symlink,
        }
    }

    fn instance(tool_id: &str, enabled: bool) -> ToolInstance {
        ToolInstance {
            tool_id: tool_id.to_string(),
            instance_id: "default".to_string(),
            name: tool_id.to_string(),
            config_dir: PathBuf::from("/tools").join(tool_id),
            skills_subdir: None,
            commands_subdir: None,
            agents_subdir: None,
            enabled,
        }
    }

    #[test]
    fn declared_entries_are_not_orphans() {
        let declared = declared_targets(
            &[declared_file("AGENTS.md")],
            &[instance("claude", true)],
        );

        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let key = StateKey::new("AGENTS.md", "claude", "default", "AGENTS.md");
        let p = dir.path().join("p");
        SyncState::record_sync(&state_path, &key, "sha256:a", "sha256:a", &p, &p).unwrap();

        let orphans = check_cleanup(&SyncState::load(&state_path), &declared);
        assert!(orphans.is_empty());
    }

    #[test]
    fn undeclared_file_is_orphaned() {
        let declared = declared_targets(&[declared_file("new.md")], &[instance("claude", true)]);

        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let key = StateKey::new("old-file.md", "claude", "default", "old-file.md");
        let target = dir.path().join("old-file.md");
        SyncState::record_sync(&state_path, &key, "sha256:a", "sha256:a", &target, &target)
            .unwrap();

        let orphans = check_cleanup(&SyncState::load(&state_path), &declared);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].key.tool_id, "claude");
        assert_eq!(orphans[0].key.instance_id, "default");
    }

    #[test]
    fn disabled_instance_orphans_its_entries() {
        let declared = declared_targets(
            &[declared_file("AGENTS.md")],
            &[instance("claude", false)],
        );

        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let key = StateKey::new("AGENTS.md", "claude", "default", "AGENTS.md");
        let p = dir.path().join("p");
        SyncState::record_sync(&state_path, &key, "sha256:a", "sha256:a", &p, &p).unwrap();

        let orphans = check_cleanup(&SyncState::load(&state_path), &declared);
        assert_eq!(orphans.len(), 1);
    }

    #[test]
    fn apply_cleanup_removes_target_and_entry_only() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let tracked = dir.path().join("old-file.md");
        let untracked = dir.path().join("user-notes.md");
        fs::write(&tracked, "tracked").unwrap();
        fs::write(&untracked, "never touched by sync").unwrap();

        let key = StateKey::new("old-file.md", "claude", "default", "old-file.md");
        SyncState::record_sync(&state_path, &key, "sha256:a", "sha256:a", &tracked, &tracked)
            .unwrap();

        let orphans = check_cleanup(&SyncState::load(&state_path), &HashSet::new());
        let report = apply_cleanup(&state_path, &orphans).unwrap();

        assert_eq!(report.cleared, vec![key.to_string()]);
        assert!(report.errors.is_empty());
        assert!(!tracked.exists());
        // The neighbour this system never tracked survives.
        assert!(untracked.exists());
        assert!(SyncState::load(&state_path).get_entry(&key).is_none());
    }

    #[test]
    fn apply_cleanup_tolerates_already_gone_target() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("state.json");
        let ghost = dir.path().join("ghost.md");

        let key = StateKey::new("ghost.md", "claude", "default", "ghost.md");
        SyncState::record_sync(&state_path, &key, "sha256:a", "sha256:a", &ghost, &ghost).unwrap();

        let orphans = check_cleanup(&SyncState::load(&state_path), &HashSet::new());
        let report = apply_cleanup(&state_path, &orphans).unwrap();

        assert!(report.errors.is_empty());
        assert!(SyncState::load(&state_path).files.is_empty());
    }
}
