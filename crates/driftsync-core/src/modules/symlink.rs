//! Symlink enforcement module
//!
//! Desired state: the target is a symlink whose link value equals the
//! source path. Content is never merged; whatever sits at the target is
//! replaced by the link.

use std::fs;
use std::path::{Path, PathBuf};

use super::{ApplyResult, CheckResult, ModuleStatus, SyncModule};

/// Enforces "target is a symlink to source".
#[derive(Debug, Clone)]
pub struct SymlinkModule {
    source: PathBuf,
    target: PathBuf,
}

impl SymlinkModule {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl SyncModule for SymlinkModule {
    fn name(&self) -> &str {
        "symlink-create"
    }

    fn check(&self) -> CheckResult {
        if !self.source.exists() {
            return CheckResult::failed(
                format!("source {} does not exist", self.source.display()),
                "missing source",
            );
        }

        let meta = match fs::symlink_metadata(&self.target) {
            Err(_) => {
                return CheckResult::missing(format!("{} does not exist", self.target.display()));
            }
            Ok(meta) => meta,
        };

        if !meta.file_type().is_symlink() {
            return CheckResult::drifted(format!(
                "{} exists but is not a symlink",
                self.target.display()
            ));
        }

        match fs::read_link(&self.target) {
            Ok(link) if link == self.source => {
                CheckResult::ok(format!("{} -> {}", self.target.display(), self.source.display()))
            }
            Ok(link) => CheckResult::drifted(format!(
                "{} points at {} instead of {}",
                self.target.display(),
                link.display(),
                self.source.display()
            )),
            Err(e) => CheckResult::failed(
                format!("cannot read link {}", self.target.display()),
                e.to_string(),
            ),
        }
    }

    fn apply(&self) -> ApplyResult {
        if self.check().status == ModuleStatus::Ok {
            return ApplyResult::unchanged(format!("{} already linked", self.target.display()));
        }

        if let Err(e) = driftsync_fs::remove_path(&self.target) {
            return ApplyResult::failed(
                format!("could not clear {}", self.target.display()),
                e.to_string(),
            );
        }

        if let Some(parent) = self.target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return ApplyResult::failed(
                    format!("could not create {}", parent.display()),
                    e.to_string(),
                );
            }
        }

        if let Err(e) = make_symlink(&self.source, &self.target) {
            return ApplyResult::failed(
                format!("could not link {}", self.target.display()),
                e.to_string(),
            );
        }

        tracing::info!(
            source = %self.source.display(),
            target = %self.target.display(),
            "created symlink"
        );
        ApplyResult::changed(format!(
            "linked {} -> {}",
            self.target.display(),
            self.source.display()
        ))
    }
}

#[cfg(unix)]
fn make_symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn make_symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, target)
    } else {
        std::os::windows::fs::symlink_file(source, target)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::modules::ModuleStatus;
    use pretty_assertions::assert_eq;

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("source/AGENTS.md");
        let target = temp.path().join("instance/AGENTS.md");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, "# agents").unwrap();
        (temp, source, target)
    }

    #[test]
    fn check_missing_source_is_failed() {
        let temp = tempfile::tempdir().unwrap();
        let module = SymlinkModule::new(temp.path().join("ghost"), temp.path().join("t"));
        assert_eq!(module.check().status, ModuleStatus::Failed);
    }

    #[test]
    fn check_absent_target_is_missing() {
        let (_temp, source, target) = setup();
        let module = SymlinkModule::new(source, target);
        assert_eq!(module.check().status, ModuleStatus::Missing);
    }

    #[test]
    fn check_regular_file_at_target_is_drifted() {
        let (_temp, source, target) = setup();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "manually edited").unwrap();

        let module = SymlinkModule::new(source, target);
        assert_eq!(module.check().status, ModuleStatus::Drifted);
    }

    #[test]
    fn check_wrong_link_target_is_drifted() {
        let (temp, source, target) = setup();
        let elsewhere = temp.path().join("elsewhere");
        fs::write(&elsewhere, "x").unwrap();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(&elsewhere, &target).unwrap();

        let module = SymlinkModule::new(source, target);
        assert_eq!(module.check().status, ModuleStatus::Drifted);
    }

    #[test]
    fn apply_creates_link_and_check_turns_ok() {
        let (_temp, source, target) = setup();
        let module = SymlinkModule::new(source.clone(), target.clone());

        let result = module.apply();
        assert!(result.changed);
        assert!(result.error.is_none());
        assert_eq!(fs::read_link(&target).unwrap(), source);
        assert_eq!(module.check().status, ModuleStatus::Ok);
    }

    #[test]
    fn apply_replaces_regular_file() {
        let (_temp, source, target) = setup();
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "stale copy").unwrap();

        let module = SymlinkModule::new(source, target.clone());
        assert!(module.apply().changed);
        assert!(fs::symlink_metadata(&target).unwrap().file_type().is_symlink());
    }

    #[test]
    fn apply_is_idempotent() {
        let (_temp, source, target) = setup();
        let module = SymlinkModule::new(source, target);

        assert!(module.apply().changed);
        let second = module.apply();
        assert!(!second.changed);
        assert_eq!(module.check().status, ModuleStatus::Ok);
    }
}
