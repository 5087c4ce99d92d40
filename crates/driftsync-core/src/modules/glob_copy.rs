//! Glob-based multi-file copy module
//!
//! Desired state: every file matching a glob under the authoritative base
//! directory has an identical, content-hash-equal copy at the corresponding
//! path under the other side. The source is authoritative by default; in
//! pullback mode the installed target is authoritative and content flows
//! back into the source tree.
//!
//! Apply backs every overwritten destination up into one shared snapshot
//! slot, prunes old snapshots to the configured retention, writes each
//! destination atomically, and records each copied pair in the sync-state
//! document.

use std::path::{Path, PathBuf};

use super::{ApplyResult, CheckResult, SyncModule};
use crate::backup::{BackupManager, BackupPolicy};
use crate::state::{DriftKind, StateKey, SyncState};

/// Parameters of one glob-copy step.
#[derive(Debug, Clone)]
pub struct GlobCopyParams {
    /// Declared-file name, first state-key component
    pub name: String,
    pub tool_id: String,
    pub instance_id: String,
    /// Canonical source base directory
    pub source_dir: PathBuf,
    /// Instance target base directory
    pub target_dir: PathBuf,
    /// Glob pattern relative to the authoritative base
    pub pattern: String,
    /// Target is authoritative; copy back into the source tree
    pub pullback: bool,
    /// Sync-state document
    pub state_path: PathBuf,
    /// Backup destination and retention
    pub backups: BackupPolicy,
}

/// Enforces hash-equal copies of every glob match.
#[derive(Debug, Clone)]
pub struct GlobCopyModule {
    params: GlobCopyParams,
}

impl GlobCopyModule {
    pub fn new(params: GlobCopyParams) -> Self {
        Self { params }
    }

    /// `(authoritative base, other base)` for the configured direction.
    fn sides(&self) -> (&Path, &Path) {
        if self.params.pullback {
            (&self.params.target_dir, &self.params.source_dir)
        } else {
            (&self.params.source_dir, &self.params.target_dir)
        }
    }

    fn key_for(&self, rel: &str) -> StateKey {
        StateKey::new(
            &self.params.name,
            &self.params.tool_id,
            &self.params.instance_id,
            rel,
        )
    }
}

impl SyncModule for GlobCopyModule {
    fn name(&self) -> &str {
        "glob-copy"
    }

    fn check(&self) -> CheckResult {
        if self.params.pattern.split('/').any(|part| part == "..") {
            return CheckResult::failed(
                format!("pattern {:?} rejected", self.params.pattern),
                "path traversal in glob pattern",
            );
        }

        let (auth, other) = self.sides();
        let matches = match expand(auth, &self.params.pattern) {
            Ok(m) => m,
            Err(e) => {
                return CheckResult::failed(
                    format!("invalid glob pattern {:?}", self.params.pattern),
                    e,
                );
            }
        };

        if matches.is_empty() {
            // Permissive by design: an unpopulated authoritative side is
            // not fatal.
            let other_matches = expand(other, &self.params.pattern).unwrap_or_default();
            return if other_matches.is_empty() {
                CheckResult::ok("no files match on either side")
            } else {
                CheckResult::missing(format!(
                    "{} file(s) exist only on the non-authoritative side",
                    other_matches.len()
                ))
            };
        }

        let state = SyncState::load(&self.params.state_path);
        let mut missing = 0usize;
        let mut drifted = 0usize;
        let mut kinds: Vec<DriftKind> = Vec::new();

        for rel in &matches {
            let auth_file = auth.join(rel);
            let other_file = other.join(rel);

            if !other_file.exists() {
                missing += 1;
                continue;
            }

            let auth_hash = match driftsync_fs::hash_file(&auth_file) {
                Ok(h) => h,
                Err(e) => return CheckResult::failed(format!("cannot hash {rel}"), e.to_string()),
            };
            let other_hash = match driftsync_fs::hash_file(&other_file) {
                Ok(h) => h,
                Err(e) => return CheckResult::failed(format!("cannot hash {rel}"), e.to_string()),
            };

            if auth_hash != other_hash {
                drifted += 1;
                // Orientation for drift classification is always declared
                // source vs installed target, independent of pullback.
                let (src_hash, tgt_hash) = if self.params.pullback {
                    (&other_hash, &auth_hash)
                } else {
                    (&auth_hash, &other_hash)
                };
                kinds.push(state.detect_drift(&self.key_for(rel), src_hash, tgt_hash));
            }
        }

        let total = matches.len();
        let result = if missing > 0 {
            CheckResult::missing(format!("{missing} of {total} file(s) missing"))
        } else if drifted > 0 {
            CheckResult::drifted(format!("{drifted} of {total} file(s) drifted"))
        } else {
            CheckResult::ok(format!("{total} file(s) in sync"))
        };

        // Only attach a classification when the drifted set agrees on one.
        match kinds.as_slice() {
            [] => result,
            [first, rest @ ..] if rest.iter().all(|k| k == first) => {
                result.with_drift_kind(*first)
            }
            _ => result,
        }
    }

    fn apply(&self) -> ApplyResult {
        let (auth, other) = self.sides();
        let matches = match expand(auth, &self.params.pattern) {
            Ok(m) => m,
            Err(e) => {
                return ApplyResult::failed(
                    format!("invalid glob pattern {:?}", self.params.pattern),
                    e,
                );
            }
        };

        let manager = BackupManager::new(&self.params.backups.cache_root);
        // One snapshot slot per apply: every file overwritten in this
        // batch lands in the same restorable timestamp directory, and
        // retention is pruned once at the end.
        let mut session = match manager.session(&self.params.backups.owner) {
            Ok(s) => s,
            Err(e) => {
                return ApplyResult::failed(
                    format!("invalid backup owner {:?}", self.params.backups.owner),
                    e.to_string(),
                );
            }
        };
        let mut copied = 0usize;
        let mut errors: Vec<String> = Vec::new();

        for rel in &matches {
            let from = auth.join(rel);
            let to = other.join(rel);

            let from_hash = match driftsync_fs::hash_file(&from) {
                Ok(h) => h,
                Err(e) => {
                    errors.push(format!("{rel}: {e}"));
                    continue;
                }
            };
            let already_equal =
                to.exists() && driftsync_fs::hash_file(&to).is_ok_and(|h| h == from_hash);

            if !already_equal {
                if let Err(e) = session.back_up(&to, rel) {
                    errors.push(format!("{rel}: backup failed: {e}"));
                    continue;
                }
                if let Err(e) = driftsync_fs::copy_file_atomic(&from, &to) {
                    errors.push(format!("{rel}: {e}"));
                    continue;
                }
                copied += 1;
                tracing::info!(file = %rel, pullback = self.params.pullback, "copied file");
            }

            let source_path = self.params.source_dir.join(rel);
            let target_path = self.params.target_dir.join(rel);
            if let Err(e) = SyncState::record_sync(
                &self.params.state_path,
                &self.key_for(rel),
                &from_hash,
                &from_hash,
                &source_path,
                &target_path,
            ) {
                errors.push(format!("{rel}: state update failed: {e}"));
            }
        }

        if session.slot().is_some() {
            if let Err(e) = manager
                .prune_backups(&self.params.backups.owner, self.params.backups.retention)
            {
                errors.push(format!("prune failed: {e}"));
            }
        }

        let message = if copied > 0 {
            format!("copied {copied} of {} file(s)", matches.len())
        } else {
            format!("{} file(s) already matched", matches.len())
        };
        let backup = session.slot().map(Path::to_path_buf);

        if errors.is_empty() {
            let result = if copied > 0 {
                ApplyResult::changed(message)
            } else {
                ApplyResult::unchanged(message)
            };
            result.with_backup(backup)
        } else {
            ApplyResult {
                changed: copied > 0,
                message,
                backup,
                error: Some(errors.join("; ")),
            }
        }
    }
}

/// Expand `pattern` under `base`, returning sorted relative paths of
/// matched files. A missing base directory yields no matches.
fn expand(base: &Path, pattern: &str) -> Result<Vec<String>, String> {
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    // The base path is a literal directory, not a pattern; escape it so
    // metacharacters in directory names do not alter the match set.
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&base.display().to_string()),
        pattern
    );
    let paths = glob::glob(&full).map_err(|e| e.to_string())?;

    let mut rels = Vec::new();
    for path in paths {
        let path = path.map_err(|e| e.to_string())?;
        if path.is_file() {
            let rel = path
                .strip_prefix(base)
                .map_err(|e| e.to_string())?
                .to_string_lossy()
                .replace('\\', "/");
            rels.push(rel);
        }
    }
    rels.sort();
    Ok(rels)
}
