//! Timestamped backup snapshots with per-owner retention
//!
//! Anything about to be overwritten is copied verbatim into
//! `<cache>/backups/<owner>/<timestamp>/<relative-path>` first. One apply
//! batch shares a single timestamp slot, so one restorable snapshot holds
//! everything that batch replaced. Backups are a recovery mechanism only;
//! they are never consulted during drift detection or conflict resolution.
//!
//! Timestamp directory names sort lexicographically in chronological order,
//! which is what retention pruning relies on.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Backups kept per owner unless configured otherwise
pub const DEFAULT_RETENTION: usize = 3;

/// Backup destination and retention settings carried by module params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPolicy {
    /// Cache root under which `backups/` lives
    pub cache_root: PathBuf,
    /// Owner namespace (plugin name or target identifier)
    pub owner: String,
    /// Newest backups kept per owner
    pub retention: usize,
}

/// Manages timestamped, retained backup snapshots.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backups_dir: PathBuf,
}

impl BackupManager {
    /// Create a manager rooted at `<cache_root>/backups`.
    pub fn new(cache_root: &Path) -> Self {
        Self {
            backups_dir: cache_root.join("backups"),
        }
    }

    /// Platform cache root for backups (`<cache-dir>/driftsync`).
    pub fn default_cache_root() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("driftsync"))
    }

    /// Delete all but the `retention` newest backups for `owner`.
    ///
    /// Returns the removed backup directories.
    pub fn prune_backups(&self, owner: &str, retention: usize) -> Result<Vec<PathBuf>> {
        validate_owner(owner)?;
        let backups = self.list_backups(owner)?;
        let mut removed = Vec::new();

        for stale in backups.into_iter().skip(retention) {
            fs::remove_dir_all(&stale).map_err(|e| Error::BackupError {
                path: stale.clone(),
                message: e.to_string(),
            })?;
            tracing::debug!(backup = %stale.display(), owner, "pruned backup");
            removed.push(stale);
        }
        Ok(removed)
    }

    /// List an owner's backup directories, newest first.
    pub fn list_backups(&self, owner: &str) -> Result<Vec<PathBuf>> {
        validate_owner(owner)?;
        let owner_dir = self.backups_dir.join(owner);
        if !owner_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(&owner_dir).map_err(|e| Error::BackupError {
            path: owner_dir.clone(),
            message: e.to_string(),
        })? {
            let entry = entry.map_err(|e| Error::BackupError {
                path: owner_dir.clone(),
                message: e.to_string(),
            })?;
            if entry.path().is_dir() {
                dirs.push(entry.path());
            }
        }

        // ISO timestamps: lexicographically descending is newest first.
        dirs.sort();
        dirs.reverse();
        Ok(dirs)
    }

    /// Start a backup session for `owner`. The session allocates one
    /// timestamp slot lazily on first use, so everything one apply batch
    /// overwrites lands in a single restorable snapshot.
    pub fn session(&self, owner: &str) -> Result<BackupSession<'_>> {
        validate_owner(owner)?;
        Ok(BackupSession {
            manager: self,
            owner: owner.to_string(),
            slot: None,
        })
    }

    /// Allocate a new timestamp directory for `owner`, disambiguating on
    /// collision. The `-N` suffix still sorts after the bare timestamp, so
    /// ordering stays chronological.
    fn fresh_slot(&self, owner: &str) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.9fZ").to_string();
        let owner_dir = self.backups_dir.join(owner);

        let mut slot = owner_dir.join(&stamp);
        let mut counter = 0usize;
        while slot.exists() {
            counter += 1;
            slot = owner_dir.join(format!("{stamp}-{counter}"));
        }

        fs::create_dir_all(&slot).map_err(|e| Error::BackupError {
            path: slot.clone(),
            message: e.to_string(),
        })?;
        Ok(slot)
    }
}

/// One apply batch's backups, sharing a single timestamp slot.
#[derive(Debug)]
pub struct BackupSession<'a> {
    manager: &'a BackupManager,
    owner: String,
    slot: Option<PathBuf>,
}

impl BackupSession<'_> {
    /// Snapshot `target` under the relative path `rel` inside this
    /// session's slot, allocating the slot on first use.
    ///
    /// Returns the slot, or `None` when the target does not exist.
    pub fn back_up(&mut self, target: &Path, rel: &str) -> Result<Option<PathBuf>> {
        if fs::symlink_metadata(target).is_err() {
            return Ok(None);
        }

        let slot = match &self.slot {
            Some(slot) => slot.clone(),
            None => {
                let slot = self.manager.fresh_slot(&self.owner)?;
                self.slot = Some(slot.clone());
                slot
            }
        };

        let dest = slot.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::BackupError {
                path: dest.clone(),
                message: e.to_string(),
            })?;
        }
        copy_recursive(target, &dest)?;

        tracing::info!(
            target = %target.display(),
            backup = %slot.display(),
            owner = %self.owner,
            "backed up into session slot"
        );
        Ok(Some(slot))
    }

    /// The slot allocated so far, if anything was backed up.
    pub fn slot(&self) -> Option<&Path> {
        self.slot.as_deref()
    }
}

/// Owner names become directory components; reject separators and
/// traversal.
fn validate_owner(owner: &str) -> Result<()> {
    let bad = owner.is_empty()
        || owner == "."
        || owner == ".."
        || owner.contains('/')
        || owner.contains('\\');
    if bad {
        return Err(Error::InvalidOwner {
            owner: owner.to_string(),
        });
    }
    Ok(())
}

/// Copy a file, symlink target, or directory tree.
fn copy_recursive(src: &Path, dest: &Path) -> Result<()> {
    let meta = fs::metadata(src).map_err(|e| Error::BackupError {
        path: src.to_path_buf(),
        message: e.to_string(),
    })?;

    if meta.is_dir() {
        fs::create_dir_all(dest).map_err(|e| Error::BackupError {
            path: dest.to_path_buf(),
            message: e.to_string(),
        })?;
        for entry in fs::read_dir(src).map_err(|e| Error::BackupError {
            path: src.to_path_buf(),
            message: e.to_string(),
        })? {
            let entry = entry.map_err(|e| Error::BackupError {
                path: src.to_path_buf(),
                message: e.to_string(),
            })?;
            copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        fs::copy(src, dest).map_err(|e| Error::BackupError {
            path: dest.to_path_buf(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}
