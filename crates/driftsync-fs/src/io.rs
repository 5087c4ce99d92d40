//! Atomic I/O operations with advisory locking
//!
//! Every mutation of a shared document goes through one of two shapes:
//! a plain atomic write (temp file in the same directory, fsync, rename) or
//! a [`locked_update`] transaction that holds an exclusive lock across the
//! whole read-modify-write cycle. A crash or concurrent process invocation
//! can never observe or produce a partially written file.

use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Write content atomically to a file.
///
/// Writes to a temp file in the target's directory (same filesystem, so the
/// final rename is atomic), takes an exclusive advisory lock while writing,
/// flushes to disk, then renames over the target.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let temp_path = temp_sibling(path);
    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    let written = temp_file
        .write_all(content)
        .and_then(|()| temp_file.sync_all());
    if let Err(e) = written {
        // Leave no droppings behind on a failed write.
        let _ = fs::remove_file(&temp_path);
        return Err(Error::io(&temp_path, e));
    }

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Run a read-modify-write transaction on a shared document.
///
/// Serializes on an exclusive lock held on a sidecar `<name>.lock` file
/// next to the target. The document itself is replaced by rename on
/// commit, so locking its inode would let a contender that opens the path
/// after a rename proceed concurrently; the sidecar is never renamed away,
/// so every contender locks the same inode. `update` receives the current
/// bytes (`None` if the document does not exist or is empty) and returns
/// the replacement; a crash mid-transaction leaves the previous document
/// intact.
pub fn locked_update<E, F>(path: &Path, update: F) -> std::result::Result<(), E>
where
    E: From<Error>,
    F: FnOnce(Option<Vec<u8>>) -> std::result::Result<Vec<u8>, E>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let lock_path = lock_sibling(path);
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;
    lock_file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    let current = match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => None,
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(Error::io(path, e).into()),
    };

    let next = update(current)?;
    write_atomic(path, &next)?;

    drop(lock_file);
    Ok(())
}

/// Copy a file, writing the destination atomically.
///
/// The destination never holds a half-copied file, even on crash.
pub fn copy_file_atomic(src: &Path, dest: &Path) -> Result<()> {
    let content = fs::read(src).map_err(|e| Error::io(src, e))?;
    write_atomic(dest, &content)
}

/// Remove a file, symlink, or directory tree, tolerating "already gone".
pub fn remove_path(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(path, e)),
    };

    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Sidecar lock path for `path`. Stays in place across renames of the
/// document itself.
fn lock_sibling(path: &Path) -> PathBuf {
    let name = format!(
        "{}.lock",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
    );
    path.with_file_name(name)
}

/// Temp file path in the same directory as `path` (same filesystem).
fn temp_sibling(path: &Path) -> PathBuf {
    let name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    path.with_file_name(name)
}
