//! SHA-256 content identity
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for all
//! drift detection. Files hash over their raw bytes; directories hash over
//! the sorted list of `(relative path, file digest)` pairs, so two trees with
//! identical structure and contents always hash identically regardless of
//! traversal order, timestamps, or permissions.
//!
//! Symlinks are dereferenced before hashing; broken symlinks are skipped.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use crate::{Error, Result};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of raw content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// Symlinks are followed to their real target.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<String> {
    let content = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(hash_content(&content))
}

/// Compute a deterministic checksum for a whole directory tree.
///
/// The digest covers the sorted list of `(relative path, file digest)`
/// pairs. Any added, removed, renamed, or modified file changes the result;
/// re-hashing an unmodified tree is stable.
///
/// # Errors
///
/// Returns an error if `path` is not a directory or the tree cannot be read.
pub fn hash_directory(path: &Path) -> Result<String> {
    let entries = collect_tree(path, |_| {})?;
    Ok(digest_pairs(&entries))
}

/// One progress event from a background directory hash: a file that has
/// just been hashed, identified by its path relative to the tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashProgress {
    pub relative: String,
}

/// Handle to a directory hash running on a dedicated worker thread.
///
/// Progress events arrive on [`DirectoryHashJob::progress`] in deterministic
/// (sorted traversal) order; [`DirectoryHashJob::join`] blocks for the final
/// digest.
#[derive(Debug)]
pub struct DirectoryHashJob {
    progress: mpsc::Receiver<HashProgress>,
    handle: thread::JoinHandle<Result<String>>,
    root: PathBuf,
}

impl DirectoryHashJob {
    /// Receiver for per-file progress events.
    pub fn progress(&self) -> &mpsc::Receiver<HashProgress> {
        &self.progress
    }

    /// Wait for the worker to finish and return the tree digest.
    pub fn join(self) -> Result<String> {
        self.handle
            .join()
            .map_err(|_| Error::HashWorkerPanicked { path: self.root })?
    }
}

/// Hash a directory tree on a dedicated worker thread.
///
/// Large trees can take a while; this keeps the caller's event loop free
/// while still producing the same digest as [`hash_directory`].
pub fn spawn_directory_hash(path: &Path) -> DirectoryHashJob {
    let (tx, rx) = mpsc::channel();
    let root = path.to_path_buf();
    let worker_root = root.clone();

    let handle = thread::spawn(move || {
        let entries = collect_tree(&worker_root, |relative| {
            // A closed receiver just means the caller stopped listening.
            let _ = tx.send(HashProgress {
                relative: relative.to_string(),
            });
        })?;
        Ok(digest_pairs(&entries))
    });

    DirectoryHashJob {
        progress: rx,
        handle,
        root,
    }
}

/// Walk a tree and hash every file, invoking `observe` per hashed file.
///
/// Returns `(relative path, digest)` pairs sorted by relative path.
fn collect_tree(root: &Path, mut observe: impl FnMut(&str)) -> Result<Vec<(String, String)>> {
    if !root.is_dir() {
        return Err(Error::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    walk(root, root, &mut entries)?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hashed = Vec::with_capacity(entries.len());
    for (relative, path) in entries {
        // Broken symlinks surface as NotFound on read; skip them.
        match std::fs::read(&path) {
            Ok(content) => {
                hashed.push((relative.clone(), hash_content(&content)));
                observe(&relative);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "skipping broken symlink");
            }
            Err(e) => return Err(Error::io(path, e)),
        }
    }
    Ok(hashed)
}

/// Recursively collect file paths under `dir`, keyed by their path relative
/// to `root` with `/` separators. Symlinked directories are entered.
fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> Result<()> {
    let read = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in read {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();

        // metadata() follows symlinks; a broken link errors here and is
        // left for the file pass to skip.
        let meta = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                out.push((relative_key(root, &path), path));
                continue;
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        if meta.is_dir() {
            walk(root, &path, out)?;
        } else {
            out.push((relative_key(root, &path), path));
        }
    }
    Ok(())
}

fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Digest a sorted list of `(relative path, file digest)` pairs.
fn digest_pairs(pairs: &[(String, String)]) -> String {
    let mut hasher = Sha256::new();
    for (relative, digest) in pairs {
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(digest.as_bytes());
        hasher.update([b'\n']);
    }
    format!("{}{:x}", PREFIX, hasher.finalize())
}
