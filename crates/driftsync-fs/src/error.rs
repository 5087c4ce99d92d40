//! Error types for driftsync-fs

use std::path::PathBuf;

/// Result type for driftsync-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in driftsync-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lock acquisition failed for {}", path.display())]
    LockFailed { path: PathBuf },

    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Hash worker thread panicked while hashing {}", path.display())]
    HashWorkerPanicked { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
