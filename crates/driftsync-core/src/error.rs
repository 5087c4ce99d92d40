//! Error types for driftsync-core

use std::path::PathBuf;

/// Result type for driftsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in driftsync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A state key did not have the four required components
    #[error("Invalid state key: {key}")]
    InvalidKey { key: String },

    /// Backup owner name unusable as a directory component
    #[error("Invalid backup owner: {owner}")]
    InvalidOwner { owner: String },

    /// Error while creating or pruning backups
    #[error("Backup error at {}: {message}", path.display())]
    BackupError { path: PathBuf, message: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from driftsync-fs
    #[error(transparent)]
    Fs(#[from] driftsync_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
