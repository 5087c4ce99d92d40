//! Reconciliation modules: the uniform check/apply contract
//!
//! Every reconciliation kind implements [`SyncModule`]: a strictly
//! read-only `check` that classifies the current state, and an idempotent
//! `apply` that performs the minimal mutation to reach the desired state.
//! Applying twice without intervening external change is a no-op the second
//! time.
//!
//! Failures stay inside the result types. `check` reports precondition
//! failures as [`ModuleStatus::Failed`]; `apply` captures unexpected I/O
//! errors in [`ApplyResult::error`]. Neither ever propagates an error past
//! the module boundary, so one failing step never aborts a batch.

mod glob_copy;
mod plugin;
mod symlink;

pub use glob_copy::{GlobCopyModule, GlobCopyParams};
pub use plugin::{PluginHost, PluginInstallModule, PluginRemoveModule, PluginParams};
pub use symlink::SymlinkModule;

use crate::state::DriftKind;
use std::path::PathBuf;

/// Outcome classification of a module check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Desired state already holds; apply is never called
    Ok,
    /// Desired artifact absent; apply will create it
    Missing,
    /// Artifact present but diverged; apply will reconcile it
    Drifted,
    /// Precondition failure; apply is never called
    Failed,
}

/// Result of a read-only check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub status: ModuleStatus,
    pub message: String,
    /// Rendered diff summary, when the module computed one
    pub diff: Option<String>,
    /// Underlying error text for `Failed`
    pub error: Option<String>,
    /// Three-way classification, when recorded state was available
    pub drift_kind: Option<DriftKind>,
}

impl CheckResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self::with_status(ModuleStatus::Ok, message)
    }

    pub fn missing(message: impl Into<String>) -> Self {
        Self::with_status(ModuleStatus::Missing, message)
    }

    pub fn drifted(message: impl Into<String>) -> Self {
        Self::with_status(ModuleStatus::Drifted, message)
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(ModuleStatus::Failed, message)
        }
    }

    pub fn with_drift_kind(mut self, kind: DriftKind) -> Self {
        self.drift_kind = Some(kind);
        self
    }

    fn with_status(status: ModuleStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            diff: None,
            error: None,
            drift_kind: None,
        }
    }
}

/// Result of an apply.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// Whether the filesystem was mutated
    pub changed: bool,
    pub message: String,
    /// Backup directory created before an overwrite, if any
    pub backup: Option<PathBuf>,
    /// Per-step error text; the step failed but the batch continues
    pub error: Option<String>,
}

impl ApplyResult {
    pub fn changed(message: impl Into<String>) -> Self {
        Self {
            changed: true,
            message: message.into(),
            backup: None,
            error: None,
        }
    }

    pub fn unchanged(message: impl Into<String>) -> Self {
        Self {
            changed: false,
            message: message.into(),
            backup: None,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            changed: false,
            message: message.into(),
            backup: None,
            error: Some(error.into()),
        }
    }

    pub fn with_backup(mut self, backup: Option<PathBuf>) -> Self {
        self.backup = backup;
        self
    }
}

/// The uniform contract every reconciliation kind implements.
///
/// Modules own their parameters; the orchestrator drives heterogeneous
/// steps through trait objects.
pub trait SyncModule {
    /// Stable module identifier, e.g. `"symlink-create"`.
    fn name(&self) -> &str;

    /// Classify current state. Must not mutate the filesystem.
    fn check(&self) -> CheckResult;

    /// Reach the desired state with the minimal mutation. Idempotent:
    /// after a successful apply, a subsequent `check` returns `Ok` and a
    /// subsequent `apply` changes nothing.
    fn apply(&self) -> ApplyResult;
}
