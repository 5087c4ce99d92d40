//! Sync and reconciliation core for driftsync
//!
//! This crate coordinates everything above the filesystem layer:
//!
//! - **State tracking**: Persisted per-file sync records with three-way
//!   drift classification (source changed, target changed, or both)
//! - **Modules**: Check/apply units for symlinks, glob-driven copies, and
//!   plugin install/remove, all behind one [`modules::SyncModule`] trait
//! - **Orchestration**: Planning declared files against tool instances and
//!   running the resulting steps in declaration order
//! - **Safety rails**: Timestamped backups with retention, deep config
//!   merging, and orphan cleanup scoped to tracked entries only
//!
//! # Architecture
//!
//! `driftsync-core` sits above `driftsync-fs` and below any CLI surface:
//!
//! ```text
//!        CLI / embedding application
//!                    |
//!              driftsync-core
//!                    |
//!              driftsync-fs
//! ```
//!
//! # Example
//!
//! ```ignore
//! use driftsync_core::{plan, orchestrator};
//!
//! let steps = plan::build_steps(&files, &instances, &ctx);
//! let report = orchestrator::run_apply(&steps, None);
//! println!("{} changed, {} failed", report.summary.changed, report.summary.failed);
//! ```

pub mod backup;
pub mod cleanup;
pub mod config;
pub mod diff;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod modules;
pub mod orchestrator;
pub mod plan;
pub mod state;

pub use backup::{BackupManager, BackupPolicy, BackupSession, DEFAULT_RETENTION};
pub use cleanup::{CleanupReport, Orphan, apply_cleanup, check_cleanup, declared_targets};
pub use config::{DeclaredFile, PathMapping, SyncStrategy, ToolInstance};
pub use diff::{FileStatus, LineCounts, SyncDirection, file_status, line_counts, unified_diff};
pub use error::{Error, Result};
pub use manifest::{InstalledItem, InstalledManifest};
pub use merge::deep_merge;
pub use modules::{ApplyResult, CheckResult, ModuleStatus, SyncModule};
pub use orchestrator::{OrchestratorStep, RunReport, RunSummary, StepOutcome, run_apply, run_check};
pub use plan::{PlanContext, build_steps};
pub use state::{DriftKind, StateKey, SyncEntry, SyncState};
