//! Persisted sync-state store and drift classification
//!
//! The state document is the only authority for "what did we last put
//! there". It is never inferred from the filesystem, because timestamps are
//! unreliable across tools and machines. Entries are written only by a
//! successful apply, keyed by the four-part state key, and the document is
//! persisted as a single JSON file with locked, atomic writes.
//!
//! A missing, unparsable, or wrong-version document degrades to the empty
//! state: "we don't know what happened before" is treated as "never
//! synced", which only ever causes files to be reported as needing sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Current schema version of the state document
pub const STATE_VERSION: u32 = 1;

/// Four-part composite identifier addressing one sync entry.
///
/// Every component is required; together they tie an entry back to the
/// declared configuration item and the physical tool instance it targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    /// Logical name of the declared file
    pub name: String,
    /// Tool identifier
    pub tool_id: String,
    /// Instance identifier
    pub instance_id: String,
    /// Target path relative to the instance config directory
    pub target_rel: String,
}

impl StateKey {
    pub fn new(
        name: impl Into<String>,
        tool_id: impl Into<String>,
        instance_id: impl Into<String>,
        target_rel: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tool_id: tool_id.into(),
            instance_id: instance_id.into(),
            target_rel: target_rel.into(),
        }
    }

    /// Parse a colon-joined key. All four components must be non-empty;
    /// the target-relative path keeps any further colons it contains.
    pub fn parse(key: &str) -> Result<Self> {
        let mut parts = key.splitn(4, ':');
        let (name, tool_id, instance_id, target_rel) = (
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
        );
        if name.is_empty() || tool_id.is_empty() || instance_id.is_empty() || target_rel.is_empty()
        {
            return Err(Error::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(Self::new(name, tool_id, instance_id, target_rel))
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.name, self.tool_id, self.instance_id, self.target_rel
        )
    }
}

/// The hashes observed at the moment a file was last successfully
/// reconciled. Created or overwritten only by a successful apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEntry {
    pub source_hash: String,
    pub target_hash: String,
    pub synced_at: DateTime<Utc>,
    pub source_path: PathBuf,
    pub target_path: PathBuf,
}

/// Three-way drift classification for one sync entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriftKind {
    InSync,
    SourceChanged,
    TargetChanged,
    BothChanged,
    NeverSynced,
}

impl fmt::Display for DriftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InSync => "in-sync",
            Self::SourceChanged => "source-changed",
            Self::TargetChanged => "target-changed",
            Self::BothChanged => "both-changed",
            Self::NeverSynced => "never-synced",
        };
        write!(f, "{s}")
    }
}

/// The persisted synchronization-state document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub version: u32,
    pub files: BTreeMap<String, SyncEntry>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            files: BTreeMap::new(),
        }
    }
}

impl SyncState {
    /// Create a new empty state document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the state document from disk with a shared lock.
    ///
    /// A missing file, unreadable file, unparsable JSON, or unknown schema
    /// version silently resets to the empty state. Corruption must never
    /// crash the caller.
    pub fn load(path: &Path) -> Self {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return Self::new(),
        };
        // Qualified call: std has grown an inherent `File::lock_shared`
        // that would otherwise shadow the fs2 lock the writers use.
        if fs2::FileExt::lock_shared(&file).is_err() {
            return Self::new();
        }

        // Read through the locked handle to avoid a TOCTOU race with a
        // concurrent save.
        let mut content = String::new();
        if (&file).read_to_string(&mut content).is_err() {
            return Self::new();
        }

        match serde_json::from_str::<SyncState>(&content) {
            Ok(state) if state.version == STATE_VERSION => state,
            Ok(state) => {
                tracing::warn!(
                    path = %path.display(),
                    version = state.version,
                    "unknown state version, resetting to empty state"
                );
                Self::new()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "corrupt state document, resetting to empty state"
                );
                Self::new()
            }
        }
    }

    /// Save the state document atomically with an exclusive lock.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        driftsync_fs::write_atomic(path, &content)?;
        Ok(())
    }

    /// Upsert a sync entry for `key` with `synced_at = now`, persisting the
    /// updated document under an exclusive lock held across the whole
    /// read-modify-write cycle.
    ///
    /// The document on disk is re-read inside the transaction so a
    /// concurrent process invocation cannot be clobbered.
    pub fn record_sync(
        path: &Path,
        key: &StateKey,
        source_hash: &str,
        target_hash: &str,
        source_path: &Path,
        target_path: &Path,
    ) -> Result<SyncEntry> {
        let entry = SyncEntry {
            source_hash: source_hash.to_string(),
            target_hash: target_hash.to_string(),
            synced_at: Utc::now(),
            source_path: source_path.to_path_buf(),
            target_path: target_path.to_path_buf(),
        };

        let recorded = entry.clone();
        driftsync_fs::locked_update::<Error, _>(path, |current| {
            let mut state = Self::parse_or_empty(current.as_deref(), path);
            state.files.insert(key.to_string(), entry);
            Ok(serde_json::to_vec_pretty(&state)?)
        })?;

        tracing::debug!(key = %key, "recorded sync entry");
        Ok(recorded)
    }

    /// Remove an entry, persisting under the same locked transaction.
    /// Clearing an absent key is a no-op.
    pub fn clear_entry(path: &Path, key: &StateKey) -> Result<()> {
        driftsync_fs::locked_update::<Error, _>(path, |current| {
            let mut state = Self::parse_or_empty(current.as_deref(), path);
            state.files.remove(&key.to_string());
            Ok(serde_json::to_vec_pretty(&state)?)
        })?;
        tracing::debug!(key = %key, "cleared sync entry");
        Ok(())
    }

    /// Look up the entry recorded for `key`, if any.
    pub fn get_entry(&self, key: &StateKey) -> Option<&SyncEntry> {
        self.files.get(&key.to_string())
    }

    /// Classify drift for `key` given the currently observed hashes.
    ///
    /// This is a pure three-way comparison of (recorded entry or absence,
    /// current source hash, current target hash). It is never a two-way
    /// source-vs-target comparison: a manual edit of the installed copy
    /// must stay distinguishable from a normal source update.
    pub fn detect_drift(
        &self,
        key: &StateKey,
        current_source_hash: &str,
        current_target_hash: &str,
    ) -> DriftKind {
        let Some(entry) = self.get_entry(key) else {
            return DriftKind::NeverSynced;
        };

        let source_changed = entry.source_hash != current_source_hash;
        let target_changed = entry.target_hash != current_target_hash;
        match (source_changed, target_changed) {
            (false, false) => DriftKind::InSync,
            (true, false) => DriftKind::SourceChanged,
            (false, true) => DriftKind::TargetChanged,
            (true, true) => DriftKind::BothChanged,
        }
    }

    fn parse_or_empty(bytes: Option<&[u8]>, path: &Path) -> Self {
        let Some(bytes) = bytes else {
            return Self::new();
        };
        match serde_json::from_slice::<SyncState>(bytes) {
            Ok(state) if state.version == STATE_VERSION => state,
            _ => {
                tracing::warn!(
                    path = %path.display(),
                    "unreadable state document inside transaction, starting empty"
                );
                Self::new()
            }
        }
    }
}
