//! Manifest of installed items
//!
//! Produced by the install collaborator, read by reconciliation-adjacent
//! code to answer "is plugin X installed in tool instance Y". Keys are
//! `"<toolId>:<instanceId>"` for tools and `"<kind>:<name>"` for items.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::Result;

/// One installed item (plugin, skill pack, command set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledItem {
    pub kind: String,
    pub name: String,
    pub source: String,
    pub dest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
}

/// Items installed into one tool instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolItems {
    pub items: BTreeMap<String, InstalledItem>,
}

/// The persisted installed-items document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledManifest {
    pub tools: BTreeMap<String, ToolItems>,
}

impl InstalledManifest {
    /// Load the manifest. Missing or unreadable files degrade to empty,
    /// same policy as the sync-state document.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read(path) else {
            return Self::default();
        };
        match serde_json::from_slice(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "corrupt installed manifest, treating as empty"
                );
                Self::default()
            }
        }
    }

    /// Save atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        driftsync_fs::write_atomic(path, &content)?;
        Ok(())
    }

    /// Record an item under a tool instance, persisting the document under
    /// a locked transaction.
    pub fn record_item(
        path: &Path,
        tool_key: &str,
        item_key: &str,
        item: InstalledItem,
    ) -> Result<()> {
        driftsync_fs::locked_update::<crate::Error, _>(path, |current| {
            let mut manifest = current
                .as_deref()
                .and_then(|bytes| serde_json::from_slice::<Self>(bytes).ok())
                .unwrap_or_default();
            manifest
                .tools
                .entry(tool_key.to_string())
                .or_default()
                .items
                .insert(item_key.to_string(), item);
            Ok(serde_json::to_vec_pretty(&manifest)?)
        })
    }

    /// Remove an item, dropping the tool entry once it holds nothing.
    pub fn remove_item(path: &Path, tool_key: &str, item_key: &str) -> Result<()> {
        driftsync_fs::locked_update::<crate::Error, _>(path, |current| {
            let mut manifest = current
                .as_deref()
                .and_then(|bytes| serde_json::from_slice::<Self>(bytes).ok())
                .unwrap_or_default();
            if let Some(tool) = manifest.tools.get_mut(tool_key) {
                tool.items.remove(item_key);
                if tool.items.is_empty() {
                    manifest.tools.remove(tool_key);
                }
            }
            Ok(serde_json::to_vec_pretty(&manifest)?)
        })
    }

    /// Installed-status lookup for one item in one tool instance.
    pub fn is_installed(&self, tool_key: &str, item_key: &str) -> bool {
        self.tools
            .get(tool_key)
            .is_some_and(|tool| tool.items.contains_key(item_key))
    }
}
