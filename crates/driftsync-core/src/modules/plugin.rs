//! Plugin install/remove modules
//!
//! Thin wrappers that let the orchestrator drive plugin reconciliation
//! through the same check/apply contract as file reconciliation. Installed
//! status comes from the installed-items manifest; the actual install and
//! removal work (subprocesses, multi-instance fan-out) is delegated to the
//! [`PluginHost`] collaborator.

use std::path::PathBuf;
use std::sync::Arc;

use super::{ApplyResult, CheckResult, SyncModule};
use crate::manifest::InstalledManifest;

/// Collaborator seam for the tool-lifecycle runner.
pub trait PluginHost {
    /// Install `plugin` into one tool instance. The host is responsible
    /// for updating the installed-items manifest.
    fn install(&self, tool_id: &str, instance_id: &str, plugin: &str) -> Result<(), String>;

    /// Remove `plugin` from one tool instance.
    fn remove(&self, tool_id: &str, instance_id: &str, plugin: &str) -> Result<(), String>;
}

/// Shared parameters of the plugin modules.
#[derive(Debug, Clone)]
pub struct PluginParams {
    pub plugin: String,
    pub kind: String,
    pub tool_id: String,
    pub instance_id: String,
    pub manifest_path: PathBuf,
}

impl PluginParams {
    fn tool_key(&self) -> String {
        format!("{}:{}", self.tool_id, self.instance_id)
    }

    fn item_key(&self) -> String {
        format!("{}:{}", self.kind, self.plugin)
    }

    fn installed(&self) -> bool {
        InstalledManifest::load(&self.manifest_path).is_installed(&self.tool_key(), &self.item_key())
    }
}

/// Desired state: the plugin is installed in the instance.
pub struct PluginInstallModule {
    params: PluginParams,
    host: Arc<dyn PluginHost>,
}

impl PluginInstallModule {
    pub fn new(params: PluginParams, host: Arc<dyn PluginHost>) -> Self {
        Self { params, host }
    }
}

impl SyncModule for PluginInstallModule {
    fn name(&self) -> &str {
        "plugin-install"
    }

    fn check(&self) -> CheckResult {
        if self.params.installed() {
            CheckResult::ok(format!(
                "{} installed in {}",
                self.params.plugin,
                self.params.tool_key()
            ))
        } else {
            CheckResult::missing(format!(
                "{} not installed in {}",
                self.params.plugin,
                self.params.tool_key()
            ))
        }
    }

    fn apply(&self) -> ApplyResult {
        if self.params.installed() {
            return ApplyResult::unchanged(format!("{} already installed", self.params.plugin));
        }
        match self
            .host
            .install(&self.params.tool_id, &self.params.instance_id, &self.params.plugin)
        {
            Ok(()) => {
                tracing::info!(
                    plugin = %self.params.plugin,
                    instance = %self.params.tool_key(),
                    "installed plugin"
                );
                ApplyResult::changed(format!(
                    "installed {} into {}",
                    self.params.plugin,
                    self.params.tool_key()
                ))
            }
            Err(e) => ApplyResult::failed(format!("install of {} failed", self.params.plugin), e),
        }
    }
}

/// Desired state: the plugin is absent from the instance.
pub struct PluginRemoveModule {
    params: PluginParams,
    host: Arc<dyn PluginHost>,
}

impl PluginRemoveModule {
    pub fn new(params: PluginParams, host: Arc<dyn PluginHost>) -> Self {
        Self { params, host }
    }
}

impl SyncModule for PluginRemoveModule {
    fn name(&self) -> &str {
        "plugin-remove"
    }

    fn check(&self) -> CheckResult {
        if self.params.installed() {
            CheckResult::drifted(format!(
                "{} still installed in {}",
                self.params.plugin,
                self.params.tool_key()
            ))
        } else {
            CheckResult::ok(format!("{} absent from {}", self.params.plugin, self.params.tool_key()))
        }
    }

    fn apply(&self) -> ApplyResult {
        if !self.params.installed() {
            return ApplyResult::unchanged(format!("{} already absent", self.params.plugin));
        }
        match self
            .host
            .remove(&self.params.tool_id, &self.params.instance_id, &self.params.plugin)
        {
            Ok(()) => ApplyResult::changed(format!(
                "removed {} from {}",
                self.params.plugin,
                self.params.tool_key()
            )),
            Err(e) => ApplyResult::failed(format!("removal of {} failed", self.params.plugin), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::InstalledItem;
    use crate::modules::ModuleStatus;
    use pretty_assertions::assert_eq;

    /// Host that records items in the manifest, as the real collaborator
    /// would after a successful subprocess run.
    struct ManifestHost {
        manifest_path: PathBuf,
        fail: bool,
    }

    impl PluginHost for ManifestHost {
        fn install(&self, tool_id: &str, instance_id: &str, plugin: &str) -> Result<(), String> {
            if self.fail {
                return Err("installer exited with status 1".to_string());
            }
            InstalledManifest::record_item(
                &self.manifest_path,
                &format!("{tool_id}:{instance_id}"),
                &format!("plugin:{plugin}"),
                InstalledItem {
                    kind: "plugin".to_string(),
                    name: plugin.to_string(),
                    source: format!("/src/{plugin}"),
                    dest: format!("/tools/{tool_id}/{plugin}"),
                    backup: None,
                },
            )
            .map_err(|e| e.to_string())
        }

        fn remove(&self, tool_id: &str, instance_id: &str, plugin: &str) -> Result<(), String> {
            if self.fail {
                return Err("uninstaller exited with status 1".to_string());
            }
            InstalledManifest::remove_item(
                &self.manifest_path,
                &format!("{tool_id}:{instance_id}"),
                &format!("plugin:{plugin}"),
            )
            .map_err(|e| e.to_string())
        }
    }

    fn setup(fail: bool) -> (tempfile::TempDir, PluginParams, Arc<dyn PluginHost>) {
        let temp = tempfile::tempdir().unwrap();
        let manifest_path = temp.path().join("manifest.json");
        let params = PluginParams {
            plugin: "reviewer".to_string(),
            kind: "plugin".to_string(),
            tool_id: "claude".to_string(),
            instance_id: "default".to_string(),
            manifest_path: manifest_path.clone(),
        };
        let host = Arc::new(ManifestHost {
            manifest_path,
            fail,
        });
        (temp, params, host)
    }

    #[test]
    fn install_check_missing_then_ok_after_apply() {
        let (_temp, params, host) = setup(false);
        let module = PluginInstallModule::new(params, host);

        assert_eq!(module.check().status, ModuleStatus::Missing);
        assert!(module.apply().changed);
        assert_eq!(module.check().status, ModuleStatus::Ok);
        assert!(!module.apply().changed);
    }

    #[test]
    fn install_failure_is_captured_not_thrown() {
        let (_temp, params, host) = setup(true);
        let module = PluginInstallModule::new(params, host);

        let result = module.apply();
        assert!(!result.changed);
        assert!(result.error.unwrap().contains("status 1"));
    }

    #[test]
    fn remove_check_drifted_while_installed() {
        let (_temp, params, host) = setup(false);
        PluginInstallModule::new(params.clone(), host.clone()).apply();

        let remove = PluginRemoveModule::new(params, host);
        assert_eq!(remove.check().status, ModuleStatus::Drifted);
        assert!(remove.apply().changed);
        assert_eq!(remove.check().status, ModuleStatus::Ok);
    }
}
