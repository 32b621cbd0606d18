use serde_json::Value;
use shared::{
    domain::{DomainVersionId, ViewModelId},
    error::LoadError,
};
use tracing::info;

use crate::{
    catalog::invalid_domain,
    tabs::OpenTabOptions,
    viewmodel::SidebarContent,
    SessionWorkspace, UpgradeDecision, UpgradeRequest,
};

/// Outcome of an accepted upgrade dialog: migrate the layer from the old
/// domain/version to the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UpgradePlan {
    old_id: DomainVersionId,
    new_id: DomainVersionId,
}

impl SessionWorkspace {
    /// Ask whether the uploaded layer should be migrated. No dialog when the
    /// layer already targets the current version. Declining a version this
    /// build cannot read fails with an unsupported-version error.
    async fn version_upgrade_dialog(
        &mut self,
        vm_id: ViewModelId,
    ) -> Result<Option<UpgradePlan>, LoadError> {
        let (layer_name, layer_version, layer_domain, old_id) = {
            let vm = self
                .store
                .get(vm_id)
                .ok_or_else(|| LoadError::malformed("layer was destroyed before upgrading"))?;
            (
                vm.name.clone(),
                vm.version.clone(),
                vm.domain.clone(),
                vm.domain_version_id.clone(),
            )
        };
        let current = self
            .catalog
            .current_version()
            .ok_or_else(|| LoadError::malformed("catalog has no known versions"))?
            .number
            .clone();
        if layer_version == current {
            return Ok(None);
        }

        let decision = self
            .prompt()
            .confirm_upgrade(UpgradeRequest {
                layer_name,
                layer_version: layer_version.clone(),
                current_version: current.clone(),
            })
            .await
            .map_err(|err| {
                LoadError::malformed(format!("upgrade dialog returned no decision: {err}"))
            })?;

        match decision {
            UpgradeDecision::KeepCurrent if !self.catalog.is_supported(&layer_version) => {
                Err(LoadError::UnsupportedVersion {
                    version: layer_version,
                })
            }
            UpgradeDecision::KeepCurrent => Ok(None),
            UpgradeDecision::Upgrade => {
                let old_id = old_id
                    .ok_or_else(|| LoadError::malformed("layer has no domain/version identity"))?;
                Ok(Some(UpgradePlan {
                    old_id,
                    new_id: DomainVersionId::new(&layer_domain, &current),
                }))
            }
        }
    }

    /// Version-upgrade workflow for one loaded layer. Terminal outcomes:
    /// already current or default-suppressed (keep and restore), declined
    /// (keep, or fail when the old version is unsupported), or accepted
    /// (build a second ViewModel on the current version, load both domains
    /// concurrently, compute the changelog and seed the annotation copy).
    /// Errors propagate to the caller, which destroys the provisional
    /// ViewModel; any tab opened here is closed again first.
    pub(crate) async fn layer_upgrade(
        &mut self,
        old_vm: ViewModelId,
        snapshot: Value,
        replace: bool,
        is_default: bool,
    ) -> Result<(), LoadError> {
        if is_default {
            return self.keep_current_version(old_vm, &snapshot, replace).await;
        }

        match self.version_upgrade_dialog(old_vm).await? {
            None => self.keep_current_version(old_vm, &snapshot, replace).await,
            Some(plan) => self.migrate_layer(old_vm, plan, &snapshot, replace).await,
        }
    }

    async fn migrate_layer(
        &mut self,
        old_vm: ViewModelId,
        plan: UpgradePlan,
        snapshot: &Value,
        replace: bool,
    ) -> Result<(), LoadError> {
        let (name, identifier) = {
            let vm = self
                .store
                .get(old_vm)
                .ok_or_else(|| LoadError::malformed("layer was destroyed before upgrading"))?;
            (vm.name.clone(), vm.domain.clone())
        };
        let current = self
            .catalog
            .current_version()
            .ok_or_else(|| LoadError::malformed("catalog has no known versions"))?
            .number
            .clone();

        // the upgraded copy, opened in upgrade-review mode
        let new_vm = self.store.new_view_model(&name);
        if let Some(vm) = self.store.get_mut(new_vm) {
            vm.set_domain_version(&identifier, &current);
            vm.load_data();
            vm.compare_to = Some(old_vm);
            vm.sidebar_opened = true;
            vm.sidebar_content = SidebarContent::LayerUpgrade;
            vm.select_techniques_across_tactics = false;
        }
        self.tabs.open_tab(
            OpenTabOptions {
                title: "new layer".to_string(),
                data: Some(new_vm),
                is_closeable: true,
                replace,
                force_new: true,
                is_data_table: true,
            },
            &mut self.store,
        );

        // old and new framework data fetched concurrently, wait for both
        let loaded = self
            .ensure_domains_loaded(&[plan.old_id.clone(), plan.new_id.clone()])
            .await;
        if let Err(err) = loaded {
            self.discard_upgrade_tab(new_vm);
            return Err(err);
        }

        let changelog = self.catalog.compare_versions(&plan.old_id, &plan.new_id);
        if let Some(vm) = self.store.get_mut(new_vm) {
            vm.version_changelog = Some(changelog);
        }

        let restored = self
            .store
            .get_mut(old_vm)
            .map(|vm| vm.deserialize(snapshot))
            .unwrap_or(Ok(()));
        if let Err(err) = restored {
            self.discard_upgrade_tab(new_vm);
            return Err(err);
        }
        if let Some(vm) = self.store.get_mut(old_vm) {
            vm.load_data();
        }

        if let Some(old) = self.store.get(old_vm).cloned() {
            if let Some(vm) = self.store.get_mut(new_vm) {
                vm.init_copy_annotations(&old);
            }
        }
        info!(
            old = %plan.old_id,
            new = %plan.new_id,
            "layer opened in upgrade-review mode"
        );
        Ok(())
    }

    /// Keep the uploaded layer on its own version: open it, make sure its
    /// domain data is loaded, restore the snapshot and hydrate.
    async fn keep_current_version(
        &mut self,
        vm_id: ViewModelId,
        snapshot: &Value,
        replace: bool,
    ) -> Result<(), LoadError> {
        let id = self
            .store
            .get(vm_id)
            .and_then(|vm| vm.domain_version_id.clone())
            .ok_or_else(|| LoadError::malformed("layer has no domain/version identity"))?;

        let tab = self.tabs.open_tab(
            OpenTabOptions {
                title: "new layer".to_string(),
                data: Some(vm_id),
                is_closeable: true,
                replace,
                force_new: true,
                is_data_table: true,
            },
            &mut self.store,
        );

        let needs_data = self
            .catalog
            .get_domain(&id)
            .map(|domain| !domain.data_loaded)
            .ok_or_else(|| invalid_domain(&id));
        let result = match needs_data {
            Ok(true) => self.ensure_domains_loaded(&[id]).await,
            Ok(false) => Ok(()),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            self.tabs.close_tab(tab, false, &mut self.store);
            return Err(err);
        }

        let restored = self
            .store
            .get_mut(vm_id)
            .map(|vm| vm.deserialize(snapshot))
            .unwrap_or(Ok(()));
        if let Err(err) = restored {
            self.tabs.close_tab(tab, false, &mut self.store);
            return Err(err);
        }
        if let Some(vm) = self.store.get_mut(vm_id) {
            vm.load_data();
        }
        Ok(())
    }

    fn discard_upgrade_tab(&mut self, new_vm: ViewModelId) {
        if let Some(tab) = self.tabs.find_by_data(new_vm) {
            self.tabs.close_tab(tab, false, &mut self.store);
        } else {
            self.store.destroy(new_vm);
        }
    }
}
