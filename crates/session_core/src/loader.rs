use anyhow::Result;
use serde_json::Value;
use shared::{
    domain::{DomainVersionId, Version},
    error::LoadError,
    layer::LayerEnvelope,
};
use tracing::info;
use url::Url;

use crate::{
    catalog::invalid_domain,
    config::{AppConfig, DefaultLayersConfig},
    fragment::named_fragment_values,
    namer::unique_layer_name,
    tabs::{OpenTabOptions, TabId},
    SessionWorkspace,
};

/// A single custom-bundle load request: the data URL plus the identifier and
/// version the dataset should be registered under.
#[derive(Debug, Clone)]
pub struct RemoteBundleRequest {
    pub url: String,
    pub version: String,
    pub identifier: String,
}

impl SessionWorkspace {
    /// Startup sequence: open the initial blank tab, run the source-precedence
    /// load, and make sure something is active afterwards.
    pub async fn bootstrap(&mut self, config: &AppConfig) -> Result<()> {
        self.tabs.new_blank_tab(false, &mut self.store);
        self.load_tabs(&config.default_layers).await;
        if self.tabs.is_empty() {
            self.tabs.new_blank_tab(false, &mut self.store);
        }
        if self.tabs.active_id().is_none() {
            if let Some(first) = self.tabs.first_id() {
                self.tabs.select_tab(first, &mut self.store);
            }
        }
        Ok(())
    }

    /// Open the initial tabs, by strict source precedence: a complete
    /// bundleURL/version/domain fragment triple wins, then any `layerURL`
    /// fragment parameters, then the configured default layers. Sequential
    /// sources load strictly in order; the first loaded layer replaces the
    /// initial blank tab and the rest open additional tabs. Fragment and
    /// config loads are "default" loads, so upgrade dialogs are suppressed.
    pub async fn load_tabs(&mut self, default_layers: &DefaultLayersConfig) {
        let page = self.page_url();
        let bundle_url = first_non_empty(named_fragment_values("bundleURL", &page));
        let bundle_version = first_non_empty(named_fragment_values("version", &page));
        let bundle_domain = first_non_empty(named_fragment_values("domain", &page));
        let layer_urls = named_fragment_values("layerURL", &page);

        if let (Some(url), Some(version), Some(identifier)) =
            (bundle_url, bundle_version, bundle_domain)
        {
            self.new_layer_from_url(
                RemoteBundleRequest {
                    url,
                    version,
                    identifier,
                },
                None,
            )
            .await;
        } else if !layer_urls.is_empty() {
            let mut first = true;
            for url in layer_urls {
                self.load_layer_from_url(&url, first, true).await;
                first = false;
            }
        } else if default_layers.enabled {
            let mut first = true;
            for url in default_layers.urls.clone() {
                self.load_layer_from_url(&url, first, true).await;
                first = false;
            }
        }
    }

    /// Load a custom framework bundle and create one layer in it. On success
    /// the catalog learns a new custom domain (and version, if unknown)
    /// before the layer opens; on failure nothing in the catalog changes.
    /// The optional snapshot restores a previously serialized layer instead
    /// of creating a blank one.
    pub async fn new_layer_from_url(
        &mut self,
        request: RemoteBundleRequest,
        snapshot: Option<Value>,
    ) {
        let id = DomainVersionId::new(&request.identifier, &request.version);
        let url = match self.validate_input(&request, &id) {
            Ok(url) => url,
            Err(err) => {
                self.report(&err, "validating custom layer input");
                return;
            }
        };

        if let Err(err) = self.http().fetch_json(url.as_str()).await {
            self.report(&err, &format!("retrieving data from {url}"));
            return;
        }

        let already_registered = self
            .catalog
            .get_domain(&id)
            .map(|domain| domain.is_custom)
            .unwrap_or(false);
        if !already_registered {
            let version = match self.catalog.find_version(&request.version) {
                Some(version) => version.clone(),
                None => {
                    let version =
                        Version::new(format!("v{}", request.version), request.version.clone());
                    self.catalog.register_version(version.clone());
                    version
                }
            };
            self.catalog
                .register_custom_domain(&request.identifier, version, url.as_str());
        }

        let result = match snapshot {
            Some(snapshot) => self.restore_layer(&id, &snapshot).await,
            None => self.new_layer(&id).await,
        };
        if let Err(err) = result {
            self.report(&err, &format!("creating layer for {id}"));
        }
    }

    /// The URL must parse as a well-formed absolute URL, the version must be
    /// numeric, and the domain/version pair must not collide with an existing
    /// catalog entry. A custom entry with the identical source URL is a
    /// reload, not a conflict.
    fn validate_input(
        &self,
        request: &RemoteBundleRequest,
        id: &DomainVersionId,
    ) -> Result<Url, LoadError> {
        let url = Url::parse(&request.url)
            .map_err(|_| LoadError::malformed(format!("invalid url '{}'", request.url)))?;
        let finite = request
            .version
            .parse::<f64>()
            .map(f64::is_finite)
            .unwrap_or(false);
        if !finite {
            return Err(LoadError::malformed("version is not a number"));
        }
        if let Some(existing) = self.catalog.get_domain(id) {
            let same_source = existing.is_custom
                && existing.urls.first().map(String::as_str) == Some(url.as_str());
            if !same_source {
                return Err(LoadError::Conflict {
                    existing: format!("{} {}", existing.name, existing.version.name),
                });
            }
        }
        Ok(url)
    }

    /// Create a blank layer in the given domain/version.
    pub async fn new_layer(&mut self, id: &DomainVersionId) -> Result<TabId, LoadError> {
        self.open_layer(id, None).await
    }

    /// Restore a serialized layer into the given domain/version.
    pub async fn restore_layer(
        &mut self,
        id: &DomainVersionId,
        snapshot: &Value,
    ) -> Result<TabId, LoadError> {
        self.open_layer(id, Some(snapshot)).await
    }

    async fn open_layer(
        &mut self,
        id: &DomainVersionId,
        snapshot: Option<&Value>,
    ) -> Result<TabId, LoadError> {
        let (identifier, version, data_loaded) = {
            let domain = self.catalog.get_domain(id).ok_or_else(|| invalid_domain(id))?;
            (
                domain.identifier.clone(),
                domain.version.number.clone(),
                domain.data_loaded,
            )
        };
        if !data_loaded {
            self.ensure_domains_loaded(&[id.clone()]).await?;
        }

        let name = snapshot
            .and_then(|snapshot| snapshot.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| unique_layer_name(self.store.names(), "layer"));

        let vm_id = self.store.new_view_model(&name);
        if let Some(vm) = self.store.get_mut(vm_id) {
            vm.set_domain_version(&identifier, &version);
        }
        if let Some(snapshot) = snapshot {
            let restored = self
                .store
                .get_mut(vm_id)
                .map(|vm| vm.deserialize(snapshot))
                .unwrap_or(Ok(()));
            if let Err(err) = restored {
                self.store.destroy(vm_id);
                return Err(err);
            }
        }
        if let Some(vm) = self.store.get_mut(vm_id) {
            vm.load_data();
        }

        info!(layer = %name, domain = %id, "opened layer");
        Ok(self.tabs.open_tab(
            OpenTabOptions {
                title: name,
                data: Some(vm_id),
                is_closeable: true,
                replace: true,
                force_new: true,
                is_data_table: true,
            },
            &mut self.store,
        ))
    }

    /// Route an uploaded layer file (already read to a string by the host
    /// environment). Parse or validation failure destroys the provisional
    /// ViewModel and alerts; it never leaves an orphaned tab or ViewModel.
    pub async fn read_json_layer(&mut self, raw: &str) {
        let vm_id = self.store.new_view_model("loading layer...");
        if let Err(err) = self.route_uploaded_layer(vm_id, raw).await {
            self.store.destroy(vm_id);
            self.report(&err, "parsing uploaded layer file");
        }
    }

    async fn route_uploaded_layer(
        &mut self,
        vm_id: shared::domain::ViewModelId,
        raw: &str,
    ) -> Result<(), LoadError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| {
            LoadError::malformed(
                "either the file is not JSON formatted, or the file structure is invalid",
            )
        })?;
        let envelope = LayerEnvelope::from_value(&value)?;
        if let Some(vm) = self.store.get_mut(vm_id) {
            vm.deserialize_domain_version_id(&value)?;
        }

        if let Some(custom_url) = envelope.custom_data_url.clone() {
            // self-contained custom layer: open it directly, then fetch its
            // data source
            if let Some(vm) = self.store.get_mut(vm_id) {
                vm.deserialize(&value)?;
            }
            self.tabs.open_tab(
                OpenTabOptions {
                    title: "new layer".to_string(),
                    data: Some(vm_id),
                    is_closeable: true,
                    replace: true,
                    force_new: true,
                    is_data_table: true,
                },
                &mut self.store,
            );
            self.new_layer_from_url(
                RemoteBundleRequest {
                    url: custom_url,
                    version: envelope.version,
                    identifier: envelope.domain,
                },
                Some(value),
            )
            .await;
            Ok(())
        } else {
            let id = DomainVersionId::new(&envelope.domain, &envelope.version);
            if self.catalog.get_domain(&id).is_none() {
                return Err(LoadError::InvalidDomain {
                    domain: envelope.domain,
                    version: envelope.version,
                });
            }
            self.layer_upgrade(vm_id, value, true, false).await
        }
    }

    /// Fetch a layer document from a URL and load it, routing through the
    /// version-upgrade workflow. Always settles so a sequential caller can
    /// proceed to its next source.
    pub async fn load_layer_from_url(&mut self, url: &str, replace: bool, is_default: bool) {
        let value = match self.http().fetch_json(url).await {
            Ok(value) => value,
            Err(err) => {
                self.report(&err, &format!("retrieving layer from {url}"));
                return;
            }
        };

        let vm_id = self.store.new_view_model("loading layer...");
        if let Err(err) = self
            .route_fetched_layer(vm_id, value, replace, is_default)
            .await
        {
            self.store.destroy(vm_id);
            self.report(&err, &format!("parsing layer from {url}"));
            return;
        }
        info!(url, "loaded layer");
    }

    async fn route_fetched_layer(
        &mut self,
        vm_id: shared::domain::ViewModelId,
        value: Value,
        replace: bool,
        is_default: bool,
    ) -> Result<(), LoadError> {
        let envelope = LayerEnvelope::from_value(&value)?;
        if let Some(vm) = self.store.get_mut(vm_id) {
            vm.deserialize_domain_version_id(&value)?;
        }
        let id = DomainVersionId::new(&envelope.domain, &envelope.version);
        if self.catalog.get_domain(&id).is_none() {
            return Err(LoadError::InvalidDomain {
                domain: envelope.domain,
                version: envelope.version,
            });
        }
        self.layer_upgrade(vm_id, value, replace, is_default).await
    }

    /// Make sure every listed domain has its framework data, fetching any
    /// missing bundles concurrently and waiting for all of them.
    pub(crate) async fn ensure_domains_loaded(
        &mut self,
        ids: &[DomainVersionId],
    ) -> Result<(), LoadError> {
        let mut pending: Vec<(DomainVersionId, String)> = Vec::new();
        for id in ids {
            let domain = self.catalog.get_domain(id).ok_or_else(|| invalid_domain(id))?;
            if domain.data_loaded {
                continue;
            }
            let url = domain.urls.first().cloned().ok_or_else(|| {
                LoadError::malformed(format!("domain {id} has no data url"))
            })?;
            pending.push((id.clone(), url));
        }
        if pending.is_empty() {
            return Ok(());
        }

        let http = self.http();
        let fetches = pending.into_iter().map(|(id, url)| {
            let http = http.clone();
            async move { http.fetch_json(&url).await.map(|bundle| (id, bundle)) }
        });
        let bundles = futures::future::try_join_all(fetches).await?;
        for (id, bundle) in bundles {
            self.catalog.apply_bundle(&id, &bundle)?;
        }
        Ok(())
    }
}

fn first_non_empty(values: Vec<String>) -> Option<String> {
    values.into_iter().find(|value| !value.is_empty())
}
