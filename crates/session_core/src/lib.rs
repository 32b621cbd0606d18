//! Session/workspace manager for the matrix navigator: the tab lifecycle,
//! the multi-source layer-loading pipeline, the version-upgrade workflow and
//! the score-combination engine. Rendering, dialog chrome and transport are
//! external collaborators reached through the trait seams declared here.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use shared::error::LoadError;
use tracing::{error, warn};

pub mod catalog;
pub mod combine;
pub mod config;
pub mod fragment;
pub mod link;
pub mod loader;
pub mod namer;
pub mod tabs;
pub mod upgrade;
pub mod viewmodel;

pub use catalog::{DomainCatalog, VersionChangelog};
pub use combine::CombineRequest;
pub use config::{AppConfig, DefaultLayersConfig, Feature};
pub use loader::RemoteBundleRequest;
pub use tabs::{OpenTabOptions, Tab, TabId, TabManager};
pub use viewmodel::{SidebarContent, ViewModel, ViewModelStore};

/// Asynchronous JSON-over-HTTP collaborator. Implementations yield either the
/// parsed body or a [`LoadError`] carrying the response status, with status 0
/// meaning no response was received at all.
#[async_trait]
pub trait HttpGateway: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, LoadError>;
}

pub struct MissingHttpGateway;

#[async_trait]
impl HttpGateway for MissingHttpGateway {
    async fn fetch_json(&self, url: &str) -> Result<Value, LoadError> {
        Err(LoadError::Transport {
            url: url.to_string(),
        })
    }
}

pub struct ReqwestGateway {
    http: reqwest::Client,
}

impl ReqwestGateway {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpGateway for ReqwestGateway {
    async fn fetch_json(&self, url: &str) -> Result<Value, LoadError> {
        let response = self.http.get(url).send().await.map_err(|err| {
            error!(%err, url, "request yielded no response");
            LoadError::Transport {
                url: url.to_string(),
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Application {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(|err| {
            error!(%err, url, "response body is not valid JSON");
            LoadError::malformed(format!("response from {url} is not valid JSON"))
        })
    }
}

/// What the user chose in the version-upgrade dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeDecision {
    Upgrade,
    KeepCurrent,
}

#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    pub layer_name: String,
    pub layer_version: String,
    pub current_version: String,
}

/// Modal dialog collaborator for the version-upgrade workflow. An `Err`
/// (dialog dismissed without a definite choice) is treated as a load failure
/// by the caller.
#[async_trait]
pub trait UpgradePrompt: Send + Sync {
    async fn confirm_upgrade(&self, request: UpgradeRequest) -> Result<UpgradeDecision>;
}

pub struct MissingUpgradePrompt;

#[async_trait]
impl UpgradePrompt for MissingUpgradePrompt {
    async fn confirm_upgrade(&self, request: UpgradeRequest) -> Result<UpgradeDecision> {
        Err(anyhow!(
            "no upgrade dialog available for layer '{}'",
            request.layer_name
        ))
    }
}

/// Blocking modal alert presentation. All user-facing failures go through
/// this seam so hosts can swap in their own dialog chrome.
pub trait AlertSink: Send + Sync {
    fn alert(&self, message: &str);
}

/// Default sink for headless hosts: alerts only reach the log.
pub struct LoggingAlertSink;

impl AlertSink for LoggingAlertSink {
    fn alert(&self, message: &str) {
        error!(message, "alert");
    }
}

/// Access to the hosting page, injected so the core is testable without a
/// real browser.
pub trait HostEnvironment: Send + Sync {
    fn current_url(&self) -> String;
}

pub struct StaticEnvironment {
    url: String,
}

impl StaticEnvironment {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl HostEnvironment for StaticEnvironment {
    fn current_url(&self) -> String {
        self.url.clone()
    }
}

/// The session root: the ordered tab collection, the view-model store, the
/// domain/version catalog and the injected collaborators. All workflows in
/// [`loader`], [`upgrade`] and [`combine`] are implemented on this type.
pub struct SessionWorkspace {
    pub tabs: TabManager,
    pub store: ViewModelStore,
    pub catalog: DomainCatalog,
    http: Arc<dyn HttpGateway>,
    prompt: Arc<dyn UpgradePrompt>,
    alerts: Arc<dyn AlertSink>,
    env: Arc<dyn HostEnvironment>,
}

impl SessionWorkspace {
    pub fn new(catalog: DomainCatalog) -> Self {
        Self::new_with_dependencies(
            catalog,
            Arc::new(MissingHttpGateway),
            Arc::new(MissingUpgradePrompt),
            Arc::new(LoggingAlertSink),
            Arc::new(StaticEnvironment::new("")),
        )
    }

    pub fn new_with_dependencies(
        catalog: DomainCatalog,
        http: Arc<dyn HttpGateway>,
        prompt: Arc<dyn UpgradePrompt>,
        alerts: Arc<dyn AlertSink>,
        env: Arc<dyn HostEnvironment>,
    ) -> Self {
        Self {
            tabs: TabManager::new(),
            store: ViewModelStore::new(),
            catalog,
            http,
            prompt,
            alerts,
            env,
        }
    }

    pub(crate) fn http(&self) -> Arc<dyn HttpGateway> {
        Arc::clone(&self.http)
    }

    pub(crate) fn prompt(&self) -> Arc<dyn UpgradePrompt> {
        Arc::clone(&self.prompt)
    }

    pub(crate) fn page_url(&self) -> String {
        self.env.current_url()
    }

    /// Surface a failure: alert the user with the fixed template and log the
    /// full detail. Transport failures (status 0) and application failures
    /// are alerted identically but logged distinctly.
    pub(crate) fn report(&self, err: &LoadError, context: &str) {
        match err.status() {
            Some(0) => error!(%err, context, "no response received"),
            Some(status) => warn!(%err, status, context, "request failed"),
            None => error!(%err, context, "load failed"),
        }
        self.alerts.alert(&format!("ERROR {context}: {err}"));
    }
}

#[cfg(test)]
mod tests;
