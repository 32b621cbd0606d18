use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{
    domain::{Domain, Version},
    error::LoadError,
};

use crate::{
    AlertSink, DomainCatalog, HttpGateway, SessionWorkspace, StaticEnvironment, UpgradeDecision,
    UpgradePrompt, UpgradeRequest,
};

pub(crate) const FOUNDATION_NEW_URL: &str = "https://data.test/foundation-2.1.json";
pub(crate) const FOUNDATION_OLD_URL: &str = "https://data.test/foundation-1.0.json";

/// Scripted HTTP collaborator: url -> body or failing status, recording every
/// request. Unknown URLs behave like a connection failure (status 0).
pub(crate) struct StubHttpGateway {
    responses: Mutex<HashMap<String, Result<Value, u16>>>,
    pub requests: Mutex<Vec<String>>,
}

impl StubHttpGateway {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_json(self, url: &str, body: Value) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .insert(url.to_string(), Ok(body));
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .insert(url.to_string(), Err(status));
        self
    }

    pub fn requested(&self, url: &str) -> bool {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .any(|requested| requested == url)
    }
}

#[async_trait]
impl HttpGateway for StubHttpGateway {
    async fn fetch_json(&self, url: &str) -> Result<Value, LoadError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(url.to_string());
        match self.responses.lock().expect("responses lock").get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(LoadError::Application {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(LoadError::Transport {
                url: url.to_string(),
            }),
        }
    }
}

pub(crate) struct RecordingAlertSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages lock").clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|message| message.contains(needle))
    }

    pub fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }
}

impl AlertSink for RecordingAlertSink {
    fn alert(&self, message: &str) {
        self.messages
            .lock()
            .expect("messages lock")
            .push(message.to_string());
    }
}

pub(crate) struct ScriptedUpgradePrompt {
    decision: UpgradeDecision,
    calls: AtomicUsize,
}

impl ScriptedUpgradePrompt {
    pub fn new(decision: UpgradeDecision) -> Self {
        Self {
            decision,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpgradePrompt for ScriptedUpgradePrompt {
    async fn confirm_upgrade(&self, _request: UpgradeRequest) -> Result<UpgradeDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.decision)
    }
}

/// Catalog with a current 2.1 and a still-supported 1.0 foundation domain.
pub(crate) fn test_catalog() -> DomainCatalog {
    let mut catalog = DomainCatalog::new(vec![
        Version::new("v2.1", "2.1"),
        Version::new("v1.0", "1.0"),
    ]);
    catalog.add_domain(Domain::new(
        "foundation",
        "Foundation",
        Version::new("v2.1", "2.1"),
        vec![FOUNDATION_NEW_URL.to_string()],
    ));
    catalog.add_domain(Domain::new(
        "foundation",
        "Foundation",
        Version::new("v1.0", "1.0"),
        vec![FOUNDATION_OLD_URL.to_string()],
    ));
    catalog
}

/// Same domains, but the build only supports 2.1: the 1.0 dataset exists in
/// the catalog while its version is no longer readable.
pub(crate) fn catalog_with_unsupported_old() -> DomainCatalog {
    let mut catalog = DomainCatalog::new(vec![Version::new("v2.1", "2.1")]);
    catalog.add_domain(Domain::new(
        "foundation",
        "Foundation",
        Version::new("v2.1", "2.1"),
        vec![FOUNDATION_NEW_URL.to_string()],
    ));
    catalog.add_domain(Domain::new(
        "foundation",
        "Foundation",
        Version::new("v1.0", "1.0"),
        vec![FOUNDATION_OLD_URL.to_string()],
    ));
    catalog
}

pub(crate) fn bundle(techniques: &[(&str, &str)]) -> Value {
    json!({
        "techniques": techniques
            .iter()
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect::<Vec<_>>()
    })
}

pub(crate) fn old_bundle() -> Value {
    bundle(&[("T1", "Probe"), ("T2", "Flood"), ("T3", "Spoof")])
}

pub(crate) fn new_bundle() -> Value {
    bundle(&[("T1", "Probe"), ("T2", "Flood v2"), ("T4", "Drift")])
}

pub(crate) fn layer_json(
    domain: &str,
    version: &str,
    name: Option<&str>,
    scores: &[(&str, f64)],
) -> Value {
    let mut layer = json!({
        "domain": domain,
        "version": version,
        "techniques": scores
            .iter()
            .map(|(id, score)| json!({"techniqueID": id, "score": score}))
            .collect::<Vec<_>>()
    });
    if let Some(name) = name {
        layer["name"] = json!(name);
    }
    layer
}

pub(crate) struct Fixture {
    pub ws: SessionWorkspace,
    pub http: Arc<StubHttpGateway>,
    pub alerts: Arc<RecordingAlertSink>,
    pub prompt: Arc<ScriptedUpgradePrompt>,
}

pub(crate) fn fixture(
    page_url: &str,
    catalog: DomainCatalog,
    http: StubHttpGateway,
    decision: UpgradeDecision,
) -> Fixture {
    let http = Arc::new(http);
    let alerts = Arc::new(RecordingAlertSink::new());
    let prompt = Arc::new(ScriptedUpgradePrompt::new(decision));
    let ws = SessionWorkspace::new_with_dependencies(
        catalog,
        Arc::clone(&http) as Arc<dyn HttpGateway>,
        Arc::clone(&prompt) as Arc<dyn UpgradePrompt>,
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
        Arc::new(StaticEnvironment::new(page_url)),
    );
    Fixture {
        ws,
        http,
        alerts,
        prompt,
    }
}
