use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use shared::{
    domain::{Domain, DomainVersionId, Technique, Version},
    error::LoadError,
};
use tracing::info;

/// Per-technique differences between two framework versions, computed when a
/// layer is upgraded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionChangelog {
    pub unchanged: Vec<String>,
    pub changed: Vec<String>,
    pub additions: Vec<String>,
    pub removals: Vec<String>,
}

/// Framework bundle shape fetched from a domain data URL.
#[derive(Debug, Deserialize)]
struct DomainBundle {
    #[serde(default)]
    techniques: Vec<Technique>,
}

/// The domain/version catalog: which framework datasets this build knows
/// about, which one is current, and the loaded data for each.
pub struct DomainCatalog {
    /// Ordered newest-first; element 0 is the current version.
    versions: Vec<Version>,
    domains: Vec<Domain>,
}

impl DomainCatalog {
    pub fn new(versions: Vec<Version>) -> Self {
        Self {
            versions,
            domains: Vec::new(),
        }
    }

    pub fn add_domain(&mut self, domain: Domain) {
        self.domains.push(domain);
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn current_version(&self) -> Option<&Version> {
        self.versions.first()
    }

    /// A version is supported when this build's catalog knows it.
    pub fn is_supported(&self, number: &str) -> bool {
        self.versions.iter().any(|version| version.number == number)
    }

    pub fn find_version(&self, number: &str) -> Option<&Version> {
        self.versions.iter().find(|version| version.number == number)
    }

    pub fn register_version(&mut self, version: Version) {
        if self.find_version(&version.number).is_none() {
            self.versions.push(version);
        }
    }

    pub fn get_domain(&self, id: &DomainVersionId) -> Option<&Domain> {
        self.domains.iter().find(|domain| &domain.id == id)
    }

    pub fn get_domain_mut(&mut self, id: &DomainVersionId) -> Option<&mut Domain> {
        self.domains.iter_mut().find(|domain| &domain.id == id)
    }

    /// Register a user-supplied dataset under its own domain entry.
    pub fn register_custom_domain(
        &mut self,
        identifier: &str,
        version: Version,
        url: &str,
    ) -> DomainVersionId {
        let mut domain = Domain::new(identifier, identifier, version, vec![url.to_string()]);
        domain.is_custom = true;
        let id = domain.id.clone();
        info!(domain = %id, url, "registered custom domain");
        self.domains.push(domain);
        id
    }

    /// Install a fetched framework bundle into the domain entry.
    pub fn apply_bundle(&mut self, id: &DomainVersionId, bundle: &Value) -> Result<(), LoadError> {
        let parsed: DomainBundle = serde_json::from_value(bundle.clone()).map_err(|err| {
            LoadError::malformed(format!("invalid framework bundle for {id}: {err}"))
        })?;
        let domain = self
            .get_domain_mut(id)
            .ok_or_else(|| invalid_domain(id))?;
        domain.techniques = parsed.techniques;
        domain.data_loaded = true;
        info!(domain = %id, techniques = domain.techniques.len(), "domain data loaded");
        Ok(())
    }

    /// Inter-version changelog between two loaded domains, keyed by
    /// technique id.
    pub fn compare_versions(
        &self,
        old: &DomainVersionId,
        new: &DomainVersionId,
    ) -> VersionChangelog {
        let old_techniques: BTreeMap<&str, &str> = self
            .get_domain(old)
            .map(|domain| {
                domain
                    .techniques
                    .iter()
                    .map(|technique| (technique.id.as_str(), technique.name.as_str()))
                    .collect()
            })
            .unwrap_or_default();
        let new_techniques: BTreeMap<&str, &str> = self
            .get_domain(new)
            .map(|domain| {
                domain
                    .techniques
                    .iter()
                    .map(|technique| (technique.id.as_str(), technique.name.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        let mut changelog = VersionChangelog::default();
        for (id, name) in &new_techniques {
            match old_techniques.get(id) {
                Some(old_name) if old_name == name => changelog.unchanged.push(id.to_string()),
                Some(_) => changelog.changed.push(id.to_string()),
                None => changelog.additions.push(id.to_string()),
            }
        }
        for id in old_techniques.keys() {
            if !new_techniques.contains_key(id) {
                changelog.removals.push(id.to_string());
            }
        }
        changelog
    }
}

pub(crate) fn invalid_domain(id: &DomainVersionId) -> LoadError {
    let (domain, version) = id
        .as_str()
        .rsplit_once("-v")
        .unwrap_or((id.as_str(), ""));
    LoadError::InvalidDomain {
        domain: domain.to_string(),
        version: version.to_string(),
    }
}
