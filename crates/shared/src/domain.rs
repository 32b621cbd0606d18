use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Composite key identifying a framework domain at a specific version,
/// e.g. `foundation-v2.1`. The identifier half is always lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainVersionId(pub String);

impl DomainVersionId {
    pub fn new(identifier: &str, version: &str) -> Self {
        Self(format!("{}-v{}", identifier.to_lowercase(), version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to a ViewModel held by the view-model store. Tabs reference
/// layers by id rather than by pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewModelId(pub Uuid);

impl ViewModelId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ViewModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A framework version as tracked by the catalog. Catalog order is
/// newest-first; element 0 is the "current" version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub name: String,
    pub number: String,
}

impl Version {
    pub fn new(name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: number.into(),
        }
    }
}

/// One matrix entry of a loaded framework dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technique {
    pub id: String,
    pub name: String,
}

/// A named framework dataset at a specific version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainVersionId,
    pub name: String,
    pub identifier: String,
    pub version: Version,
    pub urls: Vec<String>,
    /// Loaded from a user-supplied URL rather than bundled with the build.
    pub is_custom: bool,
    pub data_loaded: bool,
    pub techniques: Vec<Technique>,
}

impl Domain {
    pub fn new(identifier: &str, name: &str, version: Version, urls: Vec<String>) -> Self {
        Self {
            id: DomainVersionId::new(identifier, &version.number),
            name: name.to_string(),
            identifier: identifier.to_lowercase(),
            version,
            urls,
            is_custom: false,
            data_loaded: false,
            techniques: Vec::new(),
        }
    }
}
