use std::{fs, path::Path};

use serde::Deserialize;
use shared::domain::{Domain, Version};
use tracing::warn;

use crate::{catalog::DomainCatalog, fragment::named_fragment_values};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultLayersConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub subfeatures: Vec<Feature>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionConfig {
    pub name: String,
    pub number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainConfig {
    pub name: String,
    pub identifier: String,
    pub version: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Ordered newest-first; the first entry is the current version.
    #[serde(default)]
    pub versions: Vec<VersionConfig>,
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
    #[serde(default)]
    pub default_layers: DefaultLayersConfig,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub banner: Option<String>,
}

/// Load configuration: built-in defaults, then the TOML file if readable,
/// then environment overrides. Unreadable or malformed files fall back to
/// the defaults rather than failing startup.
pub fn load_config(path: &Path) -> AppConfig {
    let mut config = AppConfig::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<AppConfig>(&raw) {
            Ok(parsed) => config = parsed,
            Err(err) => warn!(%err, path = %path.display(), "ignoring malformed config file"),
        }
    }

    if let Ok(value) = std::env::var("NAVIGATOR__DEFAULT_LAYERS_ENABLED") {
        config.default_layers.enabled = value == "true" || value == "1";
    }
    if let Ok(value) = std::env::var("NAVIGATOR__BANNER") {
        config.banner = Some(value);
    }

    config
}

impl AppConfig {
    /// Assemble the domain/version catalog from the configured entries. A
    /// domain naming an unlisted version gets a synthesized entry so it still
    /// resolves, though it will never be the current version.
    pub fn build_catalog(&self) -> DomainCatalog {
        let mut catalog = DomainCatalog::new(
            self.versions
                .iter()
                .map(|version| Version::new(version.name.clone(), version.number.clone()))
                .collect(),
        );
        for domain in &self.domains {
            let version = match catalog.find_version(&domain.version) {
                Some(version) => version.clone(),
                None => {
                    let version =
                        Version::new(format!("v{}", domain.version), domain.version.clone());
                    catalog.register_version(version.clone());
                    version
                }
            };
            catalog.add_domain(Domain::new(
                &domain.identifier,
                &domain.name,
                version,
                domain.urls.clone(),
            ));
        }
        catalog
    }

    pub fn feature_enabled(&self, name: &str) -> bool {
        fn find(features: &[Feature], name: &str) -> Option<bool> {
            for feature in features {
                if feature.name == name {
                    return Some(feature.enabled);
                }
                if let Some(enabled) = find(&feature.subfeatures, name) {
                    return Some(enabled);
                }
            }
            None
        }
        find(&self.features, name).unwrap_or(false)
    }

    /// Apply fragment toggles: any fragment parameter `name=false` whose name
    /// matches a feature or subfeature disables it.
    pub fn apply_fragment_overrides(&mut self, url: &str) {
        fn walk(features: &mut [Feature], url: &str) {
            for feature in features {
                if named_fragment_values(&feature.name, url)
                    .iter()
                    .any(|value| value == "false")
                {
                    feature.enabled = false;
                }
                walk(&mut feature.subfeatures, url);
            }
        }
        walk(&mut self.features, url);
    }

    /// Names of every disabled feature, for shareable-link generation. A
    /// feature with subfeatures contributes its subfeatures, not itself.
    pub fn disabled_feature_names(&self) -> Vec<String> {
        fn walk(features: &[Feature], out: &mut Vec<String>) {
            for feature in features {
                if feature.subfeatures.is_empty() {
                    if !feature.enabled {
                        out.push(feature.name.clone());
                    }
                } else {
                    walk(&feature.subfeatures, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.features, &mut out);
        out
    }
}
