use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Deserialize;
use serde_json::Value;
use shared::{
    domain::{DomainVersionId, ViewModelId},
    error::LoadError,
    layer::LayerEnvelope,
};
use tracing::debug;

use crate::{catalog::VersionChangelog, combine::ScoreExpression};

/// Score-to-color mapping for one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub colors: Vec<String>,
    pub min_value: f64,
    pub max_value: f64,
}

impl Default for Gradient {
    fn default() -> Self {
        Self {
            colors: vec![
                "#ff6666".to_string(),
                "#ffe766".to_string(),
                "#8ec843".to_string(),
            ],
            min_value: 0.0,
            max_value: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegendItem {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SidebarContent {
    #[default]
    None,
    Search,
    LayerUpgrade,
}

/// One analysis layer's full state: identifiers, per-technique annotations,
/// coloring and presentation flags. Tabs reference these by id through the
/// [`ViewModelStore`].
#[derive(Debug, Clone)]
pub struct ViewModel {
    pub id: ViewModelId,
    pub name: String,
    pub domain_version_id: Option<DomainVersionId>,
    pub domain: String,
    pub version: String,
    pub scores: BTreeMap<String, f64>,
    pub comments: BTreeMap<String, String>,
    pub links: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
    pub enabled: BTreeMap<String, bool>,
    pub coloring: BTreeMap<String, String>,
    pub gradient: Gradient,
    pub filters: Filters,
    pub legend_items: Vec<LegendItem>,
    pub sidebar_opened: bool,
    pub sidebar_content: SidebarContent,
    /// Set on an upgraded layer to mark the original it is being reviewed
    /// against.
    pub compare_to: Option<ViewModelId>,
    pub version_changelog: Option<VersionChangelog>,
    pub select_techniques_across_tactics: bool,
    pub data_loaded: bool,
}

/// Persisted annotation shape inside a layer document.
#[derive(Debug, Default, Deserialize)]
struct TechniqueAnnotation {
    #[serde(rename = "techniqueID")]
    technique_id: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    links: Option<String>,
    #[serde(default)]
    metadata: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GradientSnapshot {
    #[serde(default)]
    colors: Vec<String>,
    #[serde(rename = "minValue", default)]
    min_value: Option<f64>,
    #[serde(rename = "maxValue", default)]
    max_value: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LayerSnapshot {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    techniques: Vec<TechniqueAnnotation>,
    #[serde(default)]
    gradient: Option<GradientSnapshot>,
    #[serde(rename = "legendItems", default)]
    legend_items: Vec<LegendItem>,
    #[serde(default)]
    filters: Option<Filters>,
}

impl ViewModel {
    fn new(id: ViewModelId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            domain_version_id: None,
            domain: String::new(),
            version: String::new(),
            scores: BTreeMap::new(),
            comments: BTreeMap::new(),
            links: BTreeMap::new(),
            metadata: BTreeMap::new(),
            enabled: BTreeMap::new(),
            coloring: BTreeMap::new(),
            gradient: Gradient::default(),
            filters: Filters::default(),
            legend_items: Vec::new(),
            sidebar_opened: false,
            sidebar_content: SidebarContent::None,
            compare_to: None,
            version_changelog: None,
            select_techniques_across_tactics: true,
            data_loaded: false,
        }
    }

    pub fn set_domain_version(&mut self, identifier: &str, version: &str) {
        self.domain = identifier.to_lowercase();
        self.version = version.to_string();
        self.domain_version_id = Some(DomainVersionId::new(identifier, version));
    }

    /// Restore only the identifying fields from a persisted layer document.
    pub fn deserialize_domain_version_id(&mut self, value: &Value) -> Result<(), LoadError> {
        let envelope = LayerEnvelope::from_value(value)?;
        self.set_domain_version(&envelope.domain, &envelope.version);
        if let Some(name) = envelope.name {
            self.name = name;
        }
        Ok(())
    }

    /// Restore the full annotation state from a persisted layer document.
    pub fn deserialize(&mut self, value: &Value) -> Result<(), LoadError> {
        self.deserialize_domain_version_id(value)?;
        let snapshot: LayerSnapshot = serde_json::from_value(value.clone())
            .map_err(|err| LoadError::malformed(format!("invalid layer structure: {err}")))?;
        if let Some(name) = snapshot.name {
            self.name = name;
        }
        for annotation in snapshot.techniques {
            let id = annotation.technique_id;
            if let Some(score) = annotation.score {
                self.scores.insert(id.clone(), score);
            }
            if let Some(comment) = annotation.comment {
                self.comments.insert(id.clone(), comment);
            }
            if let Some(enabled) = annotation.enabled {
                self.enabled.insert(id.clone(), enabled);
            }
            if let Some(color) = annotation.color {
                self.coloring.insert(id.clone(), color);
            }
            if let Some(links) = annotation.links {
                self.links.insert(id.clone(), links);
            }
            if let Some(metadata) = annotation.metadata {
                self.metadata.insert(id, metadata);
            }
        }
        if let Some(gradient) = snapshot.gradient {
            if !gradient.colors.is_empty() {
                self.gradient.colors = gradient.colors;
            }
            if let Some(min_value) = gradient.min_value {
                self.gradient.min_value = min_value;
            }
            if let Some(max_value) = gradient.max_value {
                self.gradient.max_value = max_value;
            }
        }
        if !snapshot.legend_items.is_empty() {
            self.legend_items = snapshot.legend_items;
        }
        if let Some(filters) = snapshot.filters {
            self.filters = filters;
        }
        Ok(())
    }

    /// Hydrate display data. The heavy lifting lives with the renderer; the
    /// core only tracks that hydration happened.
    pub fn load_data(&mut self) {
        self.data_loaded = true;
        debug!(name = %self.name, "view model hydrated");
    }

    /// Stretch the gradient bounds to cover the current scores.
    pub fn update_gradient(&mut self) {
        let mut values = self.scores.values().copied();
        let Some(first) = values.next() else {
            return;
        };
        let (min, max) = values.fold((first, first), |(min, max), value| {
            (min.min(value), max.max(value))
        });
        self.gradient.min_value = self.gradient.min_value.min(min);
        self.gradient.max_value = self.gradient.max_value.max(max);
    }

    /// Seed the copy-forward of annotations from the original layer into this
    /// upgraded one. Techniques dropped by the new framework version are not
    /// carried over.
    pub fn init_copy_annotations(&mut self, old: &ViewModel) {
        let carried: Option<BTreeSet<&str>> = self.version_changelog.as_ref().map(|changelog| {
            changelog
                .unchanged
                .iter()
                .chain(changelog.changed.iter())
                .map(String::as_str)
                .collect()
        });
        let carry = |id: &str| carried.as_ref().map(|set| set.contains(id)).unwrap_or(true);
        for (id, score) in &old.scores {
            if carry(id) {
                self.scores.insert(id.clone(), *score);
            }
        }
        for (id, comment) in &old.comments {
            if carry(id) {
                self.comments.insert(id.clone(), comment.clone());
            }
        }
        for (id, enabled) in &old.enabled {
            if carry(id) {
                self.enabled.insert(id.clone(), *enabled);
            }
        }
    }
}

/// Sources for the per-result settings carried into a combined layer.
#[derive(Debug, Clone, Default)]
pub struct AuxSources {
    pub comments: Option<ViewModelId>,
    pub links: Option<ViewModelId>,
    pub metadata: Option<ViewModelId>,
    pub gradient: Option<ViewModelId>,
    pub coloring: Option<ViewModelId>,
    pub enabledness: Option<ViewModelId>,
    pub filters: Option<ViewModelId>,
    pub legend: Option<ViewModelId>,
}

/// Owns every live ViewModel; tabs and workflows reference them by id.
pub struct ViewModelStore {
    view_models: Vec<ViewModel>,
}

impl ViewModelStore {
    pub fn new() -> Self {
        Self {
            view_models: Vec::new(),
        }
    }

    pub fn new_view_model(&mut self, name: &str) -> ViewModelId {
        let id = ViewModelId::random();
        self.view_models.push(ViewModel::new(id, name));
        id
    }

    pub fn get(&self, id: ViewModelId) -> Option<&ViewModel> {
        self.view_models.iter().find(|vm| vm.id == id)
    }

    pub fn get_mut(&mut self, id: ViewModelId) -> Option<&mut ViewModel> {
        self.view_models.iter_mut().find(|vm| vm.id == id)
    }

    /// Destroying an already-destroyed ViewModel is a no-op; failure paths
    /// may race their own cleanup.
    pub fn destroy(&mut self, id: ViewModelId) {
        self.view_models.retain(|vm| vm.id != id);
    }

    pub fn len(&self) -> usize {
        self.view_models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view_models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewModel> {
        self.view_models.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.view_models.iter().map(|vm| vm.name.as_str())
    }

    pub fn by_domain(&self, domain_version_id: &DomainVersionId) -> Vec<&ViewModel> {
        self.view_models
            .iter()
            .filter(|vm| vm.domain_version_id.as_ref() == Some(domain_version_id))
            .collect()
    }

    /// Close the search sidebar on every ViewModel, whichever tab owns it.
    pub fn close_search_sidebars(&mut self) {
        for vm in &mut self.view_models {
            if vm.sidebar_content == SidebarContent::Search {
                vm.sidebar_opened = false;
                vm.sidebar_content = SidebarContent::None;
            }
        }
    }

    /// Evaluate a score expression over the bound layers, producing a new
    /// ViewModel in the target domain. Scores are computed per technique over
    /// the union of annotated techniques, with absent scores read as zero;
    /// auxiliary settings are copied from the given source layers.
    pub fn layer_operation(
        &mut self,
        name: &str,
        identifier: &str,
        version: &str,
        expression: &ScoreExpression,
        bindings: &HashMap<char, ViewModelId>,
        aux: &AuxSources,
    ) -> Result<ViewModelId, LoadError> {
        let mut technique_ids: BTreeSet<String> = BTreeSet::new();
        for vm_id in bindings.values() {
            let vm = self
                .get(*vm_id)
                .ok_or_else(|| LoadError::expression("a referenced layer no longer exists"))?;
            technique_ids.extend(vm.scores.keys().cloned());
        }

        let mut scores = BTreeMap::new();
        for technique_id in technique_ids {
            let mut scope = HashMap::new();
            for (variable, vm_id) in bindings {
                let score = self
                    .get(*vm_id)
                    .and_then(|vm| vm.scores.get(&technique_id).copied())
                    .unwrap_or(0.0);
                scope.insert(*variable, score);
            }
            scores.insert(technique_id, expression.evaluate(&scope)?);
        }

        let id = self.new_view_model(name);
        if let Some(vm) = self.get_mut(id) {
            vm.set_domain_version(identifier, version);
            vm.scores = scores;
        }
        self.copy_aux(id, aux);
        Ok(id)
    }

    fn copy_aux(&mut self, target: ViewModelId, aux: &AuxSources) {
        macro_rules! carry {
            ($source:expr, $field:ident) => {
                if let Some(from) = $source.and_then(|id| self.get(id)).map(|vm| vm.$field.clone())
                {
                    if let Some(vm) = self.get_mut(target) {
                        vm.$field = from;
                    }
                }
            };
        }
        carry!(aux.comments, comments);
        carry!(aux.links, links);
        carry!(aux.metadata, metadata);
        carry!(aux.gradient, gradient);
        carry!(aux.coloring, coloring);
        carry!(aux.enabledness, enabled);
        carry!(aux.filters, filters);
        carry!(aux.legend, legend_items);
    }
}

impl Default for ViewModelStore {
    fn default() -> Self {
        Self::new()
    }
}
