use shared::domain::ViewModelId;
use tracing::debug;

use crate::viewmodel::ViewModelStore;

/// Stable handle for one tab; survives reordering and splicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(u64);

/// One session slot, hosting either a layer or the placeholder "new tab".
/// A tab without a `data_context` is the placeholder and is never counted
/// when mapping score-expression letters to tabs.
#[derive(Debug, Clone)]
pub struct Tab {
    pub id: TabId,
    pub title: String,
    pub is_closeable: bool,
    /// Data-table tabs have a user-editable title.
    pub is_data_table: bool,
    /// DomainVersionID string of the hosted layer, empty for the placeholder.
    pub domain: String,
    pub data_context: Option<ViewModelId>,
}

#[derive(Debug, Clone)]
pub struct OpenTabOptions {
    pub title: String,
    pub data: Option<ViewModelId>,
    pub is_closeable: bool,
    pub replace: bool,
    pub force_new: bool,
    pub is_data_table: bool,
}

/// Header dropdown state, cleared whenever a tab is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dropdown {
    #[default]
    None,
    Description,
}

/// Classification of a close, computed before the tab is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostClose {
    NotActive,
    ActiveFirstOfMany,
    ActiveNotFirst,
    ActiveSole,
}

/// Ordered collection of open tabs plus the single active-tab pointer.
pub struct TabManager {
    tabs: Vec<Tab>,
    active: Option<TabId>,
    next_id: u64,
    pub dropdown: Dropdown,
}

impl TabManager {
    pub fn new() -> Self {
        Self {
            tabs: Vec::new(),
            active: None,
            next_id: 0,
            dropdown: Dropdown::None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.iter()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn get_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|tab| tab.id == id)
    }

    pub fn active_id(&self) -> Option<TabId> {
        self.active
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn first_id(&self) -> Option<TabId> {
        self.tabs.first().map(|tab| tab.id)
    }

    pub fn find_by_title(&self, title: &str) -> Option<TabId> {
        self.tabs
            .iter()
            .find(|tab| tab.title == title)
            .map(|tab| tab.id)
    }

    pub fn find_by_data(&self, data: ViewModelId) -> Option<TabId> {
        self.tabs
            .iter()
            .find(|tab| tab.data_context == Some(data))
            .map(|tab| tab.id)
    }

    /// Number of data-bearing tabs, i.e. the size of the score-expression
    /// variable alphabet.
    pub fn data_tab_count(&self) -> usize {
        self.tabs
            .iter()
            .filter(|tab| tab.data_context.is_some())
            .count()
    }

    /// Open a tab. Re-activates an existing tab of the same title unless
    /// `force_new` is set; otherwise appends, or splices into the active
    /// tab's position when `replace` is set.
    pub fn open_tab(&mut self, options: OpenTabOptions, store: &mut ViewModelStore) -> TabId {
        if !options.force_new {
            if let Some(existing) = self.find_by_title(&options.title) {
                self.select_tab(existing, store);
                return existing;
            }
        }

        let domain = options
            .data
            .and_then(|id| store.get(id))
            .and_then(|vm| vm.domain_version_id.clone())
            .map(|id| id.0)
            .unwrap_or_default();
        let tab = Tab {
            id: self.allocate_id(),
            title: options.title,
            is_closeable: options.is_closeable,
            is_data_table: options.is_data_table,
            domain,
            data_context: options.data,
        };
        let id = tab.id;
        debug!(title = %tab.title, replace = options.replace, "opening tab");

        if !options.replace || self.tabs.is_empty() {
            self.tabs.push(tab);
            self.select_tab(id, store);
        } else if let Some(index) = self.active_index() {
            // close the active tab without letting it spawn a replacement,
            // then take its exact position
            self.close_active_tab(true, store);
            self.tabs.insert(index, tab);
            self.select_tab(id, store);
        } else {
            self.tabs.push(tab);
            self.select_tab(id, store);
        }

        self.dropdown = Dropdown::None;
        id
    }

    /// Activate a tab. Closing the layer-filtering search sidebar is a
    /// cross-cutting reset over every known ViewModel, not tab-scoped.
    pub fn select_tab(&mut self, id: TabId, store: &mut ViewModelStore) {
        self.active = Some(id);
        store.close_search_sidebars();
    }

    /// Close a tab, destroying its ViewModel. The post-close behavior is
    /// classified before removal; `allow_no_tab` suppresses any reselection
    /// or blank-tab creation (used during tab replacement).
    pub fn close_tab(&mut self, id: TabId, allow_no_tab: bool, store: &mut ViewModelStore) {
        let Some(index) = self.tabs.iter().position(|tab| tab.id == id) else {
            return;
        };

        let action = if self.active != Some(id) {
            PostClose::NotActive
        } else if index == 0 && self.tabs.len() > 1 {
            PostClose::ActiveFirstOfMany
        } else if index > 0 {
            PostClose::ActiveNotFirst
        } else {
            PostClose::ActiveSole
        };

        let tab = self.tabs.remove(index);
        if let Some(vm) = tab.data_context {
            store.destroy(vm);
        }
        if self.active == Some(id) {
            self.active = None;
        }
        debug!(title = %tab.title, ?action, "closed tab");

        if allow_no_tab {
            return;
        }
        match action {
            PostClose::NotActive => {}
            PostClose::ActiveFirstOfMany | PostClose::ActiveNotFirst => {
                if let Some(first) = self.first_id() {
                    self.select_tab(first, store);
                }
            }
            PostClose::ActiveSole => {
                self.new_blank_tab(false, store);
            }
        }
    }

    pub fn close_active_tab(&mut self, allow_no_tab: bool, store: &mut ViewModelStore) {
        if let Some(active) = self.active {
            self.close_tab(active, allow_no_tab, store);
        }
    }

    /// Open the placeholder landing tab.
    pub fn new_blank_tab(&mut self, replace: bool, store: &mut ViewModelStore) -> TabId {
        self.open_tab(
            OpenTabOptions {
                title: "new tab".to_string(),
                data: None,
                is_closeable: true,
                replace,
                force_new: false,
                is_data_table: false,
            },
            store,
        )
    }

    /// Activate on first click, toggle the description dropdown on a repeat
    /// click of the already-active tab.
    pub fn handle_tab_click(&mut self, id: TabId) {
        if self.active != Some(id) {
            self.active = Some(id);
            self.dropdown = Dropdown::None;
        } else {
            self.dropdown = match self.dropdown {
                Dropdown::Description => Dropdown::None,
                Dropdown::None => Dropdown::Description,
            };
        }
    }

    /// Score-expression variable for the tab at `index`: the Nth data-bearing
    /// tab before it determines the letter ('a' for the first data tab).
    /// The alphabet ends at 'z'; tabs past the 26th data tab have no letter.
    pub fn index_to_char(&self, index: usize) -> Option<char> {
        let data_tabs_before = self
            .tabs
            .iter()
            .take(index)
            .filter(|tab| tab.data_context.is_some())
            .count();
        if data_tabs_before < 26 {
            Some(char::from(b'a' + data_tabs_before as u8))
        } else {
            None
        }
    }

    /// Inverse of [`Self::index_to_char`]: None for any letter beyond the
    /// count of data-bearing tabs. Recomputed from live tab order on every
    /// call; see DESIGN.md.
    pub fn char_to_index(&self, ch: char) -> Option<usize> {
        if !ch.is_ascii_lowercase() {
            return None;
        }
        let position = u32::from(ch) - u32::from('a');
        let mut data_tabs_seen = 0u32;
        for (index, tab) in self.tabs.iter().enumerate() {
            if tab.data_context.is_some() {
                if data_tabs_seen == position {
                    return Some(index);
                }
                data_tabs_seen += 1;
            }
        }
        None
    }

    fn active_index(&self) -> Option<usize> {
        let active = self.active?;
        self.tabs.iter().position(|tab| tab.id == active)
    }

    fn allocate_id(&mut self) -> TabId {
        let id = TabId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl Default for TabManager {
    fn default() -> Self {
        Self::new()
    }
}
