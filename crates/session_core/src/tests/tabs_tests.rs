use crate::{
    tabs::{Dropdown, OpenTabOptions, TabManager},
    viewmodel::{SidebarContent, ViewModelStore},
};

fn open_layer_tab(tabs: &mut TabManager, store: &mut ViewModelStore, title: &str) -> crate::TabId {
    let vm = store.new_view_model(title);
    tabs.open_tab(
        OpenTabOptions {
            title: title.to_string(),
            data: Some(vm),
            is_closeable: true,
            replace: false,
            force_new: true,
            is_data_table: true,
        },
        store,
    )
}

#[test]
fn same_title_reactivates_instead_of_growing() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let first = tabs.open_tab(
        OpenTabOptions {
            title: "help".to_string(),
            data: None,
            is_closeable: true,
            replace: false,
            force_new: false,
            is_data_table: false,
        },
        &mut store,
    );
    open_layer_tab(&mut tabs, &mut store, "layer");

    let again = tabs.open_tab(
        OpenTabOptions {
            title: "help".to_string(),
            data: None,
            is_closeable: true,
            replace: false,
            force_new: false,
            is_data_table: false,
        },
        &mut store,
    );

    assert_eq!(again, first);
    assert_eq!(tabs.len(), 2);
    assert_eq!(tabs.active_id(), Some(first));
}

#[test]
fn force_new_duplicates_the_title() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let first = open_layer_tab(&mut tabs, &mut store, "layer");
    let second = open_layer_tab(&mut tabs, &mut store, "layer");

    assert_ne!(first, second);
    assert_eq!(tabs.len(), 2);
}

#[test]
fn replace_splices_into_the_active_position() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    open_layer_tab(&mut tabs, &mut store, "left");
    let middle = open_layer_tab(&mut tabs, &mut store, "middle");
    open_layer_tab(&mut tabs, &mut store, "right");
    tabs.select_tab(middle, &mut store);

    let vm = store.new_view_model("replacement");
    let replacement = tabs.open_tab(
        OpenTabOptions {
            title: "replacement".to_string(),
            data: Some(vm),
            is_closeable: true,
            replace: true,
            force_new: true,
            is_data_table: true,
        },
        &mut store,
    );

    assert_eq!(tabs.len(), 3);
    let titles: Vec<_> = tabs.iter().map(|tab| tab.title.as_str()).collect();
    assert_eq!(titles, vec!["left", "replacement", "right"]);
    assert_eq!(tabs.active_id(), Some(replacement));
    // the replaced tab's ViewModel is gone
    assert!(tabs.find_by_title("middle").is_none());
    assert_eq!(store.len(), 3);
}

#[test]
fn replace_on_empty_collection_appends() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let id = tabs.new_blank_tab(true, &mut store);
    assert_eq!(tabs.len(), 1);
    assert_eq!(tabs.active_id(), Some(id));
}

#[test]
fn closing_an_inactive_tab_keeps_the_active_one() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let first = open_layer_tab(&mut tabs, &mut store, "first");
    let second = open_layer_tab(&mut tabs, &mut store, "second");
    tabs.select_tab(second, &mut store);

    tabs.close_tab(first, false, &mut store);

    assert_eq!(tabs.len(), 1);
    assert_eq!(tabs.active_id(), Some(second));
}

#[test]
fn closing_the_active_tab_falls_back_to_the_first() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let first = open_layer_tab(&mut tabs, &mut store, "first");
    open_layer_tab(&mut tabs, &mut store, "second");
    let third = open_layer_tab(&mut tabs, &mut store, "third");
    tabs.select_tab(third, &mut store);

    tabs.close_tab(third, false, &mut store);
    assert_eq!(tabs.active_id(), Some(first));

    // active-and-first of many: the new first tab takes over
    tabs.close_tab(first, false, &mut store);
    assert_eq!(tabs.len(), 1);
    assert_eq!(tabs.active_id(), tabs.first_id());
}

#[test]
fn closing_the_only_tab_spawns_a_blank_one() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let only = open_layer_tab(&mut tabs, &mut store, "only");
    tabs.select_tab(only, &mut store);

    tabs.close_tab(only, false, &mut store);

    assert_eq!(tabs.len(), 1);
    let blank = tabs.active_tab().expect("blank tab active");
    assert_eq!(blank.title, "new tab");
    assert!(blank.data_context.is_none());
    assert!(store.is_empty());
}

#[test]
fn allow_no_tab_suppresses_the_blank_replacement() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let only = open_layer_tab(&mut tabs, &mut store, "only");
    tabs.select_tab(only, &mut store);

    tabs.close_tab(only, true, &mut store);

    assert!(tabs.is_empty());
    assert!(tabs.active_id().is_none());
    assert!(store.is_empty());
}

#[test]
fn closing_a_tab_destroys_its_view_model() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let id = open_layer_tab(&mut tabs, &mut store, "doomed");
    let vm = tabs.get(id).and_then(|tab| tab.data_context).expect("vm");

    tabs.close_tab(id, true, &mut store);

    assert!(store.get(vm).is_none());
}

#[test]
fn selecting_a_tab_closes_search_sidebars_everywhere() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let first = open_layer_tab(&mut tabs, &mut store, "first");
    let second = open_layer_tab(&mut tabs, &mut store, "second");
    let vm = tabs.get(first).and_then(|tab| tab.data_context).expect("vm");
    {
        let vm = store.get_mut(vm).expect("vm");
        vm.sidebar_opened = true;
        vm.sidebar_content = SidebarContent::Search;
    }

    tabs.select_tab(second, &mut store);

    let vm = store.get(vm).expect("vm");
    assert!(!vm.sidebar_opened);
    assert_eq!(vm.sidebar_content, SidebarContent::None);
}

#[test]
fn selecting_a_tab_leaves_upgrade_sidebars_open() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let first = open_layer_tab(&mut tabs, &mut store, "first");
    let second = open_layer_tab(&mut tabs, &mut store, "second");
    let vm = tabs.get(first).and_then(|tab| tab.data_context).expect("vm");
    {
        let vm = store.get_mut(vm).expect("vm");
        vm.sidebar_opened = true;
        vm.sidebar_content = SidebarContent::LayerUpgrade;
    }

    tabs.select_tab(second, &mut store);

    let vm = store.get(vm).expect("vm");
    assert!(vm.sidebar_opened);
    assert_eq!(vm.sidebar_content, SidebarContent::LayerUpgrade);
}

#[test]
fn repeat_click_toggles_the_description_dropdown() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let first = open_layer_tab(&mut tabs, &mut store, "first");
    let second = open_layer_tab(&mut tabs, &mut store, "second");

    tabs.handle_tab_click(first);
    assert_eq!(tabs.active_id(), Some(first));
    assert_eq!(tabs.dropdown, Dropdown::None);

    tabs.handle_tab_click(first);
    assert_eq!(tabs.dropdown, Dropdown::Description);
    tabs.handle_tab_click(first);
    assert_eq!(tabs.dropdown, Dropdown::None);

    // moving to another tab clears it
    tabs.handle_tab_click(first);
    tabs.handle_tab_click(second);
    assert_eq!(tabs.dropdown, Dropdown::None);
}

#[test]
fn opening_a_tab_clears_the_dropdown() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    let first = open_layer_tab(&mut tabs, &mut store, "first");
    tabs.handle_tab_click(first);
    tabs.handle_tab_click(first);
    assert_eq!(tabs.dropdown, Dropdown::Description);

    open_layer_tab(&mut tabs, &mut store, "second");
    assert_eq!(tabs.dropdown, Dropdown::None);
}

#[test]
fn variable_letters_skip_placeholder_tabs() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    tabs.new_blank_tab(false, &mut store);
    open_layer_tab(&mut tabs, &mut store, "first");
    open_layer_tab(&mut tabs, &mut store, "second");

    // indices 1 and 2 are the data tabs, the blank tab at 0 has no letter
    assert_eq!(tabs.index_to_char(1), Some('a'));
    assert_eq!(tabs.index_to_char(2), Some('b'));
    assert_eq!(tabs.char_to_index('a'), Some(1));
    assert_eq!(tabs.char_to_index('b'), Some(2));
    assert_eq!(tabs.char_to_index('c'), None);
    assert_eq!(tabs.char_to_index('A'), None);
    assert_eq!(tabs.data_tab_count(), 2);
}

#[test]
fn variable_letters_end_at_z() {
    let mut tabs = TabManager::new();
    let mut store = ViewModelStore::new();
    for n in 0..30 {
        open_layer_tab(&mut tabs, &mut store, &format!("layer{n}"));
    }

    assert_eq!(tabs.index_to_char(0), Some('a'));
    assert_eq!(tabs.index_to_char(25), Some('z'));
    assert_eq!(tabs.index_to_char(26), None);
    assert_eq!(tabs.index_to_char(29), None);
    assert_eq!(tabs.char_to_index('z'), Some(25));
}
