//! Tests for the tree engine through its public surface.

use std::sync::Arc;

use horizon_arbor::prelude::*;
use parking_lot::Mutex;
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// ```text
/// docs
/// ├── guides
/// │   ├── intro
/// │   └── setup
/// └── api
/// misc
/// ```
fn nested_items() -> Vec<TreeItem> {
    vec![
        TreeItem::new("docs", "Docs").with_children(vec![
            TreeItem::new("guides", "Guides").with_children(vec![
                TreeItem::new("intro", "Intro"),
                TreeItem::new("setup", "Setup"),
            ]),
            TreeItem::new("api", "API"),
        ]),
        TreeItem::new("misc", "Misc"),
    ]
}

fn flat_items() -> Vec<TreeItem> {
    vec![
        // Children may precede their parents.
        TreeItem::new("intro", "Intro").with_parent("guides"),
        TreeItem::new("docs", "Docs"),
        TreeItem::new("guides", "Guides").with_parent("docs"),
        TreeItem::new("setup", "Setup").with_parent("guides"),
        TreeItem::new("api", "API").with_parent("docs"),
        TreeItem::new("misc", "Misc"),
    ]
}

fn nested_manager() -> Arc<TreeManager> {
    init_tracing();
    TreeManager::from_items(nested_items(), TreeConfig::default()).unwrap()
}

fn node(manager: &TreeManager, value: &str) -> Arc<TreeNode> {
    manager.find_tree_node(value).unwrap()
}

fn values(nodes: &[Arc<TreeNode>]) -> Vec<String> {
    nodes.iter().filter_map(|node| node.value()).collect()
}

/// Leaves in the subtree of `key`, or the item itself if it has none.
fn leaves(manager: &TreeManager, key: ItemKey) -> Vec<ItemKey> {
    let mut out: Vec<ItemKey> = manager
        .get_item_descendants(key, None)
        .unwrap()
        .iter()
        .filter(|node| !node.is_parent())
        .map(|node| node.key())
        .collect();
    if out.is_empty() {
        out.push(key);
    }
    out
}

fn assert_tri_state(manager: &TreeManager) {
    for root in manager.roots() {
        for item in std::iter::once(root.clone()).chain(root.descendants(None)) {
            let states: Vec<CheckState> = leaves(manager, item.key())
                .into_iter()
                .map(|leaf| manager.get_item_checked_state(leaf).unwrap())
                .collect();
            let expected = if states.iter().all(|state| state.is_checked()) {
                CheckState::Checked
            } else if states.iter().all(|state| *state == CheckState::Unchecked) {
                CheckState::Unchecked
            } else {
                CheckState::Indeterminate
            };
            assert_eq!(
                item.check_state(),
                Some(expected),
                "item {:?}",
                item.value()
            );
        }
    }
}

#[test]
fn test_parent_reflects_leaves() {
    let manager = nested_manager();
    assert_tri_state(&manager);

    for value in ["intro", "api", "setup", "guides", "docs", "misc"] {
        manager.toggle_item(node(&manager, value).key()).unwrap();
        assert_tri_state(&manager);
    }
    manager.check_all();
    assert_tri_state(&manager);
    manager.uncheck_item(node(&manager, "setup").key()).unwrap();
    assert_tri_state(&manager);
}

#[test]
fn test_check_then_read() {
    let manager = nested_manager();
    for value in ["docs", "guides", "intro", "misc"] {
        let key = node(&manager, value).key();
        manager.check_item(key).unwrap();
        assert_eq!(manager.get_item_checked_state(key).unwrap(), CheckState::Checked);
    }
}

#[test]
fn test_expand_collapse_round_trip() {
    let manager = nested_manager();
    let guides = node(&manager, "guides").key();
    let before = manager.is_item_expanded(guides).unwrap();

    manager.expand_item(guides).unwrap();
    assert!(manager.is_item_expanded(guides).unwrap());
    manager.collapse_item(guides).unwrap();
    assert_eq!(manager.is_item_expanded(guides).unwrap(), before);

    // Expansion is independent of ancestors.
    assert!(!manager.is_item_expanded(node(&manager, "docs").key()).unwrap());
}

#[test]
fn test_handles_are_identity_stable() {
    let manager = nested_manager();
    let key = node(&manager, "intro").key();
    let first = manager.get_tree_node(key).unwrap();
    let second = manager.get_tree_node(key).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let via_children = manager
        .get_item_children(node(&manager, "guides").key())
        .unwrap();
    assert!(Arc::ptr_eq(&first, &via_children[0]));
}

#[test]
fn test_descendants_depth_one_is_children() {
    let manager = nested_manager();
    for value in ["docs", "guides", "intro", "misc"] {
        let key = node(&manager, value).key();
        assert_eq!(
            manager.get_item_descendants(key, Some(1)).unwrap(),
            manager.get_item_children(key).unwrap()
        );
    }
    let docs = node(&manager, "docs").key();
    assert!(manager.get_item_descendants(docs, Some(0)).unwrap().is_empty());
    assert_eq!(
        values(&manager.get_item_descendants(docs, None).unwrap()),
        vec!["guides", "intro", "setup", "api"]
    );
}

#[test]
fn test_ancestors_nearest_first() {
    let manager = nested_manager();
    let intro = node(&manager, "intro").key();
    assert_eq!(
        values(&manager.get_item_ancestors(intro).unwrap()),
        vec!["guides", "docs"]
    );
    assert!(manager
        .get_item_ancestors(node(&manager, "misc").key())
        .unwrap()
        .is_empty());
}

#[test]
fn test_two_children_scenario() {
    init_tracing();
    let manager = TreeManager::from_items(
        vec![TreeItem::new("a", "A").with_children(vec![
            TreeItem::new("b", "B"),
            TreeItem::new("c", "C"),
        ])],
        TreeConfig::default(),
    )
    .unwrap();
    let a = node(&manager, "a").key();
    assert_eq!(manager.get_item_checked_state(a).unwrap(), CheckState::Unchecked);

    manager.check_item(node(&manager, "b").key()).unwrap();
    assert_eq!(manager.get_item_checked_state(a).unwrap(), CheckState::Indeterminate);

    manager.check_item(node(&manager, "c").key()).unwrap();
    assert_eq!(manager.get_item_checked_state(a).unwrap(), CheckState::Checked);
}

#[test]
fn test_flat_and_nested_are_equivalent() {
    init_tracing();
    let nested = TreeManager::from_items(nested_items(), TreeConfig::default()).unwrap();
    let flat = TreeManager::from_items(
        flat_items(),
        TreeConfig::new().with_encoding(TreeEncoding::Flat),
    )
    .unwrap();

    let all = ["docs", "guides", "intro", "setup", "api", "misc"];
    for value in all {
        let (n, f) = (node(&nested, value), node(&flat, value));
        assert_eq!(n.depth(), f.depth(), "depth of {value}");
        assert_eq!(values(&n.children()), values(&f.children()), "children of {value}");
    }
    assert_eq!(values(&nested.roots()), values(&flat.roots()));

    for manager in [&nested, &flat] {
        manager.check_item(node(manager, "intro").key()).unwrap();
        manager.check_item(node(manager, "api").key()).unwrap();
    }
    for value in all {
        assert_eq!(
            node(&nested, value).check_state(),
            node(&flat, value).check_state(),
            "state of {value}"
        );
    }
    assert_eq!(
        nested.export_items(TreeEncoding::Flat),
        flat.export_items(TreeEncoding::Flat)
    );
}

#[test]
fn test_disabled_is_not_checkable_but_checks() {
    init_tracing();
    let manager = TreeManager::from_items(
        vec![
            TreeItem::new("locked", "Locked").with_disabled(true),
            TreeItem::new("frozen", "Frozen").with_readonly(true),
            TreeItem::new("open", "Open"),
        ],
        TreeConfig::default(),
    )
    .unwrap();

    for value in ["locked", "frozen"] {
        let key = node(&manager, value).key();
        assert!(!manager.is_item_checkable(key).unwrap());
        manager.check_item(key).unwrap();
        assert_eq!(manager.get_item_checked_state(key).unwrap(), CheckState::Checked);
    }
    assert!(manager.is_item_checkable(node(&manager, "open").key()).unwrap());
}

#[test]
fn test_malformed_sources_are_rejected() {
    init_tracing();
    let duplicate = TreeManager::from_items(
        vec![TreeItem::new("a", "A"), TreeItem::new("a", "Again")],
        TreeConfig::default(),
    );
    assert!(matches!(duplicate, Err(TreeError::DuplicateValue(value)) if value == "a"));

    let cyclic = TreeManager::from_items(
        vec![
            TreeItem::new("a", "A").with_parent("b"),
            TreeItem::new("b", "B").with_parent("a"),
        ],
        TreeConfig::new().with_encoding(TreeEncoding::Flat),
    );
    assert!(matches!(cyclic, Err(TreeError::CyclicParent(_))));

    let missing = TreeManager::from_items(
        vec![TreeItem::new("a", "A").with_parent("ghost")],
        TreeConfig::new().with_encoding(TreeEncoding::Flat),
    );
    assert!(matches!(missing, Err(ref err) if err.is_configuration_error()));
}

#[test]
fn test_one_notification_per_affected_item() {
    let manager = nested_manager();
    let updates = Arc::new(Mutex::new(Vec::new()));
    let updates_clone = updates.clone();
    manager.signals().item_updated.connect(move |key: &ItemKey| {
        updates_clone.lock().push(*key);
    });

    manager.check_item(node(&manager, "guides").key()).unwrap();
    let received = updates.lock().clone();
    let mut unique = received.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(received.len(), unique.len());

    let touched: Vec<ItemKey> = ["guides", "intro", "setup", "docs"]
        .into_iter()
        .map(|value| node(&manager, value).key())
        .collect();
    assert_eq!(received.len(), touched.len());
    for key in touched {
        assert!(received.contains(&key));
    }

    // Nothing changes, nothing to repaint except the re-stamped target.
    updates.lock().clear();
    manager.check_item(node(&manager, "intro").key()).unwrap();
    assert_eq!(*updates.lock(), vec![node(&manager, "intro").key()]);
}

#[test]
fn test_structural_signals() {
    let manager = nested_manager();
    let inserted = Arc::new(Mutex::new(Vec::new()));
    let removed = Arc::new(Mutex::new(Vec::new()));
    let modes = Arc::new(Mutex::new(Vec::new()));
    {
        let inserted = inserted.clone();
        manager
            .signals()
            .item_inserted
            .connect(move |key: &ItemKey| inserted.lock().push(*key));
        let removed = removed.clone();
        manager
            .signals()
            .item_removed
            .connect(move |key: &ItemKey| removed.lock().push(*key));
        let modes = modes.clone();
        manager
            .signals()
            .relationship_changed
            .connect(move |mode: &SelectionRelationship| modes.lock().push(*mode));
    }

    let api = node(&manager, "api").key();
    let reference = manager
        .insert_item(Some(api), None, TreeItem::new("ref", "Reference"))
        .unwrap();
    assert_eq!(*inserted.lock(), vec![reference]);

    let guides = node(&manager, "guides");
    let intro = node(&manager, "intro").key();
    let setup = node(&manager, "setup").key();
    manager.remove_item(guides.key()).unwrap();
    assert_eq!(*removed.lock(), vec![guides.key(), intro, setup]);

    manager.set_relationship_mode(SelectionRelationship::Independent);
    manager.set_relationship_mode(SelectionRelationship::Independent);
    assert_eq!(*modes.lock(), vec![SelectionRelationship::Independent]);
}

#[test]
fn test_orphaned_handles_degrade() {
    let manager = nested_manager();
    let guides = node(&manager, "guides");
    let intro = node(&manager, "intro");
    manager.remove_item(guides.key()).unwrap();

    for orphan in [&guides, &intro] {
        assert_eq!(orphan.value(), None);
        assert_eq!(orphan.check_state(), None);
        assert_eq!(orphan.depth(), None);
        assert!(orphan.parent().is_none());
        assert!(orphan.ancestors().is_empty());
        assert!(!orphan.expanded());
        assert!(matches!(orphan.set_expanded(true), Err(TreeError::Detached)));
    }
    assert!(matches!(
        manager.check_item(intro.key()),
        Err(TreeError::UnknownItem(_))
    ));
    assert!(manager.find_tree_node("intro").is_none());

    // The rest of the tree is unaffected.
    manager.check_item(node(&manager, "api").key()).unwrap();
    assert_eq!(node(&manager, "docs").check_state(), Some(CheckState::Checked));
}

#[test]
fn test_move_keeps_tri_state() {
    let manager = nested_manager();
    manager.check_item(node(&manager, "setup").key()).unwrap();
    manager.check_item(node(&manager, "misc").key()).unwrap();
    assert_tri_state(&manager);

    let setup = node(&manager, "setup");
    manager
        .move_item(setup.key(), Some(node(&manager, "api").key()), None)
        .unwrap();
    assert_tri_state(&manager);
    assert_eq!(setup.depth(), Some(2));
    assert_eq!(node(&manager, "api").check_state(), Some(CheckState::Checked));
    assert_eq!(node(&manager, "guides").check_state(), Some(CheckState::Unchecked));

    let docs = node(&manager, "docs").key();
    let err = manager
        .move_item(docs, Some(setup.key()), None)
        .unwrap_err();
    assert!(matches!(err, TreeError::InvalidMove { .. }));
    assert_tri_state(&manager);

    manager.move_item(setup.key(), None, Some(0)).unwrap();
    assert_eq!(values(&manager.roots()), vec!["setup", "docs", "misc"]);
    assert_eq!(setup.depth(), Some(0));
    assert_tri_state(&manager);
}

#[test]
fn test_selection_order() {
    let manager = nested_manager();
    manager.check_item(node(&manager, "misc").key()).unwrap();
    manager.check_item(node(&manager, "guides").key()).unwrap();

    // The cascade stamps the whole subtree with one stamp, in tree order.
    assert_eq!(
        values(&manager.selected_items()),
        vec!["misc", "guides", "intro", "setup"]
    );

    manager.check_item(node(&manager, "misc").key()).unwrap();
    assert_eq!(
        values(&manager.selected_items()),
        vec!["guides", "intro", "setup", "misc"]
    );

    let misc = node(&manager, "misc");
    let guides = node(&manager, "guides");
    assert!(misc.selected_at() > guides.selected_at());
    manager.uncheck_all();
    assert!(manager.selected_items().is_empty());
    assert_eq!(misc.selected_at(), None);
}

#[test]
fn test_from_json_flat() {
    init_tracing();
    let source = json!([
        {"value": "root", "label": "Root", "expanded": true},
        {"value": "a", "label": "A", "parent": "root", "selected": true},
        {"value": "b", "label": "B", "parent": "root", "icon": "file.svg"}
    ]);
    let manager = TreeManager::from_json(
        &source.to_string(),
        TreeConfig::new().with_encoding(TreeEncoding::Flat),
    )
    .unwrap();

    let root = node(&manager, "root");
    assert!(root.expanded());
    assert_eq!(root.check_state(), Some(CheckState::Indeterminate));
    assert_eq!(node(&manager, "b").icon().as_deref(), Some("file.svg"));
    assert_eq!(values(&manager.visible_items()), vec!["root", "a", "b"]);

    let config: TreeConfig =
        serde_json::from_value(json!({"encoding": "nested", "relationship": "independent"}))
            .unwrap();
    let nested = TreeManager::from_json(
        &json!([{"value": "x", "label": "X", "items": [{"value": "y", "label": "Y"}]}])
            .to_string(),
        config,
    )
    .unwrap();
    nested.check_item(node(&nested, "y").key()).unwrap();
    assert_eq!(node(&nested, "x").check_state(), Some(CheckState::Unchecked));
}

#[test]
fn test_debug_dump() {
    let manager = nested_manager();
    manager.check_item(node(&manager, "intro").key()).unwrap();
    let text = TreeDebug::with_options(
        TreeFormatOptions::minimal().with_style(TreeStyle::Unicode),
    )
    .format(&manager);
    assert!(text.contains("[-] Docs"));
    assert!(text.contains("[x] Intro"));
    assert!(text.contains("\u{2514}\u{2500}\u{2500} [ ] API"));
}

#[test]
fn test_deep_flat_chain_removes_and_exports() {
    init_tracing();
    const DEPTH: usize = 50_000;
    let items: Vec<TreeItem> = (0..DEPTH)
        .map(|i| {
            let item = TreeItem::new(format!("n{i}"), format!("N{i}"));
            if i == 0 {
                item
            } else {
                item.with_parent(format!("n{}", i - 1))
            }
        })
        .collect();
    let manager =
        TreeManager::from_items(items, TreeConfig::new().with_encoding(TreeEncoding::Flat))
            .unwrap();

    let leaf = node(&manager, &format!("n{}", DEPTH - 1));
    assert_eq!(leaf.depth(), Some(DEPTH - 1));
    manager.check_item(leaf.key()).unwrap();

    let exported = manager.export_items(TreeEncoding::Nested);
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].selected, Some(true));
    let mut current = &exported[0];
    let mut depth = 0;
    while let Some(child) = current.items.first() {
        current = child;
        depth += 1;
    }
    assert_eq!(depth, DEPTH - 1);
    assert_eq!(current.value, format!("n{}", DEPTH - 1));
    drop(exported);

    let removed = manager.remove_item(node(&manager, "n0").key()).unwrap();
    assert_eq!(removed.value, "n0");
    assert_eq!(removed.items.len(), 1);
    assert!(manager.is_empty());
    assert_eq!(leaf.depth(), None);
}
