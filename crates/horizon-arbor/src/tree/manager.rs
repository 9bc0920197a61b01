//! Selection and expansion state for one tree.
//!
//! [`TreeManager`] is the single source of truth for check state, expansion
//! and selection timestamps. It wraps a [`Composer`] for structure and hands
//! out one cached [`TreeNode`] per item.
//!
//! # Propagation
//!
//! In [`SelectionRelationship::Related`] mode, checking or unchecking an item
//! forces its whole subtree to the same state, then recomputes its ancestors
//! bottom-up: a parent is checked iff all its children are checked, unchecked
//! iff all are unchecked, and indeterminate otherwise. Propagation is eager;
//! reads never recompute anything.
//!
//! # Selection timestamps
//!
//! Each mutating call draws one stamp from a monotonically increasing
//! counter. The directly targeted item always receives it; any other item
//! that becomes checked during the same call (cascaded descendants, completed
//! ancestors) receives the same stamp. Items that were already checked keep
//! their stamp, and items that leave the checked state lose it. So an item
//! has a `selected_at` value exactly while it is checked.
//!
//! # Notifications
//!
//! Every mutating call collects the items whose state it changed and emits
//! [`TreeSignals::item_updated`] exactly once per item after the internal lock
//! is released, so slots may call back into the manager.
//!
//! # Unknown items
//!
//! Every operation that names an item returns
//! [`TreeError::UnknownItem`] for keys that were never registered or have
//! been removed. Arguments are validated before anything is mutated, so a
//! failed call leaves the tree untouched.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use horizon_arbor_core::logging::{span_names, targets};
use horizon_arbor_core::{PerfSpan, Signal};
use parking_lot::{Mutex, RwLock};
use slotmap::SecondaryMap;

use super::composer::{Composer, ItemKey};
use super::config::{SelectionRelationship, TreeConfig, TreeEncoding};
use super::item::{ItemProperty, PropertyValue, TreeItem};
use super::node::TreeNode;
use super::state::CheckState;
use crate::error::{Result, TreeError};

/// Signals emitted by a [`TreeManager`].
///
/// Renderers connect to these to learn which items need repainting.
#[derive(Debug, Default)]
pub struct TreeSignals {
    /// Emitted once per item whose state, fields or structure changed.
    pub item_updated: Signal<ItemKey>,
    /// Emitted for the top item of an inserted subtree.
    pub item_inserted: Signal<ItemKey>,
    /// Emitted once per removed item, in pre-order.
    pub item_removed: Signal<ItemKey>,
    /// Emitted when the selection relationship mode changes.
    pub relationship_changed: Signal<SelectionRelationship>,
}

impl TreeSignals {
    /// Creates a new set of tree signals.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Items touched by one call, in first-touched order.
#[derive(Debug, Default)]
struct DirtySet {
    keys: Vec<ItemKey>,
    seen: HashSet<ItemKey>,
}

impl DirtySet {
    fn mark(&mut self, key: ItemKey) {
        if self.seen.insert(key) {
            self.keys.push(key);
        }
    }

    fn into_keys(self) -> Vec<ItemKey> {
        self.keys
    }
}

/// Everything guarded by the manager's lock.
#[derive(Debug)]
pub(crate) struct TreeState {
    pub(crate) composer: Composer,
    checked: SecondaryMap<ItemKey, CheckState>,
    expanded: SecondaryMap<ItemKey, bool>,
    relationship: SelectionRelationship,
    next_stamp: u64,
}

impl TreeState {
    fn require(&self, key: ItemKey) -> Result<()> {
        if self.composer.contains(key) {
            Ok(())
        } else {
            Err(TreeError::UnknownItem(key))
        }
    }

    pub(crate) fn check_state(&self, key: ItemKey) -> CheckState {
        self.checked.get(key).copied().unwrap_or_default()
    }

    pub(crate) fn is_expanded(&self, key: ItemKey) -> bool {
        self.expanded.get(key).copied().unwrap_or(false)
    }

    fn draw_stamp(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    /// Sets one item's state and keeps its timestamp in step.
    fn assign(
        &mut self,
        key: ItemKey,
        state: CheckState,
        stamp: u64,
        restamp: bool,
        dirty: &mut DirtySet,
    ) {
        let old = self.check_state(key);
        if old != state {
            self.checked.insert(key, state);
            dirty.mark(key);
        }
        if state.is_checked() {
            if !old.is_checked() || restamp {
                self.composer.set_selected_at(key, Some(stamp));
                dirty.mark(key);
            }
        } else {
            self.composer.set_selected_at(key, None);
        }
    }

    /// The state a parent should have given its children. Items without
    /// children keep their state, except that a leaf is never indeterminate.
    fn derived_state(&self, key: ItemKey) -> CheckState {
        let current = self.check_state(key);
        let fallback = if current.is_indeterminate() {
            CheckState::Unchecked
        } else {
            current
        };
        CheckState::aggregate(
            self.composer
                .get_item_children(key)
                .iter()
                .map(|&child| self.check_state(child)),
            fallback,
        )
    }

    fn set_check(&mut self, key: ItemKey, target: CheckState, dirty: &mut DirtySet) {
        let _span = PerfSpan::new(span_names::PROPAGATE);
        let stamp = self.draw_stamp();
        self.assign(key, target, stamp, true, dirty);
        if self.relationship.is_related() {
            for descendant in self.composer.get_item_descendants(key, None) {
                self.assign(descendant, target, stamp, false, dirty);
            }
            let parent = self.composer.get_item_parent(key);
            self.recompute_from(parent, stamp, dirty);
        }
    }

    /// Recomputes `start` and its ancestors, stopping at the first item whose
    /// state does not change.
    fn recompute_from(&mut self, start: Option<ItemKey>, stamp: u64, dirty: &mut DirtySet) {
        let mut current = start;
        while let Some(key) = current {
            let next = self.derived_state(key);
            if next == self.check_state(key) {
                break;
            }
            self.assign(key, next, stamp, false, dirty);
            current = self.composer.get_item_parent(key);
        }
    }

    /// Recomputes every item bottom-up.
    fn recompute_all(&mut self, stamp: u64, dirty: &mut DirtySet) {
        for key in self.composer.keys().into_iter().rev() {
            let next = self.derived_state(key);
            self.assign(key, next, stamp, false, dirty);
        }
    }

    /// Initializes state for newly attached items (`keys` in pre-order,
    /// covering whole subtrees) from their `selected`/`expanded` seeds.
    fn seed(&mut self, keys: &[ItemKey]) {
        for &key in keys {
            let expanded = self.composer.item_flag(key, ItemProperty::Expanded);
            self.expanded.insert(key, expanded);
            self.checked.insert(key, CheckState::Unchecked);
        }

        for &key in keys {
            if !self.composer.item_flag(key, ItemProperty::Selected) {
                continue;
            }
            self.checked.insert(key, CheckState::Checked);
            if self.relationship.is_related() {
                for descendant in self.composer.get_item_descendants(key, None) {
                    self.checked.insert(descendant, CheckState::Checked);
                }
            }
        }

        if self.relationship.is_related() {
            for &key in keys.iter().rev() {
                let derived = self.derived_state(key);
                self.checked.insert(key, derived);
            }
        }

        // Seeded stamps survive; checked items without one get fresh stamps
        // after the highest seeded stamp, in pre-order.
        let highest = keys
            .iter()
            .filter(|&&key| self.check_state(key).is_checked())
            .filter_map(|&key| self.composer.item(key).and_then(|data| data.selected_at))
            .max();
        if let Some(highest) = highest {
            self.next_stamp = self.next_stamp.max(highest + 1);
        }
        for &key in keys {
            if !self.check_state(key).is_checked() {
                self.composer.set_selected_at(key, None);
            } else if self.composer.item(key).and_then(|data| data.selected_at).is_none() {
                let stamp = self.draw_stamp();
                self.composer.set_selected_at(key, Some(stamp));
            }
        }
    }

    fn set_expanded(&mut self, key: ItemKey, expanded: bool, dirty: &mut DirtySet) {
        if self.is_expanded(key) != expanded {
            self.expanded.insert(key, expanded);
            dirty.mark(key);
        }
    }

    /// Writes the current selection and expansion into exported items.
    fn fold_state(&self, item: &mut TreeItem) {
        let mut stack = vec![item];
        while let Some(item) = stack.pop() {
            if let Some(key) = self.composer.find_by_value(&item.value) {
                item.selected = Some(self.check_state(key).is_checked());
                item.expanded = Some(self.is_expanded(key));
            }
            stack.extend(item.items.iter_mut());
        }
    }
}

/// Owns the selection and expansion state of one tree.
///
/// Created behind an `Arc` so node handles can refer back to it.
///
/// # Example
///
/// ```
/// use horizon_arbor::tree::{CheckState, TreeConfig, TreeItem, TreeManager};
///
/// let manager = TreeManager::from_items(
///     vec![TreeItem::new("a", "A").with_children(vec![
///         TreeItem::new("b", "B"),
///         TreeItem::new("c", "C"),
///     ])],
///     TreeConfig::default(),
/// )
/// .unwrap();
///
/// let a = manager.find_item("a").unwrap();
/// let b = manager.find_item("b").unwrap();
/// manager.check_item(b).unwrap();
/// assert_eq!(manager.get_item_checked_state(a).unwrap(), CheckState::Indeterminate);
/// ```
pub struct TreeManager {
    state: RwLock<TreeState>,
    handles: Mutex<SecondaryMap<ItemKey, Arc<TreeNode>>>,
    signals: TreeSignals,
    this: Weak<TreeManager>,
}

impl std::fmt::Debug for TreeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("TreeManager")
            .field("items", &state.composer.len())
            .field("relationship", &state.relationship)
            .field("handles", &self.handles.lock().len())
            .finish_non_exhaustive()
    }
}

impl TreeManager {
    /// Creates a manager over an already composed tree.
    pub fn new(composer: Composer, relationship: SelectionRelationship) -> Arc<Self> {
        let _span = PerfSpan::new(span_names::SEED);
        let mut state = TreeState {
            composer,
            checked: SecondaryMap::new(),
            expanded: SecondaryMap::new(),
            relationship,
            next_stamp: 1,
        };
        let keys = state.composer.keys();
        state.seed(&keys);
        tracing::debug!(
            target: targets::MANAGER,
            items = keys.len(),
            ?relationship,
            "created tree manager"
        );

        Arc::new_cyclic(|this| Self {
            state: RwLock::new(state),
            handles: Mutex::new(SecondaryMap::new()),
            signals: TreeSignals::new(),
            this: this.clone(),
        })
    }

    /// Composes `items` with the configured encoding and wraps them.
    pub fn from_items(items: Vec<TreeItem>, config: TreeConfig) -> Result<Arc<Self>> {
        let composer = Composer::new(items, config.encoding)?;
        Ok(Self::new(composer, config.relationship))
    }

    /// Parses a JSON array of items in the configured encoding.
    pub fn from_json(json: &str, config: TreeConfig) -> Result<Arc<Self>> {
        let composer = Composer::from_json(json, config.encoding)?;
        Ok(Self::new(composer, config.relationship))
    }

    /// Returns the manager's signals.
    pub fn signals(&self) -> &TreeSignals {
        &self.signals
    }

    /// Provides read access to the underlying composer.
    ///
    /// `f` runs while the manager's read lock is held. Calling any mutating
    /// method of this manager from inside `f` deadlocks.
    pub fn with_composer<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Composer) -> R,
    {
        f(&self.state.read().composer)
    }

    pub(crate) fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&TreeState) -> R,
    {
        f(&self.state.read())
    }

    /// Runs a fallible mutation through [`apply`](Self::apply).
    fn mutate<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut TreeState, &mut DirtySet) -> Result<R>,
    {
        self.apply(f)
    }

    /// Runs a mutation under the write lock, then notifies every item it
    /// marked dirty.
    fn apply<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut TreeState, &mut DirtySet) -> R,
    {
        let mut dirty = DirtySet::default();
        let result = {
            let mut state = self.state.write();
            f(&mut state, &mut dirty)
        };
        for key in dirty.into_keys() {
            self.signals.item_updated.emit(key);
        }
        result
    }

    fn read<F, R>(&self, key: ItemKey, f: F) -> Result<R>
    where
        F: FnOnce(&TreeState) -> R,
    {
        let state = self.state.read();
        state.require(key)?;
        Ok(f(&state))
    }

    /// Returns the number of items in the tree.
    pub fn len(&self) -> usize {
        self.state.read().composer.len()
    }

    /// Returns `true` if the tree has no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the key names a live item.
    pub fn contains(&self, key: ItemKey) -> bool {
        self.state.read().composer.contains(key)
    }

    /// Finds an item by its unique value.
    pub fn find_item(&self, value: &str) -> Option<ItemKey> {
        self.state.read().composer.find_by_value(value)
    }

    // =========================================================================
    // Node handles
    // =========================================================================

    fn handle(&self, key: ItemKey) -> Arc<TreeNode> {
        let mut handles = self.handles.lock();
        if let Some(node) = handles.get(key) {
            return node.clone();
        }
        let node = Arc::new(TreeNode::new(key, self.this.clone()));
        handles.insert(key, node.clone());
        node
    }

    fn wrap(&self, keys: Vec<ItemKey>) -> Vec<Arc<TreeNode>> {
        keys.into_iter().map(|key| self.handle(key)).collect()
    }

    /// Returns the handle for an item, creating it on first use.
    ///
    /// Repeated calls for the same item return the same `Arc` for the life of
    /// the manager.
    pub fn get_tree_node(&self, key: ItemKey) -> Result<Arc<TreeNode>> {
        self.read(key, |_| ())?;
        Ok(self.handle(key))
    }

    /// Returns the handle for the item with the given value.
    pub fn find_tree_node(&self, value: &str) -> Option<Arc<TreeNode>> {
        self.find_item(value).map(|key| self.handle(key))
    }

    /// Returns handles for the root items.
    pub fn roots(&self) -> Vec<Arc<TreeNode>> {
        let keys = self.state.read().composer.roots().to_vec();
        self.wrap(keys)
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Reads a named field of an item. `None` if unset or unknown.
    ///
    /// `Selected` and `Expanded` report the live state, not the seeds.
    pub fn get_item_property_value(
        &self,
        key: ItemKey,
        property: ItemProperty,
    ) -> Option<PropertyValue> {
        let state = self.state.read();
        if !state.composer.contains(key) {
            return None;
        }
        match property {
            ItemProperty::Selected => Some(PropertyValue::Flag(state.check_state(key).is_checked())),
            ItemProperty::Expanded => Some(PropertyValue::Flag(state.is_expanded(key))),
            _ => state.composer.get_item_property_value(key, property),
        }
    }

    /// Writes a named field of an item and notifies it.
    ///
    /// `Selected` and `Expanded` are routed to the selection and expansion
    /// operations so the manager's state stays authoritative; `SelectedAt` is
    /// read-only.
    pub fn set_item_property_value(
        &self,
        key: ItemKey,
        property: ItemProperty,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        let value = value.into();
        match (property, &value) {
            (ItemProperty::SelectedAt, _) => Err(TreeError::ReadOnlyProperty(property)),
            (ItemProperty::Selected, PropertyValue::Flag(true)) => self.check_item(key),
            (ItemProperty::Selected, PropertyValue::Flag(false)) => self.uncheck_item(key),
            (ItemProperty::Expanded, PropertyValue::Flag(true)) => self.expand_item(key),
            (ItemProperty::Expanded, PropertyValue::Flag(false)) => self.collapse_item(key),
            _ => self.mutate(|state, dirty| {
                state.composer.set_item_property_value(key, property, value)?;
                dirty.mark(key);
                Ok(())
            }),
        }
    }

    /// Clears an optional field of an item and notifies it.
    pub fn unset_item_property_value(&self, key: ItemKey, property: ItemProperty) -> Result<()> {
        if property == ItemProperty::SelectedAt {
            return Err(TreeError::ReadOnlyProperty(property));
        }
        self.mutate(|state, dirty| {
            state.composer.unset_item_property_value(key, property)?;
            dirty.mark(key);
            Ok(())
        })
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Returns the current selection relationship mode.
    pub fn relationship(&self) -> SelectionRelationship {
        self.state.read().relationship
    }

    /// Switches the selection relationship mode.
    ///
    /// Switching to related mode recomputes every parent from its children.
    /// Switching to independent mode leaves every item's state as it is,
    /// except that indeterminate items become unchecked.
    pub fn set_relationship_mode(&self, relationship: SelectionRelationship) {
        let changed = self.apply(|state, dirty| {
            if state.relationship == relationship {
                return false;
            }
            state.relationship = relationship;
            let stamp = state.draw_stamp();
            if relationship.is_related() {
                state.recompute_all(stamp, dirty);
            } else {
                for key in state.composer.keys() {
                    if state.check_state(key).is_indeterminate() {
                        state.assign(key, CheckState::Unchecked, stamp, false, dirty);
                    }
                }
            }
            true
        });
        if changed {
            tracing::debug!(target: targets::MANAGER, ?relationship, "relationship mode changed");
            self.signals.relationship_changed.emit(relationship);
        }
    }

    /// Checks an item. In related mode the subtree follows and ancestors are
    /// recomputed.
    ///
    /// Checkability is advisory: disabled and readonly items are checked too.
    pub fn check_item(&self, key: ItemKey) -> Result<()> {
        self.mutate(|state, dirty| {
            state.require(key)?;
            state.set_check(key, CheckState::Checked, dirty);
            Ok(())
        })?;
        tracing::trace!(target: targets::MANAGER, ?key, "checked item");
        Ok(())
    }

    /// Unchecks an item. In related mode the subtree follows and ancestors
    /// are recomputed.
    pub fn uncheck_item(&self, key: ItemKey) -> Result<()> {
        self.mutate(|state, dirty| {
            state.require(key)?;
            state.set_check(key, CheckState::Unchecked, dirty);
            Ok(())
        })?;
        tracing::trace!(target: targets::MANAGER, ?key, "unchecked item");
        Ok(())
    }

    /// Checks an unchecked or indeterminate item, unchecks a checked one, and
    /// returns the item's new state.
    pub fn toggle_item(&self, key: ItemKey) -> Result<CheckState> {
        self.mutate(|state, dirty| {
            state.require(key)?;
            let target = state.check_state(key).toggle();
            state.set_check(key, target, dirty);
            Ok(target)
        })
    }

    /// Checks every item.
    pub fn check_all(&self) {
        self.set_all(CheckState::Checked);
    }

    /// Unchecks every item.
    pub fn uncheck_all(&self) {
        self.set_all(CheckState::Unchecked);
    }

    fn set_all(&self, target: CheckState) {
        self.apply(|state, dirty| {
            let stamp = state.draw_stamp();
            for key in state.composer.keys() {
                state.assign(key, target, stamp, false, dirty);
            }
        });
    }

    /// Returns the stored check state of an item.
    pub fn get_item_checked_state(&self, key: ItemKey) -> Result<CheckState> {
        self.read(key, |state| state.check_state(key))
    }

    /// Returns `false` iff the item is disabled or readonly.
    ///
    /// This is advice for the caller's interaction layer; the check and
    /// uncheck operations do not consult it.
    pub fn is_item_checkable(&self, key: ItemKey) -> Result<bool> {
        self.read(key, |state| {
            !(state.composer.item_flag(key, ItemProperty::Disabled)
                || state.composer.item_flag(key, ItemProperty::Readonly))
        })
    }

    /// Returns every checked item, least recently selected first.
    pub fn selected_items(&self) -> Vec<Arc<TreeNode>> {
        let keys = {
            let state = self.state.read();
            let mut selected: Vec<(u64, ItemKey)> = state
                .composer
                .keys()
                .into_iter()
                .filter(|&key| state.check_state(key).is_checked())
                .map(|key| {
                    let stamp = state
                        .composer
                        .item(key)
                        .and_then(|data| data.selected_at)
                        .unwrap_or(0);
                    (stamp, key)
                })
                .collect();
            // Stable sort: equal stamps stay in tree order.
            selected.sort_by_key(|&(stamp, _)| stamp);
            selected.into_iter().map(|(_, key)| key).collect()
        };
        self.wrap(keys)
    }

    // =========================================================================
    // Expansion
    // =========================================================================

    /// Returns whether an item is expanded. Ancestors are not consulted.
    pub fn is_item_expanded(&self, key: ItemKey) -> Result<bool> {
        self.read(key, |state| state.is_expanded(key))
    }

    /// Expands an item.
    pub fn expand_item(&self, key: ItemKey) -> Result<()> {
        self.mutate(|state, dirty| {
            state.require(key)?;
            state.set_expanded(key, true, dirty);
            Ok(())
        })
    }

    /// Collapses an item.
    pub fn collapse_item(&self, key: ItemKey) -> Result<()> {
        self.mutate(|state, dirty| {
            state.require(key)?;
            state.set_expanded(key, false, dirty);
            Ok(())
        })
    }

    /// Flips an item's expansion and returns the new value.
    pub fn toggle_expanded(&self, key: ItemKey) -> Result<bool> {
        self.mutate(|state, dirty| {
            state.require(key)?;
            let expanded = !state.is_expanded(key);
            state.set_expanded(key, expanded, dirty);
            Ok(expanded)
        })
    }

    /// Expands every item that has children.
    pub fn expand_all(&self) {
        self.apply(|state, dirty| {
            for key in state.composer.keys() {
                if !state.composer.get_item_children(key).is_empty() {
                    state.set_expanded(key, true, dirty);
                }
            }
        });
    }

    /// Collapses every item.
    pub fn collapse_all(&self) {
        self.apply(|state, dirty| {
            for key in state.composer.keys() {
                state.set_expanded(key, false, dirty);
            }
        });
    }

    /// Returns the items a renderer should show, in pre-order: hidden items
    /// (with their subtrees) are skipped, and only children of expanded
    /// items are visited.
    pub fn visible_items(&self) -> Vec<Arc<TreeNode>> {
        let keys = {
            let state = self.state.read();
            let composer = &state.composer;
            let mut out = Vec::new();
            let mut stack: Vec<ItemKey> = composer.roots().iter().rev().copied().collect();
            while let Some(key) = stack.pop() {
                if composer.item_flag(key, ItemProperty::Hidden) {
                    continue;
                }
                out.push(key);
                if state.is_expanded(key) {
                    stack.extend(composer.get_item_children(key).iter().rev());
                }
            }
            out
        };
        self.wrap(keys)
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Returns the ancestors of an item, nearest first.
    pub fn get_item_ancestors(&self, key: ItemKey) -> Result<Vec<Arc<TreeNode>>> {
        let keys = self.read(key, |state| state.composer.get_item_ancestors(key))?;
        Ok(self.wrap(keys))
    }

    /// Returns the children of an item in order.
    pub fn get_item_children(&self, key: ItemKey) -> Result<Vec<Arc<TreeNode>>> {
        let keys = self.read(key, |state| state.composer.get_item_children(key).to_vec())?;
        Ok(self.wrap(keys))
    }

    /// Returns the descendants of an item in pre-order, at most `depth`
    /// levels down (`None` for the whole subtree).
    pub fn get_item_descendants(
        &self,
        key: ItemKey,
        depth: Option<usize>,
    ) -> Result<Vec<Arc<TreeNode>>> {
        let keys = self.read(key, |state| state.composer.get_item_descendants(key, depth))?;
        Ok(self.wrap(keys))
    }

    /// Returns the parent of an item, or `None` for roots.
    pub fn get_item_parent(&self, key: ItemKey) -> Result<Option<Arc<TreeNode>>> {
        let parent = self.read(key, |state| state.composer.get_item_parent(key))?;
        Ok(parent.map(|parent| self.handle(parent)))
    }

    /// Returns `true` if the item has at least one child.
    pub fn is_item_parent(&self, key: ItemKey) -> Result<bool> {
        self.read(key, |state| !state.composer.get_item_children(key).is_empty())
    }

    /// Returns `true` if the item has a parent.
    pub fn is_item_child(&self, key: ItemKey) -> Result<bool> {
        self.read(key, |state| state.composer.get_item_parent(key).is_some())
    }

    /// Returns the depth of an item (roots are 0).
    pub fn get_item_depth(&self, key: ItemKey) -> Result<usize> {
        self.read(key, |state| state.composer.get_item_ancestors(key).len())
    }

    /// Inserts an item (with nested children) under `parent` at `index`.
    ///
    /// New items are seeded from their `selected`/`expanded` fields; in
    /// related mode the new parent chain is recomputed.
    pub fn insert_item(
        &self,
        parent: Option<ItemKey>,
        index: Option<usize>,
        item: TreeItem,
    ) -> Result<ItemKey> {
        let key = self.mutate(|state, dirty| {
            let key = state.composer.insert_item(parent, index, item)?;
            let mut keys = vec![key];
            keys.extend(state.composer.get_item_descendants(key, None));
            state.seed(&keys);
            for &inserted in &keys {
                dirty.mark(inserted);
            }
            if let Some(parent) = parent {
                dirty.mark(parent);
            }
            if state.relationship.is_related() {
                let stamp = state.draw_stamp();
                state.recompute_from(parent, stamp, dirty);
            }
            Ok(key)
        })?;
        tracing::trace!(target: targets::MANAGER, ?key, ?parent, "inserted item");
        self.signals.item_inserted.emit(key);
        Ok(key)
    }

    /// Removes an item and its subtree, returning them in nested form.
    ///
    /// Handles of removed items stay alive for whoever holds them but report
    /// empty results from then on.
    pub fn remove_item(&self, key: ItemKey) -> Result<TreeItem> {
        let (removed_keys, removed) = self.mutate(|state, dirty| {
            state.require(key)?;
            let parent = state.composer.get_item_parent(key);
            let mut keys = vec![key];
            keys.extend(state.composer.get_item_descendants(key, None));
            let removed = state.composer.remove_item(key)?;
            for &gone in &keys {
                state.checked.remove(gone);
                state.expanded.remove(gone);
            }
            if let Some(parent) = parent {
                dirty.mark(parent);
            }
            if state.relationship.is_related() {
                let stamp = state.draw_stamp();
                state.recompute_from(parent, stamp, dirty);
            }
            Ok((keys, removed))
        })?;

        {
            let mut handles = self.handles.lock();
            for &gone in &removed_keys {
                handles.remove(gone);
            }
        }
        tracing::trace!(target: targets::MANAGER, ?key, count = removed_keys.len(), "removed item");
        for gone in removed_keys {
            self.signals.item_removed.emit(gone);
        }
        Ok(removed)
    }

    /// Moves an item (with its subtree) under `new_parent` at `index`.
    ///
    /// In related mode both the old and the new parent chains are
    /// recomputed.
    pub fn move_item(
        &self,
        key: ItemKey,
        new_parent: Option<ItemKey>,
        index: Option<usize>,
    ) -> Result<()> {
        self.mutate(|state, dirty| {
            let old_parent = state.composer.get_item_parent(key);
            state.composer.move_item(key, new_parent, index)?;
            dirty.mark(key);
            for descendant in state.composer.get_item_descendants(key, None) {
                dirty.mark(descendant);
            }
            if let Some(old_parent) = old_parent {
                dirty.mark(old_parent);
            }
            if let Some(new_parent) = new_parent {
                dirty.mark(new_parent);
            }
            if state.relationship.is_related() {
                let stamp = state.draw_stamp();
                state.recompute_from(old_parent, stamp, dirty);
                state.recompute_from(new_parent, stamp, dirty);
            }
            Ok(())
        })?;
        tracing::trace!(target: targets::MANAGER, ?key, ?new_parent, "moved item");
        Ok(())
    }

    /// Exports the tree with the current selection and expansion folded into
    /// each item's `selected`/`expanded` fields.
    pub fn export_items(&self, encoding: TreeEncoding) -> Vec<TreeItem> {
        let state = self.state.read();
        let mut items = state.composer.export(encoding);
        for item in &mut items {
            state.fold_state(item);
        }
        items
    }

    // =========================================================================
    // Notification
    // =========================================================================

    /// Marks an item dirty for re-rendering. No state changes.
    pub fn update_item(&self, key: ItemKey) -> Result<()> {
        self.read(key, |_| ())?;
        self.signals.item_updated.emit(key);
        Ok(())
    }
}
