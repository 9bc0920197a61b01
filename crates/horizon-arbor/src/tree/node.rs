//! Per-item handles.

use std::sync::{Arc, Weak};

use horizon_arbor_core::logging::targets;

use super::composer::ItemKey;
use super::item::{ItemProperty, PropertyValue};
use super::manager::TreeManager;
use super::state::CheckState;
use crate::error::{Result, TreeError};

/// A handle to one item of a [`TreeManager`].
///
/// A node holds only its item key and a weak reference to the manager; every
/// accessor reads through to the manager, so a handle can never disagree with
/// it. Handles are obtained from [`TreeManager::get_tree_node`] and the same
/// `Arc` is returned for the same item for the life of the manager.
///
/// When the item is removed or the manager is dropped the handle becomes
/// orphaned: readers return `None`, `false` or an empty list, and setters
/// return [`TreeError::Detached`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_arbor::tree::{TreeConfig, TreeItem, TreeManager};
///
/// let manager = TreeManager::from_items(
///     vec![TreeItem::new("a", "A").with_children(vec![TreeItem::new("b", "B")])],
///     TreeConfig::default(),
/// )
/// .unwrap();
///
/// let b = manager.find_tree_node("b").unwrap();
/// b.set_selected(true).unwrap();
/// assert!(b.selected());
/// assert!(b.parent().unwrap().selected());
/// assert!(Arc::ptr_eq(&b, &manager.find_tree_node("b").unwrap()));
/// ```
#[derive(Debug)]
pub struct TreeNode {
    key: ItemKey,
    manager: Weak<TreeManager>,
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && Weak::ptr_eq(&self.manager, &other.manager)
    }
}

impl Eq for TreeNode {}

impl TreeNode {
    pub(crate) fn new(key: ItemKey, manager: Weak<TreeManager>) -> Self {
        Self { key, manager }
    }

    /// Returns the key of the item this handle refers to.
    pub fn key(&self) -> ItemKey {
        self.key
    }

    /// Returns the owning manager, if it is still alive.
    pub fn manager(&self) -> Option<Arc<TreeManager>> {
        self.manager.upgrade()
    }

    /// Returns `true` while the manager is alive and still holds the item.
    pub fn is_attached(&self) -> bool {
        self.manager().is_some_and(|manager| manager.contains(self.key))
    }

    fn read<R>(&self, f: impl FnOnce(&TreeManager) -> Option<R>) -> Option<R> {
        let result = self.manager().and_then(|manager| f(&manager));
        if result.is_none() && !self.is_attached() {
            tracing::debug!(target: targets::NODE, key = ?self.key, "read through orphaned node");
        }
        result
    }

    fn write(&self, f: impl FnOnce(&TreeManager) -> Result<()>) -> Result<()> {
        let Some(manager) = self.manager() else {
            tracing::debug!(target: targets::NODE, key = ?self.key, "write through orphaned node");
            return Err(TreeError::Detached);
        };
        f(&manager).map_err(|err| match err {
            TreeError::UnknownItem(key) if key == self.key => {
                tracing::debug!(target: targets::NODE, ?key, "write through orphaned node");
                TreeError::Detached
            }
            other => other,
        })
    }

    fn text(&self, property: ItemProperty) -> Option<String> {
        self.read(|manager| manager.get_item_property_value(self.key, property))
            .and_then(PropertyValue::into_text)
    }

    fn flag(&self, property: ItemProperty) -> bool {
        self.read(|manager| manager.get_item_property_value(self.key, property))
            .and_then(|value| value.as_flag())
            .unwrap_or(false)
    }

    fn set(&self, property: ItemProperty, value: impl Into<PropertyValue>) -> Result<()> {
        self.write(|manager| manager.set_item_property_value(self.key, property, value))
    }

    // =========================================================================
    // Fields
    // =========================================================================

    pub fn value(&self) -> Option<String> {
        self.text(ItemProperty::Value)
    }

    /// Renames the item. Fails if another item already uses `value`.
    pub fn set_value(&self, value: impl Into<String>) -> Result<()> {
        self.set(ItemProperty::Value, value.into())
    }

    pub fn label(&self) -> Option<String> {
        self.text(ItemProperty::Label)
    }

    pub fn set_label(&self, label: impl Into<String>) -> Result<()> {
        self.set(ItemProperty::Label, label.into())
    }

    pub fn icon(&self) -> Option<String> {
        self.text(ItemProperty::Icon)
    }

    /// Sets or clears the icon.
    pub fn set_icon(&self, icon: Option<&str>) -> Result<()> {
        match icon {
            Some(icon) => self.set(ItemProperty::Icon, icon),
            None => self.write(|manager| {
                manager.unset_item_property_value(self.key, ItemProperty::Icon)
            }),
        }
    }

    pub fn readonly(&self) -> bool {
        self.flag(ItemProperty::Readonly)
    }

    pub fn set_readonly(&self, readonly: bool) -> Result<()> {
        self.set(ItemProperty::Readonly, readonly)
    }

    pub fn disabled(&self) -> bool {
        self.flag(ItemProperty::Disabled)
    }

    pub fn set_disabled(&self, disabled: bool) -> Result<()> {
        self.set(ItemProperty::Disabled, disabled)
    }

    pub fn highlighted(&self) -> bool {
        self.flag(ItemProperty::Highlighted)
    }

    pub fn set_highlighted(&self, highlighted: bool) -> Result<()> {
        self.set(ItemProperty::Highlighted, highlighted)
    }

    /// Whether the item is hidden. Read-only through a handle.
    pub fn hidden(&self) -> bool {
        self.flag(ItemProperty::Hidden)
    }

    // =========================================================================
    // Manager state
    // =========================================================================

    pub fn expanded(&self) -> bool {
        self.read(|manager| manager.is_item_expanded(self.key).ok())
            .unwrap_or(false)
    }

    pub fn set_expanded(&self, expanded: bool) -> Result<()> {
        self.write(|manager| {
            if expanded {
                manager.expand_item(self.key)
            } else {
                manager.collapse_item(self.key)
            }
        })
    }

    /// `true` only when fully checked.
    pub fn selected(&self) -> bool {
        self.check_state().is_some_and(|state| state.is_checked())
    }

    pub fn set_selected(&self, selected: bool) -> Result<()> {
        self.write(|manager| {
            if selected {
                manager.check_item(self.key)
            } else {
                manager.uncheck_item(self.key)
            }
        })
    }

    /// When the item was last selected. Read-only; `None` unless checked.
    pub fn selected_at(&self) -> Option<u64> {
        self.read(|manager| manager.get_item_property_value(self.key, ItemProperty::SelectedAt))
            .and_then(|value| value.as_timestamp())
    }

    pub fn check_state(&self) -> Option<CheckState> {
        self.read(|manager| manager.get_item_checked_state(self.key).ok())
    }

    /// Advisory: `false` for disabled or readonly items.
    pub fn is_selectable(&self) -> bool {
        self.read(|manager| manager.is_item_checkable(self.key).ok())
            .unwrap_or(false)
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Nearest first.
    pub fn ancestors(&self) -> Vec<Arc<TreeNode>> {
        self.read(|manager| manager.get_item_ancestors(self.key).ok())
            .unwrap_or_default()
    }

    pub fn children(&self) -> Vec<Arc<TreeNode>> {
        self.read(|manager| manager.get_item_children(self.key).ok())
            .unwrap_or_default()
    }

    /// Pre-order, at most `depth` levels down.
    pub fn descendants(&self, depth: Option<usize>) -> Vec<Arc<TreeNode>> {
        self.read(|manager| manager.get_item_descendants(self.key, depth).ok())
            .unwrap_or_default()
    }

    pub fn parent(&self) -> Option<Arc<TreeNode>> {
        self.read(|manager| manager.get_item_parent(self.key).ok().flatten())
    }

    pub fn is_parent(&self) -> bool {
        self.read(|manager| manager.is_item_parent(self.key).ok())
            .unwrap_or(false)
    }

    pub fn is_child(&self) -> bool {
        self.read(|manager| manager.is_item_child(self.key).ok())
            .unwrap_or(false)
    }

    pub fn depth(&self) -> Option<usize> {
        self.read(|manager| manager.get_item_depth(self.key).ok())
    }

    /// Asks the manager to notify renderers about this item.
    pub fn rerender(&self) -> Result<()> {
        self.write(|manager| manager.update_item(self.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{TreeConfig, TreeItem};

    fn sample() -> Arc<TreeManager> {
        TreeManager::from_items(
            vec![TreeItem::new("a", "A").with_children(vec![
                TreeItem::new("b", "B").with_icon("folder"),
                TreeItem::new("c", "C").with_disabled(true),
            ])],
            TreeConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_fields_read_through() {
        let manager = sample();
        let b = manager.find_tree_node("b").unwrap();
        assert_eq!(b.value().as_deref(), Some("b"));
        assert_eq!(b.label().as_deref(), Some("B"));
        assert_eq!(b.icon().as_deref(), Some("folder"));
        assert!(!b.readonly());
        assert!(!b.hidden());

        b.set_label("Bee").unwrap();
        b.set_icon(None).unwrap();
        b.set_highlighted(true).unwrap();
        assert_eq!(b.label().as_deref(), Some("Bee"));
        assert_eq!(b.icon(), None);
        assert!(b.highlighted());
    }

    #[test]
    fn test_state_goes_through_manager() {
        let manager = sample();
        let a = manager.find_tree_node("a").unwrap();
        let b = manager.find_tree_node("b").unwrap();

        b.set_selected(true).unwrap();
        assert_eq!(a.check_state(), Some(CheckState::Indeterminate));
        assert!(!a.selected());
        assert!(b.selected_at().is_some());

        a.set_expanded(true).unwrap();
        assert!(manager.is_item_expanded(a.key()).unwrap());
    }

    #[test]
    fn test_disabled_is_advisory() {
        let manager = sample();
        let c = manager.find_tree_node("c").unwrap();
        assert!(!c.is_selectable());
        c.set_selected(true).unwrap();
        assert!(c.selected());
    }

    #[test]
    fn test_structure() {
        let manager = sample();
        let a = manager.find_tree_node("a").unwrap();
        let b = manager.find_tree_node("b").unwrap();

        assert!(a.is_parent());
        assert!(!a.is_child());
        assert!(b.is_child());
        assert_eq!(b.depth(), Some(1));
        assert_eq!(b.parent().as_deref(), Some(&*a));
        assert_eq!(b.ancestors().len(), 1);
        assert_eq!(a.children(), a.descendants(Some(1)));
    }

    #[test]
    fn test_orphaned_after_remove() {
        let manager = sample();
        let b = manager.find_tree_node("b").unwrap();
        manager.remove_item(b.key()).unwrap();

        assert!(!b.is_attached());
        assert_eq!(b.value(), None);
        assert_eq!(b.check_state(), None);
        assert!(b.children().is_empty());
        assert!(!b.selected());
        assert!(matches!(b.set_selected(true), Err(TreeError::Detached)));
        assert!(matches!(b.rerender(), Err(TreeError::Detached)));
    }

    #[test]
    fn test_orphaned_after_manager_dropped() {
        let manager = sample();
        let a = manager.find_tree_node("a").unwrap();
        drop(manager);

        assert!(a.manager().is_none());
        assert_eq!(a.label(), None);
        assert_eq!(a.depth(), None);
        assert!(matches!(a.set_label("x"), Err(TreeError::Detached)));
    }
}
