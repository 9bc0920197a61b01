//! Normalization of flat and nested source trees into one traversal model.
//!
//! The [`Composer`] owns an arena of items keyed by [`ItemKey`]. Both source
//! encodings are resolved into the same parent/children links at
//! construction, so every structural query below is index-based and does not
//! care which encoding the caller used. The composer knows nothing about
//! selection or expansion.

use std::collections::{HashMap, HashSet};

use horizon_arbor_core::PerfSpan;
use horizon_arbor_core::logging::{span_names, targets};
use slotmap::{SecondaryMap, SlotMap, new_key_type};

use super::config::TreeEncoding;
use super::item::{ItemData, ItemProperty, PropertyValue, TreeItem};
use crate::error::{Result, TreeError};

new_key_type! {
    /// Identifies one item in a [`Composer`].
    ///
    /// Keys are generational: once an item is removed its key never names
    /// another item, so stale keys fail lookups instead of aliasing.
    pub struct ItemKey;
}

/// An item plus its structural links.
#[derive(Debug)]
struct ItemRecord {
    data: ItemData,
    parent: Option<ItemKey>,
    children: Vec<ItemKey>,
}

/// Normalized view over a caller-supplied tree.
///
/// # Example
///
/// ```
/// use horizon_arbor::tree::{Composer, TreeEncoding, TreeItem};
///
/// let composer = Composer::new(
///     vec![
///         TreeItem::new("root", "Root"),
///         TreeItem::new("leaf", "Leaf").with_parent("root"),
///     ],
///     TreeEncoding::Flat,
/// )
/// .unwrap();
///
/// let leaf = composer.find_by_value("leaf").unwrap();
/// assert_eq!(composer.get_item_depth(leaf), Some(1));
/// ```
#[derive(Debug)]
pub struct Composer {
    items: SlotMap<ItemKey, ItemRecord>,
    roots: Vec<ItemKey>,
    by_value: HashMap<String, ItemKey>,
    encoding: TreeEncoding,
}

impl Composer {
    /// Builds a composer from source items in the given encoding.
    ///
    /// Duplicate values, unknown or cyclic parent references, and items that
    /// use the other encoding's structural field are reported here.
    pub fn new(source: Vec<TreeItem>, encoding: TreeEncoding) -> Result<Self> {
        let _span = PerfSpan::new(span_names::COMPOSE);
        let mut composer = Self {
            items: SlotMap::with_key(),
            roots: Vec::new(),
            by_value: HashMap::new(),
            encoding,
        };

        let result = match encoding {
            TreeEncoding::Flat => composer.attach_flat(source),
            TreeEncoding::Nested => composer.attach_nested(source),
        };
        if let Err(err) = result {
            tracing::warn!(target: targets::COMPOSER, error = %err, "rejected source tree");
            return Err(err);
        }

        tracing::debug!(
            target: targets::COMPOSER,
            ?encoding,
            items = composer.items.len(),
            roots = composer.roots.len(),
            "composed tree"
        );
        Ok(composer)
    }

    /// Parses a JSON array of items in the given encoding.
    pub fn from_json(json: &str, encoding: TreeEncoding) -> Result<Self> {
        let source: Vec<TreeItem> = serde_json::from_str(json)?;
        Self::new(source, encoding)
    }

    fn attach_nested(&mut self, source: Vec<TreeItem>) -> Result<()> {
        let mut seen = HashSet::new();
        for item in &source {
            validate_nested(item, &mut seen, &self.by_value)?;
        }
        for item in source {
            let key = self.attach(item, None);
            self.roots.push(key);
        }
        Ok(())
    }

    fn attach_flat(&mut self, source: Vec<TreeItem>) -> Result<()> {
        let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(source.len());
        for (index, item) in source.iter().enumerate() {
            if !item.items.is_empty() {
                return Err(TreeError::encoding_mismatch(
                    &item.value,
                    "flat items cannot carry nested children",
                ));
            }
            if index_of.insert(item.value.as_str(), index).is_some() {
                return Err(TreeError::DuplicateValue(item.value.clone()));
            }
        }

        let mut parent_index = Vec::with_capacity(source.len());
        for item in &source {
            let parent = match item.parent.as_deref() {
                None => None,
                Some(parent) => match index_of.get(parent) {
                    Some(&index) => Some(index),
                    None => return Err(TreeError::missing_parent(&item.value, parent)),
                },
            };
            parent_index.push(parent);
        }
        drop(index_of);
        detect_cycles(&parent_index, &source)?;

        let keys: Vec<ItemKey> = source
            .into_iter()
            .map(|item| {
                let (data, _, _) = item.into_parts();
                self.insert_record(data, None)
            })
            .collect();

        // Source order is preserved among siblings.
        for (index, parent) in parent_index.into_iter().enumerate() {
            let key = keys[index];
            match parent {
                Some(parent) => {
                    let parent_key = keys[parent];
                    self.items[key].parent = Some(parent_key);
                    self.items[parent_key].children.push(key);
                }
                None => self.roots.push(key),
            }
        }
        Ok(())
    }

    /// Inserts a nested item and its subtree below `parent`. Does not link the
    /// returned key into the parent's children.
    fn attach(&mut self, item: TreeItem, parent: Option<ItemKey>) -> ItemKey {
        let (data, _, children) = item.into_parts();
        let root = self.insert_record(data, parent);
        let mut stack = vec![(root, children.into_iter())];
        while let Some((key, children)) = stack.last_mut() {
            let key = *key;
            match children.next() {
                Some(child) => {
                    let (data, _, grandchildren) = child.into_parts();
                    let child_key = self.insert_record(data, Some(key));
                    self.items[key].children.push(child_key);
                    stack.push((child_key, grandchildren.into_iter()));
                }
                None => {
                    stack.pop();
                }
            }
        }
        root
    }

    fn insert_record(&mut self, data: ItemData, parent: Option<ItemKey>) -> ItemKey {
        let value = data.value.clone();
        let key = self.items.insert(ItemRecord {
            data,
            parent,
            children: Vec::new(),
        });
        self.by_value.insert(value, key);
        key
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Returns the encoding the source tree was supplied in.
    pub fn encoding(&self) -> TreeEncoding {
        self.encoding
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the tree has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` if the key names a live item.
    pub fn contains(&self, key: ItemKey) -> bool {
        self.items.contains_key(key)
    }

    /// Returns the root items in order.
    pub fn roots(&self) -> &[ItemKey] {
        &self.roots
    }

    /// Finds an item by its unique value.
    pub fn find_by_value(&self, value: &str) -> Option<ItemKey> {
        self.by_value.get(value).copied()
    }

    /// Returns the stored fields of an item.
    pub fn item(&self, key: ItemKey) -> Option<&ItemData> {
        self.items.get(key).map(|record| &record.data)
    }

    /// Returns every item in pre-order across the whole forest.
    pub fn keys(&self) -> Vec<ItemKey> {
        let mut out = Vec::with_capacity(self.items.len());
        for &root in &self.roots {
            out.push(root);
            self.walk_descendants(root, None, &mut out);
        }
        out
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Reads a named field. Returns `None` if the field is unset or the key is
    /// unknown.
    pub fn get_item_property_value(
        &self,
        key: ItemKey,
        property: ItemProperty,
    ) -> Option<PropertyValue> {
        self.item(key).and_then(|data| data.get(property))
    }

    /// Reads a boolean field, treating unset fields and unknown keys as `false`.
    pub fn item_flag(&self, key: ItemKey, property: ItemProperty) -> bool {
        self.item(key).is_some_and(|data| data.flag(property))
    }

    /// Writes a named field. This is a plain write with no propagation.
    pub fn set_item_property_value(
        &mut self,
        key: ItemKey,
        property: ItemProperty,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        let value = value.into();
        let record = self.items.get(key).ok_or(TreeError::UnknownItem(key))?;

        if let (ItemProperty::Value, PropertyValue::Text(new_value)) = (property, &value) {
            let old_value = record.data.value.clone();
            if *new_value == old_value {
                return Ok(());
            }
            if self.by_value.contains_key(new_value.as_str()) {
                return Err(TreeError::DuplicateValue(new_value.clone()));
            }
            self.items[key].data.set(property, value.clone())?;
            self.by_value.remove(&old_value);
            self.by_value.insert(new_value.clone(), key);
            return Ok(());
        }

        self.items[key].data.set(property, value)
    }

    /// Clears an optional field.
    pub fn unset_item_property_value(&mut self, key: ItemKey, property: ItemProperty) -> Result<()> {
        self.items
            .get_mut(key)
            .ok_or(TreeError::UnknownItem(key))?
            .data
            .unset(property)
    }

    /// Records or clears the selection timestamp of an item.
    pub(crate) fn set_selected_at(&mut self, key: ItemKey, stamp: Option<u64>) {
        if let Some(record) = self.items.get_mut(key) {
            record.data.selected_at = stamp;
        }
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Returns the parent of an item, or `None` for roots and unknown keys.
    pub fn get_item_parent(&self, key: ItemKey) -> Option<ItemKey> {
        self.items.get(key).and_then(|record| record.parent)
    }

    /// Returns the children of an item in order (empty for unknown keys).
    pub fn get_item_children(&self, key: ItemKey) -> &[ItemKey] {
        self.items
            .get(key)
            .map(|record| record.children.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the number of ancestors of an item. Roots have depth 0.
    ///
    /// Computed on every call, so it is always correct after a move.
    pub fn get_item_depth(&self, key: ItemKey) -> Option<usize> {
        if !self.contains(key) {
            return None;
        }
        Some(self.get_item_ancestors(key).len())
    }

    /// Returns the ancestors of an item, nearest first (parent, grandparent,
    /// ..., root).
    pub fn get_item_ancestors(&self, key: ItemKey) -> Vec<ItemKey> {
        let mut out = Vec::new();
        let mut current = self.get_item_parent(key);
        while let Some(parent) = current {
            // Links are acyclic by construction; the bound keeps a corrupted
            // arena from looping forever.
            if out.len() >= self.items.len() {
                break;
            }
            out.push(parent);
            current = self.get_item_parent(parent);
        }
        out
    }

    /// Returns the descendants of an item in pre-order.
    ///
    /// `depth` bounds how many levels below the item are visited: `Some(1)`
    /// yields exactly the children, `Some(0)` nothing, `None` the full
    /// subtree.
    pub fn get_item_descendants(&self, key: ItemKey, depth: Option<usize>) -> Vec<ItemKey> {
        let mut out = Vec::new();
        self.walk_descendants(key, depth, &mut out);
        out
    }

    fn walk_descendants(&self, key: ItemKey, depth: Option<usize>, out: &mut Vec<ItemKey>) {
        let mut stack: Vec<(ItemKey, usize)> = self
            .get_item_children(key)
            .iter()
            .rev()
            .map(|&child| (child, 1))
            .collect();
        while let Some((current, level)) = stack.pop() {
            if depth.is_some_and(|max| level > max) {
                continue;
            }
            out.push(current);
            stack.extend(
                self.get_item_children(current)
                    .iter()
                    .rev()
                    .map(|&child| (child, level + 1)),
            );
        }
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `key`.
    pub fn is_ancestor_of(&self, ancestor: ItemKey, key: ItemKey) -> bool {
        self.get_item_ancestors(key).contains(&ancestor)
    }

    fn siblings_mut(&mut self, parent: Option<ItemKey>) -> &mut Vec<ItemKey> {
        match parent {
            Some(parent) => &mut self.items[parent].children,
            None => &mut self.roots,
        }
    }

    /// Inserts an item (with any nested children) under `parent` at `index`,
    /// or at the end when `index` is `None` or past the end.
    ///
    /// Inserted items always use the nested encoding.
    pub fn insert_item(
        &mut self,
        parent: Option<ItemKey>,
        index: Option<usize>,
        item: TreeItem,
    ) -> Result<ItemKey> {
        if let Some(parent) = parent {
            if !self.contains(parent) {
                return Err(TreeError::UnknownItem(parent));
            }
        }
        validate_nested(&item, &mut HashSet::new(), &self.by_value)?;

        let key = self.attach(item, parent);
        let siblings = self.siblings_mut(parent);
        let index = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(index, key);
        tracing::trace!(target: targets::COMPOSER, ?key, ?parent, index, "inserted item");
        Ok(key)
    }

    /// Removes an item and its subtree, returning them in nested form.
    pub fn remove_item(&mut self, key: ItemKey) -> Result<TreeItem> {
        let parent = self
            .items
            .get(key)
            .ok_or(TreeError::UnknownItem(key))?
            .parent;
        self.siblings_mut(parent).retain(|&sibling| sibling != key);

        let removed = self.detach_subtree(key);
        tracing::trace!(target: targets::COMPOSER, ?key, "removed item");
        Ok(removed)
    }

    fn detach_subtree(&mut self, key: ItemKey) -> TreeItem {
        let mut order = vec![key];
        self.walk_descendants(key, None, &mut order);

        // Reverse pre-order finishes every child before its parent.
        let mut built: SecondaryMap<ItemKey, TreeItem> = SecondaryMap::new();
        for &current in order.iter().rev() {
            let Some(record) = self.items.remove(current) else {
                continue;
            };
            self.by_value.remove(&record.data.value);
            let mut item = record.data.to_tree_item();
            item.items = record
                .children
                .iter()
                .filter_map(|&child| built.remove(child))
                .collect();
            built.insert(current, item);
        }
        built.remove(key).unwrap_or_default()
    }

    /// Moves an item (with its subtree) under `new_parent` at `index`.
    ///
    /// `index` is interpreted after the item has been detached from its old
    /// position. Moving an item under itself or one of its descendants fails.
    pub fn move_item(
        &mut self,
        key: ItemKey,
        new_parent: Option<ItemKey>,
        index: Option<usize>,
    ) -> Result<()> {
        let old_parent = self
            .items
            .get(key)
            .ok_or(TreeError::UnknownItem(key))?
            .parent;
        if let Some(target) = new_parent {
            if !self.contains(target) {
                return Err(TreeError::UnknownItem(target));
            }
            if target == key || self.is_ancestor_of(key, target) {
                return Err(TreeError::invalid_move(
                    &self.items[key].data.value,
                    &self.items[target].data.value,
                ));
            }
        }

        self.siblings_mut(old_parent).retain(|&sibling| sibling != key);
        self.items[key].parent = new_parent;
        let siblings = self.siblings_mut(new_parent);
        let index = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(index, key);
        tracing::trace!(target: targets::COMPOSER, ?key, ?old_parent, ?new_parent, index, "moved item");
        Ok(())
    }

    /// Rebuilds the source items in the requested encoding.
    pub fn export(&self, encoding: TreeEncoding) -> Vec<TreeItem> {
        match encoding {
            TreeEncoding::Nested => self
                .roots
                .iter()
                .map(|&root| self.export_nested(root))
                .collect(),
            TreeEncoding::Flat => self
                .keys()
                .into_iter()
                .map(|key| {
                    let record = &self.items[key];
                    let mut item = record.data.to_tree_item();
                    item.parent = record
                        .parent
                        .map(|parent| self.items[parent].data.value.clone());
                    item
                })
                .collect(),
        }
    }

    fn export_nested(&self, key: ItemKey) -> TreeItem {
        let mut order = vec![key];
        self.walk_descendants(key, None, &mut order);

        let mut built: SecondaryMap<ItemKey, TreeItem> = SecondaryMap::new();
        for &current in order.iter().rev() {
            let record = &self.items[current];
            let mut item = record.data.to_tree_item();
            item.items = record
                .children
                .iter()
                .filter_map(|&child| built.remove(child))
                .collect();
            built.insert(current, item);
        }
        built.remove(key).unwrap_or_default()
    }
}

/// Checks a nested subtree for duplicate values and stray parent references.
fn validate_nested(
    item: &TreeItem,
    seen: &mut HashSet<String>,
    existing: &HashMap<String, ItemKey>,
) -> Result<()> {
    let mut stack = vec![item];
    while let Some(item) = stack.pop() {
        if item.parent.is_some() {
            return Err(TreeError::encoding_mismatch(
                &item.value,
                "nested items cannot reference a parent value",
            ));
        }
        if existing.contains_key(&item.value) || !seen.insert(item.value.clone()) {
            return Err(TreeError::DuplicateValue(item.value.clone()));
        }
        stack.extend(item.items.iter());
    }
    Ok(())
}

/// Rejects parent chains that loop back on themselves.
fn detect_cycles(parent_index: &[Option<usize>], source: &[TreeItem]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; parent_index.len()];
    let mut path = Vec::new();
    for start in 0..parent_index.len() {
        let mut current = Some(start);
        while let Some(index) = current {
            match marks[index] {
                Mark::Done => break,
                Mark::InProgress => {
                    return Err(TreeError::CyclicParent(source[index].value.clone()));
                }
                Mark::Unvisited => {
                    marks[index] = Mark::InProgress;
                    path.push(index);
                    current = parent_index[index];
                }
            }
        }
        for index in path.drain(..) {
            marks[index] = Mark::Done;
        }
    }
    Ok(())
}
