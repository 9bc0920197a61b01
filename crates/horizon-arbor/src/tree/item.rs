//! Item types: the caller-facing source item and the typed property accessor.
//!
//! [`TreeItem`] is the shape callers hand to the engine, in either the flat
//! encoding (`parent` holds the parent's `value`) or the nested encoding
//! (`items` holds the children). Once attached, each item's fields live in an
//! [`ItemData`] and are read and written through [`ItemProperty`] /
//! [`PropertyValue`] rather than by string key.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreeError};

/// A caller-supplied tree item.
///
/// All fields except `value` and `label` are optional; absence means "unset".
///
/// # Example
///
/// ```
/// use horizon_arbor::tree::TreeItem;
///
/// let docs = TreeItem::new("docs", "Documents")
///     .with_icon("folder")
///     .with_children(vec![
///         TreeItem::new("cv", "cv.pdf"),
///         TreeItem::new("notes", "notes.txt").with_disabled(true),
///     ]);
/// assert_eq!(docs.items.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeItem {
    /// Unique key within the tree.
    #[serde(default)]
    pub value: String,
    /// Display text.
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<bool>,
    /// Initial selection seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    /// Initial expansion seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_at: Option<u64>,
    /// Parent `value` (flat encoding only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Child items (nested encoding only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<TreeItem>,
}

impl TreeItem {
    /// Creates an item with the given value and label.
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            icon: None,
            readonly: None,
            disabled: None,
            hidden: None,
            highlighted: None,
            selected: None,
            expanded: None,
            selected_at: None,
            parent: None,
            items: Vec::new(),
        }
    }

    /// Sets the parent value (flat encoding).
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Sets the child items (nested encoding).
    pub fn with_children(mut self, items: Vec<TreeItem>) -> Self {
        self.items = items;
        self
    }

    /// Sets the icon.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Sets the readonly flag.
    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = Some(readonly);
        self
    }

    /// Sets the disabled flag.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    /// Sets the hidden flag.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    /// Seeds the initial selection.
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = Some(selected);
        self
    }

    /// Seeds the initial expansion.
    pub fn with_expanded(mut self, expanded: bool) -> Self {
        self.expanded = Some(expanded);
        self
    }

    /// Splits the item into its stored fields and its structural fields.
    pub(crate) fn into_parts(mut self) -> (ItemData, Option<String>, Vec<TreeItem>) {
        let data = ItemData {
            value: std::mem::take(&mut self.value),
            label: std::mem::take(&mut self.label),
            icon: self.icon.take(),
            readonly: self.readonly,
            disabled: self.disabled,
            hidden: self.hidden,
            highlighted: self.highlighted,
            selected: self.selected,
            expanded: self.expanded,
            selected_at: self.selected_at,
        };
        (data, self.parent.take(), std::mem::take(&mut self.items))
    }
}

impl Drop for TreeItem {
    // Iterative teardown: the derived drop recurses once per level.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.items);
        while let Some(mut item) = pending.pop() {
            pending.append(&mut item.items);
        }
    }
}

/// The non-structural fields of an attached item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemData {
    pub value: String,
    pub label: String,
    pub icon: Option<String>,
    pub readonly: Option<bool>,
    pub disabled: Option<bool>,
    pub hidden: Option<bool>,
    pub highlighted: Option<bool>,
    pub selected: Option<bool>,
    pub expanded: Option<bool>,
    pub selected_at: Option<u64>,
}

impl ItemData {
    /// Reads a property. `None` means the field is unset.
    pub fn get(&self, property: ItemProperty) -> Option<PropertyValue> {
        use ItemProperty::*;
        match property {
            Value => Some(PropertyValue::Text(self.value.clone())),
            Label => Some(PropertyValue::Text(self.label.clone())),
            Icon => self.icon.clone().map(PropertyValue::Text),
            Readonly => self.readonly.map(PropertyValue::Flag),
            Disabled => self.disabled.map(PropertyValue::Flag),
            Hidden => self.hidden.map(PropertyValue::Flag),
            Highlighted => self.highlighted.map(PropertyValue::Flag),
            Selected => self.selected.map(PropertyValue::Flag),
            Expanded => self.expanded.map(PropertyValue::Flag),
            SelectedAt => self.selected_at.map(PropertyValue::Timestamp),
        }
    }

    /// Reads a boolean property, treating an unset field as `false`.
    pub fn flag(&self, property: ItemProperty) -> bool {
        matches!(self.get(property), Some(PropertyValue::Flag(true)))
    }

    /// Writes a property. The value variant must match the property's kind.
    pub fn set(&mut self, property: ItemProperty, value: PropertyValue) -> Result<()> {
        use ItemProperty::*;
        let mismatch = || TreeError::PropertyType {
            property,
            expected: property.kind(),
        };
        match (property, value) {
            (Value, PropertyValue::Text(text)) => self.value = text,
            (Label, PropertyValue::Text(text)) => self.label = text,
            (Icon, PropertyValue::Text(text)) => self.icon = Some(text),
            (Readonly, PropertyValue::Flag(flag)) => self.readonly = Some(flag),
            (Disabled, PropertyValue::Flag(flag)) => self.disabled = Some(flag),
            (Hidden, PropertyValue::Flag(flag)) => self.hidden = Some(flag),
            (Highlighted, PropertyValue::Flag(flag)) => self.highlighted = Some(flag),
            (Selected, PropertyValue::Flag(flag)) => self.selected = Some(flag),
            (Expanded, PropertyValue::Flag(flag)) => self.expanded = Some(flag),
            (SelectedAt, PropertyValue::Timestamp(stamp)) => self.selected_at = Some(stamp),
            _ => return Err(mismatch()),
        }
        Ok(())
    }

    /// Clears an optional property.
    pub fn unset(&mut self, property: ItemProperty) -> Result<()> {
        use ItemProperty::*;
        match property {
            Value | Label => return Err(TreeError::RequiredProperty(property)),
            Icon => self.icon = None,
            Readonly => self.readonly = None,
            Disabled => self.disabled = None,
            Hidden => self.hidden = None,
            Highlighted => self.highlighted = None,
            Selected => self.selected = None,
            Expanded => self.expanded = None,
            SelectedAt => self.selected_at = None,
        }
        Ok(())
    }

    /// Rebuilds a source item from the stored fields.
    pub(crate) fn to_tree_item(&self) -> TreeItem {
        TreeItem {
            value: self.value.clone(),
            label: self.label.clone(),
            icon: self.icon.clone(),
            readonly: self.readonly,
            disabled: self.disabled,
            hidden: self.hidden,
            highlighted: self.highlighted,
            selected: self.selected,
            expanded: self.expanded,
            selected_at: self.selected_at,
            parent: None,
            items: Vec::new(),
        }
    }
}

/// Names one field of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemProperty {
    Value,
    Label,
    Icon,
    Readonly,
    Disabled,
    Hidden,
    Highlighted,
    Selected,
    Expanded,
    SelectedAt,
}

impl ItemProperty {
    /// Every property, in declaration order.
    pub const ALL: [ItemProperty; 10] = [
        ItemProperty::Value,
        ItemProperty::Label,
        ItemProperty::Icon,
        ItemProperty::Readonly,
        ItemProperty::Disabled,
        ItemProperty::Hidden,
        ItemProperty::Highlighted,
        ItemProperty::Selected,
        ItemProperty::Expanded,
        ItemProperty::SelectedAt,
    ];

    /// Name of the [`PropertyValue`] variant this property holds.
    pub fn kind(&self) -> &'static str {
        match self {
            ItemProperty::Value | ItemProperty::Label | ItemProperty::Icon => "text",
            ItemProperty::SelectedAt => "timestamp",
            _ => "flag",
        }
    }
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyValue {
    Text(String),
    Flag(bool),
    Timestamp(u64),
}

impl PropertyValue {
    /// Returns the text if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Consumes the value, returning the text if this is a text value.
    pub fn into_text(self) -> Option<String> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the flag if this is a boolean value.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            PropertyValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Returns the timestamp if this is a timestamp value.
    pub fn as_timestamp(&self) -> Option<u64> {
        match self {
            PropertyValue::Timestamp(stamp) => Some(*stamp),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(text: &str) -> Self {
        PropertyValue::Text(text.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(text: String) -> Self {
        PropertyValue::Text(text)
    }
}

impl From<bool> for PropertyValue {
    fn from(flag: bool) -> Self {
        PropertyValue::Flag(flag)
    }
}

impl From<u64> for PropertyValue {
    fn from(stamp: u64) -> Self {
        PropertyValue::Timestamp(stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deeply_nested_item_drops() {
        let mut item = TreeItem::new("n0", "N0");
        for i in 1..100_000 {
            item = TreeItem::new(format!("n{i}"), "N").with_children(vec![item]);
        }
        drop(item);
    }

    #[test]
    fn test_unset_fields_read_as_none() {
        let (data, _, _) = TreeItem::new("a", "A").into_parts();
        assert_eq!(data.get(ItemProperty::Icon), None);
        assert_eq!(data.get(ItemProperty::SelectedAt), None);
        assert!(!data.flag(ItemProperty::Disabled));
        assert_eq!(data.get(ItemProperty::Label), Some(PropertyValue::from("A")));
    }

    #[test]
    fn test_set_checks_variant() {
        let mut data = ItemData::default();
        data.set(ItemProperty::Disabled, true.into()).unwrap();
        assert!(data.flag(ItemProperty::Disabled));

        let err = data.set(ItemProperty::Disabled, "yes".into()).unwrap_err();
        assert!(matches!(
            err,
            TreeError::PropertyType {
                property: ItemProperty::Disabled,
                expected: "flag"
            }
        ));
    }

    #[test]
    fn test_required_properties_cannot_be_unset() {
        let mut data = ItemData::default();
        assert!(data.unset(ItemProperty::Icon).is_ok());
        assert!(matches!(
            data.unset(ItemProperty::Value),
            Err(TreeError::RequiredProperty(ItemProperty::Value))
        ));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let item: TreeItem = serde_json::from_str(
            r#"{"value": "a", "label": "A", "selectedAt": 3, "items": [{"value": "b", "label": "B"}]}"#,
        )
        .unwrap();
        assert_eq!(item.selected_at, Some(3));
        assert_eq!(item.items[0].value, "b");
        assert_eq!(item.items[0].parent, None);
    }
}
