//! Tree engine configuration.

use serde::{Deserialize, Serialize};

/// How the caller's source tree is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeEncoding {
    /// A flat ordered sequence; each item names its parent's `value`.
    Flat,
    /// Each item carries its children in `items`.
    #[default]
    Nested,
}

/// Whether selection propagates between parents and children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionRelationship {
    /// Checking an item checks its subtree, and parents derive their
    /// tri-state from their children.
    #[default]
    Related,
    /// Every item's selection is independent of every other item.
    Independent,
}

impl SelectionRelationship {
    /// Returns `true` in relationship mode.
    pub fn is_related(&self) -> bool {
        matches!(self, SelectionRelationship::Related)
    }
}

/// Configuration for a [`TreeManager`](super::TreeManager).
///
/// # Example
///
/// ```
/// use horizon_arbor::tree::{SelectionRelationship, TreeConfig, TreeEncoding};
///
/// let config = TreeConfig::new()
///     .with_encoding(TreeEncoding::Flat)
///     .with_relationship(SelectionRelationship::Independent);
/// assert_eq!(config.encoding, TreeEncoding::Flat);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Source encoding used when building from items or JSON.
    pub encoding: TreeEncoding,
    /// Selection propagation mode.
    pub relationship: SelectionRelationship,
}

impl TreeConfig {
    /// Creates the default configuration (nested encoding, related selection).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source encoding.
    pub fn with_encoding(mut self, encoding: TreeEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Sets the selection propagation mode.
    pub fn with_relationship(mut self, relationship: SelectionRelationship) -> Self {
        self.relationship = relationship;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TreeConfig::default();
        assert_eq!(config.encoding, TreeEncoding::Nested);
        assert!(config.relationship.is_related());
    }

    #[test]
    fn test_from_json_settings() {
        let config: TreeConfig =
            serde_json::from_str(r#"{"encoding": "flat", "relationship": "independent"}"#)
                .unwrap();
        assert_eq!(config.encoding, TreeEncoding::Flat);
        assert_eq!(config.relationship, SelectionRelationship::Independent);

        let partial: TreeConfig = serde_json::from_str(r#"{"encoding": "flat"}"#).unwrap();
        assert!(partial.relationship.is_related());
    }
}
