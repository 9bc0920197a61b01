//! Error types for the tree engine.

use crate::tree::{ItemKey, ItemProperty};

/// Result type alias for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors that can occur while building or mutating a tree.
///
/// Configuration errors (`DuplicateValue`, `MissingParent`, `CyclicParent`,
/// `EncodingMismatch`, `Json`) are raised when a source tree is attached.
/// The remaining variants are per-item errors on an already attached tree and
/// never leave the tree in a partially updated state.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The key does not name an item in this tree (never registered or removed).
    #[error("Unknown item {0:?}")]
    UnknownItem(ItemKey),

    /// The node handle's manager has been dropped or its item removed.
    #[error("Tree node is detached from its manager")]
    Detached,

    /// Two items share the same `value`.
    #[error("Duplicate item value '{0}'")]
    DuplicateValue(String),

    /// A flat item references a parent value that does not exist.
    #[error("Item '{item}' references unknown parent '{parent}'")]
    MissingParent { item: String, parent: String },

    /// Parent references form a cycle.
    #[error("Cyclic parent reference through item '{0}'")]
    CyclicParent(String),

    /// An item uses the structural field of the other encoding.
    #[error("Item '{value}' does not match the configured encoding: {reason}")]
    EncodingMismatch { value: String, reason: &'static str },

    /// A move would place an item under itself or one of its descendants.
    #[error("Cannot move item '{item}' under '{target}'")]
    InvalidMove { item: String, target: String },

    /// A property was written with a value of the wrong variant.
    #[error("Property {property:?} expects a {expected} value")]
    PropertyType {
        property: ItemProperty,
        expected: &'static str,
    },

    /// A required property cannot be unset.
    #[error("Property {0:?} is required and cannot be unset")]
    RequiredProperty(ItemProperty),

    /// The property is derived by the manager and cannot be written directly.
    #[error("Property {0:?} is read-only")]
    ReadOnlyProperty(ItemProperty),

    /// The JSON source could not be parsed.
    #[error("Invalid tree source: {0}")]
    Json(#[from] serde_json::Error),
}

impl TreeError {
    /// Create a missing parent error.
    pub fn missing_parent(item: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::MissingParent {
            item: item.into(),
            parent: parent.into(),
        }
    }

    /// Create an encoding mismatch error.
    pub fn encoding_mismatch(value: impl Into<String>, reason: &'static str) -> Self {
        Self::EncodingMismatch {
            value: value.into(),
            reason,
        }
    }

    /// Create an invalid move error.
    pub fn invalid_move(item: impl Into<String>, target: impl Into<String>) -> Self {
        Self::InvalidMove {
            item: item.into(),
            target: target.into(),
        }
    }

    /// Returns `true` for errors raised while attaching a source tree.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateValue(_)
                | Self::MissingParent { .. }
                | Self::CyclicParent(_)
                | Self::EncodingMismatch { .. }
                | Self::Json(_)
        )
    }
}
