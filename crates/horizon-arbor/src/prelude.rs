//! Prelude module for Horizon Arbor.
//!
//! ```ignore
//! use horizon_arbor::prelude::*;
//! ```

// ============================================================================
// Signals
// ============================================================================

pub use crate::{ConnectionGuard, ConnectionId, Signal};

// ============================================================================
// Tree engine
// ============================================================================

pub use crate::tree::{
    CheckState, Composer, ItemKey, ItemProperty, PropertyValue, SelectionRelationship,
    TreeConfig, TreeDebug, TreeEncoding, TreeFormatOptions, TreeItem, TreeManager, TreeNode,
    TreeSignals, TreeStyle,
};

// ============================================================================
// Errors
// ============================================================================

pub use crate::error::{Result, TreeError};
