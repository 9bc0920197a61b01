//! Horizon Arbor - a tri-state tree selection and expansion engine.
//!
//! The engine turns a caller-supplied tree (flat with parent references, or
//! nested with children) into a managed tree that tracks checked, unchecked
//! and indeterminate selection, expansion and selection order, and tells a
//! rendering layer which items changed.
//!
//! # Example
//!
//! ```
//! use horizon_arbor::prelude::*;
//!
//! let manager = TreeManager::from_items(
//!     vec![
//!         TreeItem::new("fruit", "Fruit"),
//!         TreeItem::new("apple", "Apple").with_parent("fruit"),
//!         TreeItem::new("pear", "Pear").with_parent("fruit"),
//!     ],
//!     TreeConfig::new().with_encoding(TreeEncoding::Flat),
//! )?;
//!
//! let apple = manager.find_tree_node("apple").unwrap();
//! apple.set_selected(true)?;
//!
//! let fruit = manager.find_tree_node("fruit").unwrap();
//! assert_eq!(fruit.check_state(), Some(CheckState::Indeterminate));
//! # Ok::<(), horizon_arbor::TreeError>(())
//! ```

pub use horizon_arbor_core::*;

pub mod error;
pub mod prelude;
pub mod tree;

pub use error::{Result, TreeError};
