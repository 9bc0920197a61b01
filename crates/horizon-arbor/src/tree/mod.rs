//! The tree engine.
//!
//! - [`Composer`] normalizes a flat or nested source tree into one arena and
//!   answers structural queries.
//! - [`TreeManager`] owns tri-state selection, expansion and selection
//!   timestamps, and emits change notifications through [`TreeSignals`].
//! - [`TreeNode`] is a stateless per-item handle over the manager.
//! - [`TreeDebug`] prints a managed tree for inspection.

mod composer;
mod config;
mod debug;
mod item;
mod manager;
mod node;
mod state;

pub use composer::{Composer, ItemKey};
pub use config::{SelectionRelationship, TreeConfig, TreeEncoding};
pub use debug::{TreeDebug, TreeFormatOptions, TreeStyle};
pub use item::{ItemData, ItemProperty, PropertyValue, TreeItem};
pub use manager::{TreeManager, TreeSignals};
pub use node::TreeNode;
pub use state::CheckState;
