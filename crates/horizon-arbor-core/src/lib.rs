//! Core systems for Horizon Arbor.
//!
//! This crate provides the foundational pieces shared by the Horizon Arbor
//! tree engine:
//!
//! - **Signal/Slot System**: Type-safe change notification for renderers
//! - **Logging**: `tracing` targets, span names and a timing guard
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_arbor_core::Signal;
//!
//! // Create a signal that notifies when a value changes
//! let value_changed = Signal::<i32>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! // Emit the signal
//! value_changed.emit(42);
//!
//! // Disconnect when done
//! value_changed.disconnect(conn_id);
//! ```

pub mod logging;
pub mod signal;

pub use logging::PerfSpan;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
