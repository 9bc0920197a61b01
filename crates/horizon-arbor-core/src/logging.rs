//! Logging facilities for Horizon Arbor.
//!
//! Horizon Arbor uses the `tracing` crate for instrumentation. To see logs,
//! you need to install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("horizon_arbor=debug")
//!         .init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! The [`targets`] constants name each subsystem so they can be filtered
//! independently; [`PerfSpan`] times an operation for profiling.

/// Span names used throughout Horizon Arbor for tracing.
///
/// These constants can be used to filter traces for specific subsystems.
pub mod span_names {
    /// Tree normalization span.
    pub const COMPOSE: &str = "horizon_arbor::compose";
    /// Tri-state propagation span.
    pub const PROPAGATE: &str = "horizon_arbor::propagate";
    /// Initial selection and expansion seeding span.
    pub const SEED: &str = "horizon_arbor::seed";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "horizon_arbor_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_arbor_core::signal";
    /// Tree normalization and structural queries.
    pub const COMPOSER: &str = "horizon_arbor::composer";
    /// Selection and expansion state.
    pub const MANAGER: &str = "horizon_arbor::manager";
    /// Node handle facade.
    pub const NODE: &str = "horizon_arbor::node";
}

/// A guard that emits a tracing span when dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::debug_span!(target: "horizon_arbor::perf", "perf", operation = name);
        Self {
            _span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span_without_subscriber() {
        let span = PerfSpan::new("test");
        drop(span);
    }

    #[test]
    fn test_targets_are_namespaced() {
        for target in [targets::COMPOSER, targets::MANAGER, targets::NODE] {
            assert!(target.starts_with("horizon_arbor::"));
        }
        assert!(targets::SIGNAL.starts_with(targets::CORE));
        for name in [span_names::COMPOSE, span_names::SEED, span_names::PROPAGATE] {
            assert!(name.starts_with("horizon_arbor::"));
        }
        assert_ne!(span_names::SEED, span_names::PROPAGATE);
    }
}
