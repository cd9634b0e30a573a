//! Event sink system for observability.
//!
//! The resolution engine reports its progress through an [`EventSink`].
//! Event types are dotted names; the ones the engine emits are listed in
//! [`types`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event types emitted during resolution.
pub mod types {
    /// A resolution run started.
    pub const RESOLUTION_STARTED: &str = "resolution.started";
    /// A resolution run finished.
    pub const RESOLUTION_COMPLETED: &str = "resolution.completed";
    /// A spec was hashed and emitted.
    pub const SPEC_RESOLVED: &str = "spec.resolved";
    /// A spec was postponed to the next pass.
    pub const SPEC_DEFERRED: &str = "spec.deferred";
    /// A spec with errors was emitted.
    pub const SPEC_FAILED: &str = "spec.failed";
    /// A spec was emitted with a missing-dependency error.
    pub const SPEC_UNRESOLVABLE: &str = "spec.unresolvable";
    /// A pass over the pending specs finished.
    pub const PASS_COMPLETED: &str = "pass.completed";
}
