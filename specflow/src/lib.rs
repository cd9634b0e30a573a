//! # Specflow
//!
//! Discovery, dependency resolution and incremental caching of declarative
//! pipeline definitions.
//!
//! Specflow walks a directory tree for pipeline files and resolves them into
//! hashed, validated specs:
//!
//! - **Discovery**: JSON and TOML pipeline files, with multi-pipeline and
//!   matrix expansion
//! - **Fixed-point resolution**: dependencies are found while hashing, with
//!   no graph built up front; cycles and missing pipelines end as errors
//! - **Content-addressable cache keys**: a pipeline's hash covers its body,
//!   its scripts and the hashes of everything upstream
//! - **Dirty tracking**: a persisted status registry decides what must run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use specflow::prelude::*;
//!
//! let config = ResolverConfig::new()
//!     .with_root("pipelines")
//!     .with_registry_path(".specflow/status.json");
//!
//! let report = Resolver::from_config(&config)?.run()?;
//! for id in &report.dirty_ids {
//!     println!("needs a run: {id}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod dirty;
pub mod driver;
pub mod errors;
pub mod events;
pub mod executors;
pub mod hashing;
pub mod observability;
pub mod registry;
pub mod resolve;
pub mod resolver;
pub mod source;
pub mod testing;
pub mod utils;
pub mod validation;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{LoggingConfig, ResolverConfig};
    pub use crate::core::{PipelineId, PipelineSpec, PipelineState, Schedule, SourceDetails};
    pub use crate::dirty::DirtyEvaluator;
    pub use crate::driver::{Driver, DriverReport};
    pub use crate::errors::{ConfigError, RegistryError, SpecError, SpecErrorKind, SpecflowError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executors::{ExecutorRef, ExecutorResolver, ScriptExecutorResolver};
    pub use crate::hashing::{HashCalculator, HashOutcome};
    pub use crate::registry::{InMemoryStatusRegistry, JsonFileStatusRegistry, StatusRecord, StatusRegistry};
    pub use crate::resolve::{Resolution, ResolutionEngine, ResolutionStats};
    pub use crate::resolver::Resolver;
    pub use crate::source::{JsonSpecParser, SpecParser, SpecSource, TomlSpecParser};
    pub use crate::validation::{SchemaValidator, Validator};
}
