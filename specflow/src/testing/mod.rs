//! Testing utilities for specflow.
//!
//! This module provides:
//! - Builders for in-memory pipeline specs
//! - Registries that record or reject calls

mod fixtures;
mod mocks;

pub use fixtures::{spec_chain, SpecBuilder};
pub use mocks::{FailingRegistry, RecordingRegistry};
