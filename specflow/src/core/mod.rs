//! Core domain model types for specflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - The pipeline spec record and its provenance
//! - Normalized schedules
//! - Persisted pipeline states

mod schedule;
mod spec;
mod status;

pub use schedule::{normalize_schedule, Schedule};
pub use spec::{pipeline_id, PipelineId, PipelineSpec, SourceDetails};
pub use status::PipelineState;
