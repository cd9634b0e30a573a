//! Persistent pipeline status registry.
//!
//! The registry remembers, per pipeline id, the cache hash and state of the
//! last registration. The resolver only reads it to decide dirtiness and
//! writes to it through [`StatusRegistry::register`].

mod file;
mod memory;

pub use file::JsonFileStatusRegistry;
pub use memory::InMemoryStatusRegistry;

use crate::core::{PipelineId, PipelineSpec, PipelineState, SourceDetails};
use crate::errors::{RegistryError, SpecError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// The pipeline id.
    pub pipeline_id: PipelineId,
    /// Cache hash at registration time, if it was computed.
    pub cache_hash: Option<String>,
    /// Last known state.
    pub state: PipelineState,
    /// Normalized body at registration time.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// Provenance at registration time.
    #[serde(default)]
    pub source_details: SourceDetails,
    /// Errors carried at registration time.
    #[serde(default)]
    pub errors: Vec<SpecError>,
    /// When the record was last written.
    pub registered_at: DateTime<Utc>,
}

impl StatusRecord {
    /// Builds the record that registering `spec` over `previous` produces.
    ///
    /// Specs with errors become [`PipelineState::Invalid`]; a changed hash
    /// resets the state to [`PipelineState::Pending`]; otherwise the
    /// previous state is kept.
    #[must_use]
    pub fn from_registration(spec: &PipelineSpec, previous: Option<&Self>) -> Self {
        let state = if !spec.is_valid() {
            PipelineState::Invalid
        } else {
            match previous {
                Some(prev) if prev.cache_hash.as_deref() == spec.cache_hash() && prev.state != PipelineState::Invalid => {
                    prev.state
                }
                _ => PipelineState::Pending,
            }
        };

        Self {
            pipeline_id: spec.pipeline_id.clone(),
            cache_hash: spec.cache_hash().map(str::to_string),
            state,
            body: spec.body.clone(),
            source_details: spec.source_details.clone(),
            errors: spec.errors.clone(),
            registered_at: Utc::now(),
        }
    }
}

/// Storage for pipeline status records.
pub trait StatusRegistry: Send + Sync {
    /// Looks up the record of `pipeline_id`.
    fn get_status(&self, pipeline_id: &str) -> Result<Option<StatusRecord>, RegistryError>;

    /// Upserts the record of `spec`. Registering the same spec twice is a no-op
    /// apart from the timestamp.
    fn register(&self, spec: &PipelineSpec) -> Result<(), RegistryError>;

    /// Records an execution outcome. Returns false if the pipeline is unknown.
    fn record_state(&self, pipeline_id: &str, state: PipelineState) -> Result<bool, RegistryError>;

    /// Returns every record, ordered by pipeline id.
    fn list(&self) -> Result<Vec<StatusRecord>, RegistryError>;
}
