//! Dirtiness of resolved specs relative to the previous run.

use crate::core::{PipelineSpec, PipelineState};
use crate::registry::StatusRegistry;
use std::sync::Arc;
use tracing::warn;

/// Decides whether a resolved spec needs re-execution.
#[derive(Clone)]
pub struct DirtyEvaluator {
    registry: Arc<dyn StatusRegistry>,
}

impl std::fmt::Debug for DirtyEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirtyEvaluator").finish_non_exhaustive()
    }
}

impl DirtyEvaluator {
    /// Creates an evaluator reading from `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn StatusRegistry>) -> Self {
        Self { registry }
    }

    /// Returns true if `spec` must run again.
    ///
    /// A spec with errors is never dirty. Otherwise it is dirty unless the
    /// registry holds a succeeded record with the same cache hash. A registry
    /// that cannot be read counts as having no record.
    #[must_use]
    pub fn evaluate(&self, spec: &PipelineSpec) -> bool {
        if !spec.is_valid() {
            return false;
        }

        let stored = match self.registry.get_status(&spec.pipeline_id) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(pipeline_id = %spec.pipeline_id, error = %e, "status lookup failed, treating as never run");
                None
            }
        };

        stored.map_or(true, |record| {
            record.cache_hash.as_deref() != spec.cache_hash() || record.state != PipelineState::Succeeded
        })
    }
}
