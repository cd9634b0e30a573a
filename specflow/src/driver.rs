//! Persisting resolved specs to the status registry.

use crate::core::{PipelineId, PipelineSpec};
use crate::errors::RegistryError;
use crate::registry::StatusRegistry;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Summary of one [`Driver::register_all`] call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriverReport {
    /// Specs registered.
    pub total: usize,
    /// Specs flagged dirty.
    pub dirty: usize,
    /// Specs carrying errors.
    pub failed: usize,
    /// Ids of dirty specs, in emission order.
    pub dirty_ids: Vec<PipelineId>,
    /// Every registered spec, in emission order.
    #[serde(skip)]
    pub specs: Vec<PipelineSpec>,
}

impl DriverReport {
    /// Returns true if nothing needs to run.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dirty == 0
    }
}

/// Consumes a resolution stream and registers every final spec.
#[derive(Clone)]
pub struct Driver {
    registry: Arc<dyn StatusRegistry>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver").finish_non_exhaustive()
    }
}

impl Driver {
    /// Creates a driver writing to `registry`.
    #[must_use]
    pub fn new(registry: Arc<dyn StatusRegistry>) -> Self {
        Self { registry }
    }

    /// Registers each spec of `specs` exactly once, as it arrives.
    ///
    /// # Errors
    ///
    /// Returns the first registry error; specs after it are not consumed.
    pub fn register_all(&self, specs: impl IntoIterator<Item = PipelineSpec>) -> Result<DriverReport, RegistryError> {
        let mut report = DriverReport::default();

        for spec in specs {
            self.registry.register(&spec)?;
            debug!(pipeline_id = %spec.pipeline_id, dirty = spec.dirty, errors = spec.errors.len(), "registered spec");

            report.total += 1;
            if !spec.is_valid() {
                report.failed += 1;
            }
            if spec.dirty {
                report.dirty += 1;
                report.dirty_ids.push(spec.pipeline_id.clone());
            }
            report.specs.push(spec);
        }

        info!(
            total = report.total,
            dirty = report.dirty,
            failed = report.failed,
            "registered pipeline specs"
        );
        Ok(report)
    }
}
