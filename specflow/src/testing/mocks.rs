//! Mock registries for testing.

use parking_lot::Mutex;

use crate::core::{PipelineSpec, PipelineState};
use crate::errors::RegistryError;
use crate::registry::{InMemoryStatusRegistry, StatusRecord, StatusRegistry};

/// An in-memory registry that records every registration call.
#[derive(Debug, Default)]
pub struct RecordingRegistry {
    inner: InMemoryStatusRegistry,
    registered: Mutex<Vec<String>>,
}

impl RecordingRegistry {
    /// Creates an empty recording registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording registry pre-populated with `records`.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = StatusRecord>) -> Self {
        Self {
            inner: InMemoryStatusRegistry::with_records(records),
            registered: Mutex::new(Vec::new()),
        }
    }

    /// Returns the pipeline ids passed to `register`, in call order.
    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().clone()
    }

    /// Returns how many times `pipeline_id` was registered.
    #[must_use]
    pub fn register_count(&self, pipeline_id: &str) -> usize {
        self.registered.lock().iter().filter(|id| *id == pipeline_id).count()
    }
}

impl StatusRegistry for RecordingRegistry {
    fn get_status(&self, pipeline_id: &str) -> Result<Option<StatusRecord>, RegistryError> {
        self.inner.get_status(pipeline_id)
    }

    fn register(&self, spec: &PipelineSpec) -> Result<(), RegistryError> {
        self.registered.lock().push(spec.pipeline_id.clone());
        self.inner.register(spec)
    }

    fn record_state(&self, pipeline_id: &str, state: PipelineState) -> Result<bool, RegistryError> {
        self.inner.record_state(pipeline_id, state)
    }

    fn list(&self) -> Result<Vec<StatusRecord>, RegistryError> {
        self.inner.list()
    }
}

/// A registry whose every operation fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingRegistry;

impl FailingRegistry {
    fn error() -> RegistryError {
        RegistryError::Serialization("registry unavailable".to_string())
    }
}

impl StatusRegistry for FailingRegistry {
    fn get_status(&self, _pipeline_id: &str) -> Result<Option<StatusRecord>, RegistryError> {
        Err(Self::error())
    }

    fn register(&self, _spec: &PipelineSpec) -> Result<(), RegistryError> {
        Err(Self::error())
    }

    fn record_state(&self, _pipeline_id: &str, _state: PipelineState) -> Result<bool, RegistryError> {
        Err(Self::error())
    }

    fn list(&self) -> Result<Vec<StatusRecord>, RegistryError> {
        Err(Self::error())
    }
}
