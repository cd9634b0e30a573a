//! In-memory status registry.

use super::{StatusRecord, StatusRegistry};
use crate::core::{PipelineSpec, PipelineState};
use crate::errors::RegistryError;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory status registry.
#[derive(Debug, Default)]
pub struct InMemoryStatusRegistry {
    records: RwLock<BTreeMap<String, StatusRecord>>,
}

impl InMemoryStatusRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with `records`.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = StatusRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.pipeline_id.clone(), record))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl StatusRegistry for InMemoryStatusRegistry {
    fn get_status(&self, pipeline_id: &str) -> Result<Option<StatusRecord>, RegistryError> {
        Ok(self.records.read().get(pipeline_id).cloned())
    }

    fn register(&self, spec: &PipelineSpec) -> Result<(), RegistryError> {
        let mut records = self.records.write();
        let record = StatusRecord::from_registration(spec, records.get(&spec.pipeline_id));
        records.insert(spec.pipeline_id.clone(), record);
        Ok(())
    }

    fn record_state(&self, pipeline_id: &str, state: PipelineState) -> Result<bool, RegistryError> {
        let mut records = self.records.write();
        let Some(record) = records.get_mut(pipeline_id) else {
            return Ok(false);
        };
        record.state = state;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<StatusRecord>, RegistryError> {
        Ok(self.records.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SpecBuilder;

    #[test]
    fn test_register_and_get() {
        let registry = InMemoryStatusRegistry::new();
        assert!(registry.is_empty());

        registry.register(&SpecBuilder::new("a").hashed("h1").build()).unwrap();

        let record = registry.get_status("a").unwrap().unwrap();
        assert_eq!(record.cache_hash.as_deref(), Some("h1"));
        assert_eq!(record.state, PipelineState::Pending);
        assert!(registry.get_status("b").unwrap().is_none());
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = InMemoryStatusRegistry::new();
        let spec = SpecBuilder::new("a").hashed("h1").build();

        registry.register(&spec).unwrap();
        registry.record_state("a", PipelineState::Succeeded).unwrap();
        registry.register(&spec).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_status("a").unwrap().unwrap().state, PipelineState::Succeeded);
    }

    #[test]
    fn test_record_state_unknown_pipeline() {
        let registry = InMemoryStatusRegistry::new();
        assert!(!registry.record_state("ghost", PipelineState::Failed).unwrap());
    }

    #[test]
    fn test_list_is_ordered() {
        let registry = InMemoryStatusRegistry::new();
        registry.register(&SpecBuilder::new("b").build()).unwrap();
        registry.register(&SpecBuilder::new("a").build()).unwrap();

        let ids: Vec<_> = registry.list().unwrap().into_iter().map(|r| r.pipeline_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
