//! Status registry persisted as a single JSON document.

use super::{StatusRecord, StatusRegistry};
use crate::core::{PipelineSpec, PipelineState};
use crate::errors::RegistryError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const FORMAT_VERSION: u32 = 1;

#[derive(Deserialize)]
struct RegistryDocument {
    version: u32,
    #[serde(default)]
    pipelines: BTreeMap<String, StatusRecord>,
}

#[derive(Serialize)]
struct RegistryDocumentRef<'a> {
    version: u32,
    pipelines: &'a BTreeMap<String, StatusRecord>,
}

/// Status registry backed by a JSON file.
///
/// The whole document is held in memory and rewritten on every change,
/// through a sibling temp file and a rename so readers never observe a
/// partially written file. A change only reaches memory once it is on disk.
#[derive(Debug)]
pub struct JsonFileStatusRegistry {
    path: PathBuf,
    records: RwLock<BTreeMap<String, StatusRecord>>,
}

impl JsonFileStatusRegistry {
    /// Opens the registry at `path`. A missing file is an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(bytes) => {
                let document: RegistryDocument = serde_json::from_slice(&bytes)?;
                if document.version != FORMAT_VERSION {
                    return Err(RegistryError::Serialization(format!(
                        "unsupported registry version {} in {}",
                        document.version,
                        path.display()
                    )));
                }
                document.pipelines
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(RegistryError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), records = records.len(), "opened status registry");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, records: &BTreeMap<String, StatusRecord>) -> Result<(), RegistryError> {
        let document = RegistryDocumentRef {
            version: FORMAT_VERSION,
            pipelines: records,
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RegistryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(|source| RegistryError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| RegistryError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl StatusRegistry for JsonFileStatusRegistry {
    fn get_status(&self, pipeline_id: &str) -> Result<Option<StatusRecord>, RegistryError> {
        Ok(self.records.read().get(pipeline_id).cloned())
    }

    fn register(&self, spec: &PipelineSpec) -> Result<(), RegistryError> {
        let mut records = self.records.write();
        let mut next = records.clone();
        let record = StatusRecord::from_registration(spec, records.get(&spec.pipeline_id));
        next.insert(spec.pipeline_id.clone(), record);

        self.persist(&next)?;
        *records = next;
        Ok(())
    }

    fn record_state(&self, pipeline_id: &str, state: PipelineState) -> Result<bool, RegistryError> {
        let mut records = self.records.write();
        if !records.contains_key(pipeline_id) {
            return Ok(false);
        }
        let mut next = records.clone();
        if let Some(record) = next.get_mut(pipeline_id) {
            record.state = state;
        }

        self.persist(&next)?;
        *records = next;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<StatusRecord>, RegistryError> {
        Ok(self.records.read().values().cloned().collect())
    }
}
