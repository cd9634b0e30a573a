//! Discovered pipeline specifications.

use super::Schedule;
use crate::errors::SpecError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Stable identifier of a declared pipeline: `<relative source path>:<name>`.
pub type PipelineId = String;

/// Builds a [`PipelineId`] from a root-relative source path and a pipeline name.
#[must_use]
pub fn pipeline_id(relative_source: &str, name: &str) -> PipelineId {
    format!("{relative_source}:{name}")
}

/// Provenance of a spec: which parser produced it and from which expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDetails {
    /// Name of the parser that produced the spec.
    pub parser: String,
    /// Source path relative to the discovery root.
    pub source: String,
    /// Expansion key for specs produced from a multi-pipeline or matrix file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion: Option<String>,
    /// Matrix parameters bound for this expansion.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl SourceDetails {
    /// Creates source details for a spec produced by `parser` from `source`.
    #[must_use]
    pub fn new(parser: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            parser: parser.into(),
            source: source.into(),
            expansion: None,
            parameters: BTreeMap::new(),
        }
    }

    /// Sets the expansion key.
    #[must_use]
    pub fn with_expansion(mut self, expansion: impl Into<String>) -> Self {
        self.expansion = Some(expansion.into());
        self
    }

    /// Adds a bound matrix parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// One discovered, possibly invalid, pipeline definition.
///
/// A spec is created once by the [`SpecSource`](crate::source::SpecSource),
/// mutated in place while it is resolved, and emitted exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Stable identifier, unique per declared pipeline.
    pub pipeline_id: PipelineId,
    /// Declared (or derived) pipeline name.
    pub name: String,
    /// Absolute path of the originating file.
    pub source_path: PathBuf,
    /// Parsed configuration tree, `None` if parsing failed.
    pub body: Option<serde_json::Value>,
    /// Provenance metadata.
    pub source_details: SourceDetails,
    /// Pipelines this one depends on, already resolved to ids.
    #[serde(default)]
    pub dependencies: Vec<PipelineId>,
    /// Normalized trigger, if the pipeline declares one.
    #[serde(default)]
    pub schedule: Option<Schedule>,
    /// Append-only error list.
    #[serde(default)]
    pub errors: Vec<SpecError>,
    cache_hash: Option<String>,
    /// Whether the pipeline needs re-execution. Only meaningful once hashed.
    #[serde(default)]
    pub dirty: bool,
}

impl PipelineSpec {
    /// Creates a new spec with a parsed body.
    #[must_use]
    pub fn new(
        pipeline_id: impl Into<PipelineId>,
        name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        source_details: SourceDetails,
        body: serde_json::Value,
    ) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            name: name.into(),
            source_path: source_path.into(),
            body: Some(body),
            source_details,
            dependencies: Vec::new(),
            schedule: None,
            errors: Vec::new(),
            cache_hash: None,
            dirty: false,
        }
    }

    /// Creates a spec for a source that could not be parsed.
    #[must_use]
    pub fn failed(
        pipeline_id: impl Into<PipelineId>,
        name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        source_details: SourceDetails,
        error: SpecError,
    ) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            name: name.into(),
            source_path: source_path.into(),
            body: None,
            source_details,
            dependencies: Vec::new(),
            schedule: None,
            errors: vec![error],
            cache_hash: None,
            dirty: false,
        }
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<PipelineId>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Appends an error.
    #[must_use]
    pub fn with_error(mut self, error: SpecError) -> Self {
        self.errors.push(error);
        self
    }

    /// Appends an error in place.
    pub fn push_error(&mut self, error: SpecError) {
        self.errors.push(error);
    }

    /// Returns true if the spec carries no errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the cache hash, if it has been computed.
    #[must_use]
    pub fn cache_hash(&self) -> Option<&str> {
        self.cache_hash.as_deref()
    }

    /// Sets the cache hash. A hash that is already set is never replaced.
    ///
    /// Returns `false` if the hash was already set.
    pub(crate) fn set_cache_hash(&mut self, hash: String) -> bool {
        if self.cache_hash.is_some() {
            return false;
        }
        self.cache_hash = Some(hash);
        true
    }

    /// Directory of the source file; relative references resolve against it.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        self.source_path.parent().unwrap_or_else(|| Path::new(""))
    }
}
