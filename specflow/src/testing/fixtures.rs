//! Builders for in-memory pipeline specs.

use crate::core::{PipelineSpec, SourceDetails};
use crate::errors::SpecError;

/// A builder for [`PipelineSpec`]s that never touch the filesystem.
///
/// The pipeline id doubles as the name and the relative source path, so
/// tests can refer to specs by short ids such as `"a"`.
#[derive(Debug, Clone)]
pub struct SpecBuilder {
    id: String,
    body: Option<serde_json::Value>,
    dependencies: Vec<String>,
    errors: Vec<SpecError>,
    cache_hash: Option<String>,
    dirty: bool,
}

impl SpecBuilder {
    /// Starts a spec with a minimal valid body.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: Some(serde_json::json!({
                "steps": [{"name": "run", "executor": "shell"}],
            })),
            dependencies: Vec::new(),
            errors: Vec::new(),
            cache_hash: None,
            dirty: false,
        }
    }

    /// Replaces the body.
    #[must_use]
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Removes the body, as for a spec that failed to parse.
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.body = None;
        self
    }

    /// Adds a dependency on another pipeline id.
    #[must_use]
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Appends an error.
    #[must_use]
    pub fn error(mut self, error: SpecError) -> Self {
        self.errors.push(error);
        self
    }

    /// Presets the cache hash.
    #[must_use]
    pub fn hashed(mut self, hash: impl Into<String>) -> Self {
        self.cache_hash = Some(hash.into());
        self
    }

    /// Presets the dirty flag.
    #[must_use]
    pub fn dirty(mut self, dirty: bool) -> Self {
        self.dirty = dirty;
        self
    }

    /// Builds the spec.
    #[must_use]
    pub fn build(self) -> PipelineSpec {
        let details = SourceDetails::new("test", &self.id);
        let mut spec = match self.body {
            Some(body) => PipelineSpec::new(&self.id, &self.id, format!("/specs/{}", self.id), details, body),
            None => PipelineSpec::failed(
                &self.id,
                &self.id,
                format!("/specs/{}", self.id),
                details,
                SpecError::parse("unparseable"),
            ),
        }
        .with_dependencies(self.dependencies);

        spec.errors.extend(self.errors);
        if let Some(hash) = self.cache_hash {
            spec.set_cache_hash(hash);
        }
        spec.dirty = self.dirty;
        spec
    }
}

/// Builds a chain of specs where each depends on the next: `ids[0] -> ids[1] -> ...`.
#[must_use]
pub fn spec_chain(ids: &[&str]) -> Vec<PipelineSpec> {
    ids.iter()
        .enumerate()
        .map(|(idx, id)| {
            let builder = SpecBuilder::new(*id);
            match ids.get(idx + 1) {
                Some(next) => builder.depends_on(*next).build(),
                None => builder.build(),
            }
        })
        .collect()
}
