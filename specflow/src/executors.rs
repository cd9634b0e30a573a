//! Executor resolution for pipeline steps.
//!
//! A step either names its executor explicitly or points at a script whose
//! extension decides the executor. Script contents are digested so that
//! editing a script changes the pipeline's cache hash.

use crate::core::PipelineSpec;
use crate::errors::SpecError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A resolved reference to the executor of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorRef {
    /// Executor kind, e.g. `python` or `shell`.
    pub kind: String,
    /// Script path as written in the spec, if any.
    pub script: Option<String>,
    /// SHA-256 of the script contents, if any.
    pub digest: Option<String>,
}

impl ExecutorRef {
    /// Creates a reference to an explicitly named executor.
    #[must_use]
    pub fn named(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            script: None,
            digest: None,
        }
    }
}

/// Resolves the executor of a step.
pub trait ExecutorResolver: fmt::Debug + Send + Sync {
    /// Resolves the executor for `step`, with relative paths anchored at
    /// `base_path`. Failures are appended to `errors` and yield `None`.
    fn resolve_executor(
        &self,
        step: &Map<String, Value>,
        base_path: &Path,
        errors: &mut Vec<SpecError>,
    ) -> Option<ExecutorRef>;
}

fn default_executors() -> BTreeMap<String, String> {
    [
        ("py", "python"),
        ("sh", "shell"),
        ("sql", "sql"),
        ("ipynb", "notebook"),
        ("r", "rscript"),
    ]
    .into_iter()
    .map(|(ext, kind)| (ext.to_string(), kind.to_string()))
    .collect()
}

/// Resolves executors from explicit names or script extensions.
#[derive(Debug, Clone)]
pub struct ScriptExecutorResolver {
    extensions: BTreeMap<String, String>,
}

impl Default for ScriptExecutorResolver {
    fn default() -> Self {
        Self {
            extensions: default_executors(),
        }
    }
}

impl ScriptExecutorResolver {
    /// Creates a resolver with the default extension table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver with a custom extension table.
    #[must_use]
    pub fn with_extensions(extensions: BTreeMap<String, String>) -> Self {
        Self { extensions }
    }

    /// Maps an extension (without the dot) to an executor kind.
    #[must_use]
    pub fn with_extension(mut self, ext: impl Into<String>, kind: impl Into<String>) -> Self {
        self.extensions.insert(ext.into().to_ascii_lowercase(), kind.into());
        self
    }
}

impl ExecutorResolver for ScriptExecutorResolver {
    fn resolve_executor(
        &self,
        step: &Map<String, Value>,
        base_path: &Path,
        errors: &mut Vec<SpecError>,
    ) -> Option<ExecutorRef> {
        let step_name = step.get("name").and_then(Value::as_str).unwrap_or("?");

        if let Some(kind) = step.get("executor").and_then(Value::as_str) {
            return Some(ExecutorRef::named(kind));
        }

        let Some(script) = step.get("script").and_then(Value::as_str) else {
            errors.push(
                SpecError::validation(format!("step '{step_name}' declares neither an executor nor a script"))
                    .with_context("step", step_name),
            );
            return None;
        };

        let path = base_path.join(script);
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let Some(kind) = self.extensions.get(&ext) else {
            errors.push(
                SpecError::validation(format!("no executor registered for script '{script}' of step '{step_name}'"))
                    .with_context("step", step_name)
                    .with_context("script", script),
            );
            return None;
        };

        match std::fs::read(&path) {
            Ok(bytes) => Some(ExecutorRef {
                kind: kind.clone(),
                script: Some(script.to_string()),
                digest: Some(hex::encode(Sha256::digest(&bytes))),
            }),
            Err(e) => {
                errors.push(
                    SpecError::validation(format!("script '{script}' of step '{step_name}' cannot be read: {e}"))
                        .with_context("step", step_name)
                        .with_context("script", script),
                );
                None
            }
        }
    }
}

/// Resolves and records the executor of every step in the spec body.
///
/// Resolved steps get an `executor` field and, for scripts, a
/// `script_digest` field. Steps that fail to resolve are left untouched.
pub fn normalize_executors(spec: &mut PipelineSpec, resolver: &dyn ExecutorResolver) {
    let base = spec.base_dir().to_path_buf();
    let Some(Value::Array(steps)) = spec.body.as_mut().and_then(|body| body.get_mut("steps")) else {
        return;
    };

    let mut errors = Vec::new();
    for step in steps.iter_mut() {
        let Value::Object(step) = step else {
            continue;
        };
        if let Some(executor) = resolver.resolve_executor(step, &base, &mut errors) {
            step.insert("executor".to_string(), Value::String(executor.kind));
            if let Some(digest) = executor.digest {
                step.insert("script_digest".to_string(), Value::String(digest));
            }
        }
    }

    for error in errors {
        spec.push_error(error.with_context("pipeline", spec.pipeline_id.clone()));
    }
}
