//! Error types for specflow.
//!
//! Two families live here. [`SpecError`] is data: it is attached to the
//! [`PipelineSpec`](crate::core::PipelineSpec) it concerns and never aborts a
//! resolution run. [`SpecflowError`] and friends are ordinary Rust errors for
//! the collaborators around the engine (configuration, registry storage).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for specflow operations.
#[derive(Debug, Error)]
pub enum SpecflowError {
    /// A configuration error occurred.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The status registry failed.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading a [`ResolverConfig`](crate::config::ResolverConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// The config path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file could not be parsed.
    #[error("invalid config {path}: {message}")]
    Parse {
        /// The config path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The config file extension is not one we know how to parse.
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Errors raised by a [`StatusRegistry`](crate::registry::StatusRegistry) backend.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Backing storage could not be read or written.
    #[error("registry IO error at {path}: {source}")]
    Io {
        /// The storage path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Stored data could not be encoded or decoded.
    #[error("registry serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// The category of a [`SpecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecErrorKind {
    /// The source file could not be read or parsed.
    ParseError,
    /// The parsed body violates the schema, or normalization failed.
    ValidationError,
    /// A dependency never resolved (missing or cyclic).
    MissingDependencyError,
}

impl fmt::Display for SpecErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseError => write!(f, "parse_error"),
            Self::ValidationError => write!(f, "validation_error"),
            Self::MissingDependencyError => write!(f, "missing_dependency_error"),
        }
    }
}

/// An error local to a single pipeline spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecError {
    /// The error category.
    pub kind: SpecErrorKind,
    /// Human readable message.
    pub message: String,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl SpecError {
    /// Creates a new spec error.
    #[must_use]
    pub fn new(kind: SpecErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(SpecErrorKind::ParseError, message)
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(SpecErrorKind::ValidationError, message)
    }

    /// Creates a missing dependency error for `missing`.
    #[must_use]
    pub fn missing_dependency(missing: impl Into<String>) -> Self {
        let missing = missing.into();
        Self::new(
            SpecErrorKind::MissingDependencyError,
            format!("dependency '{missing}' could not be resolved (missing or cyclic)"),
        )
        .with_context("dependency", missing)
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a JSON representation.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind.to_string()));
        map.insert("message".to_string(), serde_json::json!(self.message));
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_error_creation() {
        let err = SpecError::validation("steps must not be empty").with_context("field", "steps");

        assert_eq!(err.kind, SpecErrorKind::ValidationError);
        assert_eq!(err.message, "steps must not be empty");
        assert_eq!(err.context.get("field"), Some(&"steps".to_string()));
    }

    #[test]
    fn test_missing_dependency_context() {
        let err = SpecError::missing_dependency("raw.pipeline.toml:fetch");

        assert_eq!(err.kind, SpecErrorKind::MissingDependencyError);
        assert!(err.message.contains("raw.pipeline.toml:fetch"));
        assert_eq!(
            err.context.get("dependency").map(String::as_str),
            Some("raw.pipeline.toml:fetch")
        );
    }

    #[test]
    fn test_spec_error_to_json() {
        let json = SpecError::parse("unexpected token").to_json();

        assert_eq!(json["kind"], "parse_error");
        assert_eq!(json["message"], "unexpected token");
        assert!(json.get("context").is_none());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let value = serde_json::to_value(SpecErrorKind::MissingDependencyError).unwrap();
        assert_eq!(value, "missing_dependency_error");
    }

    #[test]
    fn test_display() {
        let err = SpecError::parse("bad");
        assert_eq!(err.to_string(), "parse_error: bad");
    }

    #[test]
    fn test_registry_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: RegistryError = serde_err.into();
        assert!(matches!(err, RegistryError::Serialization(_)));
    }
}
