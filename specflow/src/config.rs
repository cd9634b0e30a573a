//! Resolver configuration.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration for a [`Resolver`](crate::resolver::Resolver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Directory searched for pipeline files.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Files and directories whose name starts with this prefix are skipped.
    #[serde(default = "default_hidden_prefix")]
    pub hidden_prefix: String,
    /// Status registry file. Without one, status lives in memory only.
    #[serde(default)]
    pub registry_path: Option<PathBuf>,
    /// Extra script extensions mapped to executor kinds, on top of the defaults.
    #[serde(default)]
    pub executors: BTreeMap<String, String>,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_hidden_prefix() -> String {
    ".".to_string()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            hidden_prefix: default_hidden_prefix(),
            registry_path: None,
            executors: BTreeMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the discovery root.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Sets the hidden prefix.
    #[must_use]
    pub fn with_hidden_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.hidden_prefix = prefix.into();
        self
    }

    /// Sets the status registry file.
    #[must_use]
    pub fn with_registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = Some(path.into());
        self
    }

    /// Maps a script extension to an executor kind.
    #[must_use]
    pub fn with_executor(mut self, ext: impl Into<String>, kind: impl Into<String>) -> Self {
        self.executors.insert(ext.into(), kind.into());
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Loads a configuration file, TOML or JSON by extension.
    ///
    /// Relative `root` and `registry_path` values are taken relative to the
    /// directory holding the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unknown
    /// extension, or does not decode.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        let mut config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.root = base.join(&config.root);
        config.registry_path = config.registry_path.map(|p| base.join(p));

        tracing::debug!(path = %path.display(), root = %config.root.display(), "loaded resolver config");
        Ok(config)
    }
}

/// Configuration of the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "specflow=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Sets the filter directives.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Enables or disables JSON output.
    #[must_use]
    pub const fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.root, PathBuf::from("."));
        assert_eq!(config.hidden_prefix, ".");
        assert!(config.registry_path.is_none());
        assert_eq!(config.logging.filter, "specflow=info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_builder() {
        let config = ResolverConfig::new()
            .with_root("/pipelines")
            .with_registry_path("/var/lib/specflow/status.json")
            .with_executor("jl", "julia")
            .with_logging(LoggingConfig::default().with_json(true));

        assert_eq!(config.root, PathBuf::from("/pipelines"));
        assert_eq!(config.executors["jl"], "julia");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_toml_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specflow.toml");
        std::fs::write(
            &path,
            r#"
root = "pipelines"
registry_path = ".specflow/status.json"

[executors]
jl = "julia"

[logging]
json = true
"#,
        )
        .unwrap();

        let config = ResolverConfig::load(&path).unwrap();
        assert_eq!(config.root, dir.path().join("pipelines"));
        assert_eq!(config.registry_path, Some(dir.path().join(".specflow/status.json")));
        assert_eq!(config.executors["jl"], "julia");
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "specflow=info");
        assert_eq!(config.hidden_prefix, ".");
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specflow.json");
        std::fs::write(&path, r#"{"root": "/abs", "hidden_prefix": "_"}"#).unwrap();

        let config = ResolverConfig::load(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("/abs"));
        assert_eq!(config.hidden_prefix, "_");
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = ResolverConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));

        let yaml = dir.path().join("specflow.yaml");
        std::fs::write(&yaml, "root: x").unwrap();
        assert!(matches!(
            ResolverConfig::load(&yaml).unwrap_err(),
            ConfigError::UnsupportedFormat(_)
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "root = ").unwrap();
        assert!(matches!(ResolverConfig::load(&bad).unwrap_err(), ConfigError::Parse { .. }));
    }
}
