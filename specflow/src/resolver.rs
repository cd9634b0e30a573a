//! One-call resolution: discover, resolve and register.

use crate::config::ResolverConfig;
use crate::driver::{Driver, DriverReport};
use crate::errors::SpecflowError;
use crate::events::{EventSink, LoggingEventSink};
use crate::executors::ScriptExecutorResolver;
use crate::registry::{InMemoryStatusRegistry, JsonFileStatusRegistry, StatusRegistry};
use crate::resolve::{Resolution, ResolutionEngine};
use crate::source::{Discover, SpecSource};
use std::sync::Arc;
use tracing::info;

/// Wires a [`SpecSource`], a [`ResolutionEngine`] and a [`Driver`] around
/// one status registry.
#[derive(Debug)]
pub struct Resolver {
    source: SpecSource,
    engine: ResolutionEngine,
    driver: Driver,
}

impl Resolver {
    /// Builds a resolver from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured registry file cannot be opened.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, SpecflowError> {
        let registry: Arc<dyn StatusRegistry> = match &config.registry_path {
            Some(path) => Arc::new(JsonFileStatusRegistry::open(path)?),
            None => Arc::new(InMemoryStatusRegistry::new()),
        };

        let executors = config
            .executors
            .iter()
            .fold(ScriptExecutorResolver::new(), |resolver, (ext, kind)| {
                resolver.with_extension(ext, kind)
            });

        let source = SpecSource::new(&config.root).with_hidden_prefix(&config.hidden_prefix);
        let engine = ResolutionEngine::new(Arc::clone(&registry))
            .with_executor_resolver(executors)
            .with_event_sink(Arc::new(LoggingEventSink::debug()));

        Ok(Self {
            source,
            engine,
            driver: Driver::new(registry),
        })
    }

    /// Replaces the event sink of the engine.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.engine = self.engine.with_event_sink(sink);
        self
    }

    /// Returns the status registry shared by the engine and the driver.
    #[must_use]
    pub fn registry(&self) -> &Arc<dyn StatusRegistry> {
        self.engine.registry()
    }

    /// Discovers and resolves specs without registering them.
    ///
    /// Newly failed specs still reach the registry as the engine reports them.
    #[must_use]
    pub fn resolve(&self) -> Resolution<'_, Discover<'_>> {
        self.engine.resolve(self.source.discover())
    }

    /// Discovers, resolves and registers every spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry rejects a write.
    pub fn run(&self) -> Result<DriverReport, SpecflowError> {
        info!(root = %self.source.root().display(), "resolving pipeline specs");
        let report = self.driver.register_all(self.resolve())?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineState;
    use crate::events::CollectingEventSink;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("pipelines");
        fs::create_dir_all(&root).unwrap();
        fs::write(
            root.join("report.pipeline.toml"),
            r#"
depends_on = ["ingest"]
name = "report"

[[steps]]
name = "render"
script = "render.jl"
"#,
        )
        .unwrap();
        fs::write(root.join("render.jl"), "println(1)").unwrap();
        fs::write(
            root.join("ingest.pipeline.json"),
            r#"{"pipelines": {"ingest": {"steps": [{"name": "pull", "executor": "shell"}]}}}"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_run_with_file_registry() {
        let dir = project();
        let config = ResolverConfig::new()
            .with_root(dir.path().join("pipelines"))
            .with_registry_path(dir.path().join("state/status.json"))
            .with_executor("jl", "julia");

        let resolver = Resolver::from_config(&config).unwrap();
        let report = resolver.run().unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.dirty, 1);
        assert_eq!(report.dirty_ids, vec!["ingest.pipeline.json:ingest".to_string()]);
        assert!(dir.path().join("state/status.json").exists());
    }

    #[test]
    fn test_extension_table_from_config() {
        let dir = project();
        fs::write(
            dir.path().join("pipelines/ingest.pipeline.json"),
            r#"{"pipelines": {"ingest": {"steps": [{"name": "pull", "executor": "shell"}]}}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("pipelines/report.pipeline.toml"),
            r#"
depends_on = ["ingest.pipeline.json:ingest"]

[[steps]]
name = "render"
script = "render.jl"
"#,
        )
        .unwrap();

        let config = ResolverConfig::new()
            .with_root(dir.path().join("pipelines"))
            .with_executor("jl", "julia");
        let resolver = Resolver::from_config(&config).unwrap();

        let first = resolver.run().unwrap();
        assert_eq!(first.failed, 0);
        assert_eq!(first.dirty, 2);
        let report = first.specs.iter().find(|s| s.name == "report").unwrap();
        assert_eq!(report.body.as_ref().unwrap()["steps"][0]["executor"], "julia");

        for id in &first.dirty_ids {
            resolver.registry().record_state(id, PipelineState::Succeeded).unwrap();
        }
        let second = resolver.run().unwrap();
        assert!(second.is_clean());
    }

    #[test]
    fn test_custom_event_sink() {
        let dir = project();
        let sink = Arc::new(CollectingEventSink::new());
        let resolver = Resolver::from_config(&ResolverConfig::new().with_root(dir.path()))
            .unwrap()
            .with_event_sink(sink.clone());

        let specs: Vec<_> = resolver.resolve().collect();
        assert_eq!(specs.len(), 2);
        assert_eq!(sink.events_of_type("resolution.").len(), 2);
    }
}
