//! End-to-end tests: discovery, resolution and registration over real files.

use super::ResolutionEngine;
use crate::core::{PipelineSpec, PipelineState};
use crate::driver::Driver;
use crate::errors::SpecErrorKind;
use crate::events::CollectingEventSink;
use crate::registry::{JsonFileStatusRegistry, StatusRegistry};
use crate::source::SpecSource;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(
        root,
        "a.pipeline.toml",
        r#"
depends_on = ["b.pipeline.toml:b"]

[[steps]]
name = "train"
script = "run.py"
"#,
    );
    write(
        root,
        "b.pipeline.toml",
        r#"
schedule = "@daily"

[[steps]]
name = "fetch"
executor = "shell"
"#,
    );
    write(root, "broken.pipeline.json", "{");
    write(root, "run.py", "print('training')\n");
    write(
        root,
        "nested/pipeline.toml",
        r#"
[pipelines.x]
depends_on = ["../b.pipeline.toml:b"]

[[pipelines.x.steps]]
name = "load"
executor = "sql"
"#,
    );
    write(
        root,
        ".hidden/skipped.pipeline.toml",
        r#"
[[steps]]
name = "never"
executor = "shell"
"#,
    );
    dir
}

fn resolve_and_register(root: &Path, registry: &Arc<JsonFileStatusRegistry>) -> Vec<PipelineSpec> {
    let source = SpecSource::new(root);
    let engine = ResolutionEngine::new(registry.clone());
    let driver = Driver::new(registry.clone());
    driver.register_all(engine.resolve(source.discover())).unwrap().specs
}

fn find<'a>(specs: &'a [PipelineSpec], id: &str) -> &'a PipelineSpec {
    specs.iter().find(|s| s.pipeline_id == id).unwrap()
}

#[test]
fn test_resolves_a_spec_tree() {
    let dir = workspace();
    let source = SpecSource::new(dir.path());
    let registry = Arc::new(JsonFileStatusRegistry::open(dir.path().join(".state/status.json")).unwrap());
    let engine = ResolutionEngine::new(registry);

    let mut resolution = engine.resolve(source.discover());
    let specs: Vec<_> = resolution.by_ref().collect();

    let order: Vec<_> = specs.iter().map(|s| s.pipeline_id.as_str()).collect();
    assert_eq!(
        order,
        vec![
            "b.pipeline.toml:b",
            "broken.pipeline.json:broken",
            "nested/pipeline.toml:x",
            "a.pipeline.toml:a",
        ]
    );
    assert_eq!(resolution.stats().passes, 2);

    let a = find(&specs, "a.pipeline.toml:a");
    assert!(a.is_valid());
    assert!(a.dirty);
    let step = &a.body.as_ref().unwrap()["steps"][0];
    assert_eq!(step["executor"], "python");
    assert_eq!(step["script_digest"].as_str().map(str::len), Some(64));

    let b = find(&specs, "b.pipeline.toml:b");
    assert!(b.schedule.is_some());
    assert_eq!(b.body.as_ref().unwrap()["schedule"]["minute"], "0");

    let broken = find(&specs, "broken.pipeline.json:broken");
    assert_eq!(broken.errors[0].kind, SpecErrorKind::ParseError);
    assert!(!broken.dirty);
}

#[test]
fn test_hashes_are_stable_across_runs() {
    let dir = workspace();
    let engine = ResolutionEngine::new(Arc::new(crate::registry::InMemoryStatusRegistry::new()));

    let first: Vec<_> = engine.resolve(SpecSource::new(dir.path()).discover()).collect();
    let second: Vec<_> = engine.resolve(SpecSource::new(dir.path()).discover()).collect();

    for spec in &first {
        assert_eq!(spec.cache_hash(), find(&second, &spec.pipeline_id).cache_hash());
    }
}

#[test]
fn test_second_run_after_success_is_clean() {
    let dir = workspace();
    let registry = Arc::new(JsonFileStatusRegistry::open(dir.path().join(".state/status.json")).unwrap());

    for spec in resolve_and_register(dir.path(), &registry) {
        registry.record_state(&spec.pipeline_id, PipelineState::Succeeded).unwrap();
    }

    let reopened = Arc::new(JsonFileStatusRegistry::open(registry.path()).unwrap());
    let specs = resolve_and_register(dir.path(), &reopened);
    assert!(specs.iter().all(|s| !s.dirty));
}

#[test]
fn test_script_edit_dirties_only_its_pipeline() {
    let dir = workspace();
    let registry = Arc::new(JsonFileStatusRegistry::open(dir.path().join(".state/status.json")).unwrap());

    for spec in resolve_and_register(dir.path(), &registry) {
        registry.record_state(&spec.pipeline_id, PipelineState::Succeeded).unwrap();
    }
    write(dir.path(), "run.py", "print('training v2')\n");

    let specs = resolve_and_register(dir.path(), &registry);
    let dirty: Vec<_> = specs.iter().filter(|s| s.dirty).map(|s| s.pipeline_id.as_str()).collect();
    assert_eq!(dirty, vec!["a.pipeline.toml:a"]);
    assert_eq!(
        registry.get_status("a.pipeline.toml:a").unwrap().unwrap().state,
        PipelineState::Pending
    );
}

#[test]
fn test_upstream_edit_dirties_dependents() {
    let dir = workspace();
    let registry = Arc::new(JsonFileStatusRegistry::open(dir.path().join(".state/status.json")).unwrap());

    for spec in resolve_and_register(dir.path(), &registry) {
        registry.record_state(&spec.pipeline_id, PipelineState::Succeeded).unwrap();
    }
    write(
        dir.path(),
        "b.pipeline.toml",
        r#"
schedule = "@hourly"

[[steps]]
name = "fetch"
executor = "shell"
"#,
    );

    let specs = resolve_and_register(dir.path(), &registry);
    let mut dirty: Vec<_> = specs.iter().filter(|s| s.dirty).map(|s| s.pipeline_id.as_str()).collect();
    dirty.sort_unstable();
    assert_eq!(
        dirty,
        vec!["a.pipeline.toml:a", "b.pipeline.toml:b", "nested/pipeline.toml:x"]
    );
}

#[test]
fn test_cross_file_cycle() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "left.pipeline.toml",
        r#"
depends_on = ["right.pipeline.toml:right"]

[[steps]]
name = "l"
executor = "shell"
"#,
    );
    write(
        dir.path(),
        "right.pipeline.toml",
        r#"
depends_on = ["left.pipeline.toml:left"]

[[steps]]
name = "r"
executor = "shell"
"#,
    );

    let sink = Arc::new(CollectingEventSink::new());
    let engine = ResolutionEngine::new(Arc::new(crate::registry::InMemoryStatusRegistry::new()))
        .with_event_sink(sink.clone());
    let source = SpecSource::new(dir.path());
    let mut resolution = engine.resolve(source.discover());
    let specs: Vec<_> = resolution.by_ref().collect();

    assert_eq!(specs.len(), 2);
    assert!(specs
        .iter()
        .all(|s| s.errors.iter().any(|e| e.kind == SpecErrorKind::MissingDependencyError)));
    assert_eq!(resolution.stats().passes, 1);
    assert_eq!(sink.events_of_type("spec.unresolvable").len(), 2);
}

#[test]
fn test_invalid_spec_is_recorded_as_invalid() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "bad.pipeline.json",
        r#"{"steps": [{"name": "x", "script": "missing.sh"}], "retries": 3}"#,
    );
    let registry = Arc::new(JsonFileStatusRegistry::open(dir.path().join("status.json")).unwrap());

    let specs = resolve_and_register(dir.path(), &registry);
    let bad = &specs[0];
    assert!(bad
        .errors
        .iter()
        .all(|e| e.kind == SpecErrorKind::ValidationError));
    assert!(!bad.dirty);

    let record = registry.get_status(&bad.pipeline_id).unwrap().unwrap();
    assert_eq!(record.state, PipelineState::Invalid);
    assert_eq!(record.errors.len(), bad.errors.len());
}
