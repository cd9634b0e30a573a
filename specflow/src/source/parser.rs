//! Spec parser trait and the document expansion shared by all formats.

use crate::core::{pipeline_id, PipelineId, PipelineSpec, SourceDetails};
use crate::errors::SpecError;
use crate::utils::normalize_lexically;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A discovered file, located relative to the discovery root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Path relative to the discovery root, `/`-separated.
    pub relative: String,
}

impl SourceFile {
    /// Creates a new source file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, relative: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            relative: relative.into(),
        }
    }

    /// Pipeline name used when the document does not declare one.
    ///
    /// `ingest.pipeline.toml` yields `ingest`; a bare `pipeline.toml` takes
    /// the name of its directory.
    #[must_use]
    pub fn default_name(&self) -> String {
        let file_name = Path::new(&self.relative)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(idx) = file_name.find(".pipeline.") {
            if idx > 0 {
                return file_name[..idx].to_string();
            }
        }
        if file_name.starts_with("pipeline.") {
            if let Some(dir) = self.path.parent().and_then(Path::file_name) {
                return dir.to_string_lossy().into_owned();
            }
        }
        Path::new(&file_name)
            .file_stem()
            .map_or_else(|| file_name.clone(), |s| s.to_string_lossy().into_owned())
    }
}

/// A parser for one declarative file type.
pub trait SpecParser: fmt::Debug + Send + Sync {
    /// Short parser name, recorded in [`SourceDetails::parser`].
    fn name(&self) -> &str;

    /// Returns true if this parser handles files named `file_name`.
    fn check_filename(&self, file_name: &str) -> bool;

    /// Parses raw file content into a JSON value tree.
    ///
    /// # Errors
    ///
    /// Returns the parser's message for malformed content.
    fn parse(&self, content: &str) -> Result<Value, String>;

    /// Expands a parsed document into the specs it declares.
    fn to_pipelines(&self, document: Value, source: &SourceFile) -> Vec<PipelineSpec> {
        expand_document(self.name(), document, source)
    }

    /// Reads, parses and expands `source`.
    ///
    /// Never fails: unreadable or malformed files yield a single spec
    /// carrying a parse error.
    fn load(&self, source: &SourceFile) -> Vec<PipelineSpec> {
        let content = match std::fs::read_to_string(&source.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %source.path.display(), error = %e, "unreadable pipeline spec");
                return vec![failed_spec(self.name(), source, SpecError::parse(format!("failed to read file: {e}")))];
            }
        };
        match self.parse(&content) {
            Ok(document) => self.to_pipelines(document, source),
            Err(message) => {
                tracing::warn!(path = %source.path.display(), error = %message, "invalid pipeline spec");
                vec![failed_spec(self.name(), source, SpecError::parse(message))]
            }
        }
    }
}

fn failed_spec(parser: &str, source: &SourceFile, error: SpecError) -> PipelineSpec {
    failed_named(parser, source, &source.default_name(), None, error)
}

fn failed_named(
    parser: &str,
    source: &SourceFile,
    name: &str,
    expansion: Option<String>,
    error: SpecError,
) -> PipelineSpec {
    let mut details = SourceDetails::new(parser, &source.relative);
    details.expansion = expansion;
    PipelineSpec::failed(
        pipeline_id(&source.relative, name),
        name,
        &source.path,
        details,
        error.with_context("source", &source.relative),
    )
}

/// Expands a document into specs.
///
/// A document is either one pipeline body or a `pipelines` table of named
/// bodies. Any body may carry a `matrix` table, which fans it out into one
/// spec per combination of values.
///
/// Two declarations resolving to the same pipeline id (for instance matrix
/// values `"1"` and `1`) reject the whole file with a parse error.
#[must_use]
pub fn expand_document(parser: &str, document: Value, source: &SourceFile) -> Vec<PipelineSpec> {
    let specs = expand_declarations(parser, document, source);

    let mut seen = HashSet::new();
    if let Some(duplicate) = specs.iter().find(|spec| !seen.insert(spec.pipeline_id.as_str())) {
        let error = SpecError::parse(format!("pipeline id '{}' is declared more than once", duplicate.pipeline_id))
            .with_context("pipeline", duplicate.pipeline_id.clone());
        return vec![failed_spec(parser, source, error)];
    }
    specs
}

fn expand_declarations(parser: &str, document: Value, source: &SourceFile) -> Vec<PipelineSpec> {
    let Value::Object(mut root) = document else {
        return vec![failed_spec(parser, source, SpecError::parse("document must be a table"))];
    };

    let Some(pipelines) = root.remove("pipelines") else {
        let name = root
            .get("name")
            .and_then(Value::as_str)
            .map_or_else(|| source.default_name(), str::to_string);
        return expand_body(parser, source, &name, root, None);
    };

    if !root.is_empty() {
        return vec![failed_spec(
            parser,
            source,
            SpecError::parse("'pipelines' cannot be mixed with other top-level keys"),
        )];
    }
    let Value::Object(pipelines) = pipelines else {
        return vec![failed_spec(parser, source, SpecError::parse("'pipelines' must be a table"))];
    };

    let mut specs = Vec::new();
    for (name, body) in pipelines {
        let expansion = format!("pipelines.{name}");
        match body {
            Value::Object(body) => {
                specs.extend(expand_body(parser, source, &name, body, Some(expansion)));
            }
            _ => specs.push(failed_named(
                parser,
                source,
                &name,
                Some(expansion),
                SpecError::parse(format!("pipeline '{name}' must be a table")),
            )),
        }
    }
    specs
}

fn expand_body(
    parser: &str,
    source: &SourceFile,
    name: &str,
    mut body: Map<String, Value>,
    expansion: Option<String>,
) -> Vec<PipelineSpec> {
    let Some(matrix) = body.remove("matrix") else {
        let details = SourceDetails {
            expansion,
            ..SourceDetails::new(parser, &source.relative)
        };
        return vec![build_spec(source, name, Value::Object(body), details)];
    };

    let combinations = match matrix_combinations(&matrix) {
        Ok(combinations) => combinations,
        Err(message) => {
            return vec![failed_named(parser, source, name, expansion, SpecError::parse(message))];
        }
    };

    combinations
        .into_iter()
        .map(|combination| {
            let label = combination
                .iter()
                .map(|(k, v)| format!("{k}={}", render_value(v)))
                .collect::<Vec<_>>()
                .join(",");
            let spec_name = format!("{name}[{label}]");

            let mut body = body.clone();
            let mut parameters = match body.remove("parameters") {
                Some(Value::Object(existing)) => existing,
                _ => Map::new(),
            };
            let mut details = SourceDetails::new(parser, &source.relative).with_expansion(match &expansion {
                Some(prefix) => format!("{prefix}.matrix[{label}]"),
                None => format!("matrix[{label}]"),
            });
            for (key, value) in combination {
                parameters.insert(key.clone(), value.clone());
                details = details.with_parameter(key, value);
            }
            body.insert("parameters".to_string(), Value::Object(parameters));

            build_spec(source, &spec_name, Value::Object(body), details)
        })
        .collect()
}

fn build_spec(source: &SourceFile, name: &str, body: Value, details: SourceDetails) -> PipelineSpec {
    match dependency_ids(&body, source) {
        Ok(deps) => PipelineSpec::new(pipeline_id(&source.relative, name), name, &source.path, details, body)
            .with_dependencies(deps),
        Err(error) => PipelineSpec::failed(
            pipeline_id(&source.relative, name),
            name,
            &source.path,
            details,
            error.with_context("source", &source.relative),
        ),
    }
}

/// Cartesian product of a `matrix` table, keys in sorted order.
fn matrix_combinations(matrix: &Value) -> Result<Vec<Vec<(String, Value)>>, String> {
    let Value::Object(axes) = matrix else {
        return Err("'matrix' must be a table of value lists".to_string());
    };
    if axes.is_empty() {
        return Err("'matrix' must declare at least one axis".to_string());
    }

    let mut combinations: Vec<Vec<(String, Value)>> = vec![Vec::new()];
    for (key, values) in axes {
        let values = match values {
            Value::Array(values) if !values.is_empty() => values,
            _ => return Err(format!("matrix axis '{key}' must be a non-empty list")),
        };
        combinations = combinations
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |value| {
                    let mut next = prefix.clone();
                    next.push((key.clone(), value.clone()));
                    next
                })
            })
            .collect();
    }
    Ok(combinations)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolves the `depends_on` references of a body into pipeline ids.
///
/// `name` refers to a pipeline in the same file; `path:name` refers to a
/// pipeline in another file, relative to this file's directory. Entries
/// that are not strings are left for the validator to report.
fn dependency_ids(body: &Value, source: &SourceFile) -> Result<Vec<PipelineId>, SpecError> {
    let Some(Value::Array(refs)) = body.get("depends_on") else {
        return Ok(Vec::new());
    };

    let mut ids = Vec::new();
    for reference in refs.iter().filter_map(Value::as_str) {
        let (path, name) = reference.rsplit_once(':').unwrap_or(("", reference));
        if name.is_empty() {
            return Err(SpecError::parse(format!("malformed dependency reference '{reference}'"))
                .with_context("dependency", reference));
        }

        if Path::new(path)
            .components()
            .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
        {
            return Err(SpecError::parse(format!("dependency '{reference}' must be relative to its file"))
                .with_context("dependency", reference));
        }

        let id = if path.is_empty() {
            pipeline_id(&source.relative, name)
        } else {
            let base = Path::new(&source.relative).parent().unwrap_or_else(|| Path::new(""));
            let target = normalize_lexically(&base.join(path)).ok_or_else(|| {
                SpecError::parse(format!("dependency '{reference}' points outside the spec root"))
                    .with_context("dependency", reference)
            })?;
            let target: Vec<String> = target
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            pipeline_id(&target.join("/"), name)
        };
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}
