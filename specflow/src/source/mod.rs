//! Pipeline spec discovery.
//!
//! A [`SpecSource`] walks a directory tree and hands every file recognized
//! by one of its [`SpecParser`]s to that parser. Each file expands into one
//! or more [`PipelineSpec`]s; files that cannot be read or parsed still
//! yield a spec, carrying a parse error instead of a body.

mod json_parser;
mod parser;
mod toml_parser;
mod walk;

pub use json_parser::JsonSpecParser;
pub use parser::{expand_document, SourceFile, SpecParser};
pub use toml_parser::TomlSpecParser;
pub use walk::SpecWalk;

use crate::core::PipelineSpec;
use crate::utils::relative_slash_path;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Discovers pipeline specs below a root directory.
#[derive(Debug)]
pub struct SpecSource {
    root: PathBuf,
    hidden_prefix: String,
    parsers: Vec<Box<dyn SpecParser>>,
}

impl SpecSource {
    /// Creates a source for `root` with the JSON and TOML parsers registered.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::empty(root)
            .with_parser(JsonSpecParser)
            .with_parser(TomlSpecParser)
    }

    /// Creates a source for `root` with no parsers registered.
    #[must_use]
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            root,
            hidden_prefix: ".".to_string(),
            parsers: Vec::new(),
        }
    }

    /// Registers a parser. Earlier parsers win when several match a file.
    #[must_use]
    pub fn with_parser(mut self, parser: impl SpecParser + 'static) -> Self {
        self.parsers.push(Box::new(parser));
        self
    }

    /// Sets the prefix marking hidden files and directories.
    #[must_use]
    pub fn with_hidden_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.hidden_prefix = prefix.into();
        self
    }

    /// Returns the discovery root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the parser registered for `file_name`, if any.
    #[must_use]
    pub fn parser_for(&self, file_name: &str) -> Option<&dyn SpecParser> {
        self.parsers
            .iter()
            .find(|parser| parser.check_filename(file_name))
            .map(|parser| &**parser)
    }

    /// Starts discovery. The returned sequence is lazy and one-shot.
    #[must_use]
    pub fn discover(&self) -> Discover<'_> {
        tracing::debug!(root = %self.root.display(), parsers = self.parsers.len(), "discovering pipeline specs");
        Discover {
            source: self,
            walk: SpecWalk::new(&self.root, self.hidden_prefix.clone()),
            pending: VecDeque::new(),
        }
    }
}

/// Lazy sequence of discovered specs, in directory traversal order.
#[derive(Debug)]
pub struct Discover<'a> {
    source: &'a SpecSource,
    walk: SpecWalk,
    pending: VecDeque<PipelineSpec>,
}

impl Iterator for Discover<'_> {
    type Item = PipelineSpec;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(spec) = self.pending.pop_front() {
                return Some(spec);
            }

            let path = self.walk.next()?;
            let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let Some(parser) = self.source.parser_for(&file_name) else {
                continue;
            };
            let Some(relative) = relative_slash_path(&self.source.root, &path) else {
                continue;
            };

            let specs = parser.load(&SourceFile::new(&path, relative));
            tracing::debug!(path = %path.display(), parser = parser.name(), count = specs.len(), "loaded pipeline file");
            self.pending.extend(specs);
        }
    }
}
