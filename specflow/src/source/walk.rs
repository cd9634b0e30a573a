//! Lazy recursive directory walk.

use std::collections::VecDeque;
use std::fs::FileType;
use std::path::{Path, PathBuf};

/// Depth-first walk over the files below a root directory.
///
/// Entries of each directory are visited in name order, files before
/// subdirectories. Names starting with the hidden prefix are pruned along
/// with everything below them. Symlinks to directories are not followed;
/// symlinks to files are yielded like files.
#[derive(Debug)]
pub struct SpecWalk {
    hidden_prefix: String,
    dirs: Vec<PathBuf>,
    files: VecDeque<PathBuf>,
}

impl SpecWalk {
    /// Starts a walk at `root`.
    #[must_use]
    pub fn new(root: &Path, hidden_prefix: impl Into<String>) -> Self {
        Self {
            hidden_prefix: hidden_prefix.into(),
            dirs: vec![root.to_path_buf()],
            files: VecDeque::new(),
        }
    }

    fn is_hidden(&self, path: &Path) -> bool {
        !self.hidden_prefix.is_empty()
            && path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(&self.hidden_prefix))
    }

    fn expand(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "skipping unreadable directory");
                return;
            }
        };

        let mut entries: Vec<(PathBuf, FileType)> = entries
            .flatten()
            .filter_map(|entry| entry.file_type().ok().map(|ft| (entry.path(), ft)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut subdirs = Vec::new();
        for (path, file_type) in entries {
            if self.is_hidden(&path) {
                continue;
            }
            if file_type.is_dir() {
                subdirs.push(path);
            } else if file_type.is_symlink() && path.is_dir() {
                tracing::debug!(path = %path.display(), "not following directory symlink");
            } else {
                self.files.push_back(path);
            }
        }
        self.dirs.extend(subdirs.into_iter().rev());
    }
}

impl Iterator for SpecWalk {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(file) = self.files.pop_front() {
                return Some(file);
            }
            let dir = self.dirs.pop()?;
            self.expand(&dir);
        }
    }
}
