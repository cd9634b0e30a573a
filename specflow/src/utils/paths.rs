//! Lexical path helpers.
//!
//! Dependency references may point at files that do not exist (yet), so
//! these helpers never touch the filesystem.

use std::path::{Component, Path, PathBuf};

/// Normalizes `.` and `..` components without consulting the filesystem.
///
/// Returns `None` if a `..` would climb above the start of the path.
#[must_use]
pub fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                out.push(component.as_os_str());
            }
        }
    }
    Some(out)
}

/// Renders `path` relative to `root` with `/` separators.
///
/// Returns `None` if `path` is not inside `root`.
#[must_use]
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
