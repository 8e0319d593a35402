//! Repository-relative path resolution
//!
//! The version-control tools run from the repository root and want paths
//! relative to it, while callers may hold absolute paths. Both forms are
//! resolved here so the two tool wrappers agree on the convention.

use std::path::{Path, PathBuf};

/// Resolve a file path against the repository root
///
/// Returns `(absolute, relative)`. An absolute path outside the root is kept
/// as-is for the relative form; the tools will reject it if they cannot
/// handle it.
pub fn resolve(repo_root: &Path, path: &Path) -> (PathBuf, PathBuf) {
    if path.is_absolute() {
        let relative = path
            .strip_prefix(repo_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf());
        (path.to_path_buf(), relative)
    } else {
        (repo_root.join(path), path.to_path_buf())
    }
}
