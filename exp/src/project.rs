//! Project root detection and fork collection layout.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::context::{detect_context, origin_project, Context};

/// Files or directories whose presence marks a project root.
pub const ROOT_MARKERS: &[&str] = &[
    ".git",
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "go.mod",
    ".exp-root",
];

/// Find the project root by walking up from `start`.
///
/// The filesystem root is never treated as a project. Falls back to
/// `start` when no marker is found.
pub fn find_root(start: &Path) -> PathBuf {
    let mut current = start;
    while let Some(parent) = current.parent() {
        if ROOT_MARKERS.iter().any(|m| current.join(m).exists()) {
            return current.to_path_buf();
        }
        current = parent;
    }
    start.to_path_buf()
}

/// Short name of a project: its final path segment.
pub fn project_name(root: &Path) -> String {
    root.file_name()
        .map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Directory holding a project's forks.
///
/// `{config.root}/{name}` when a custom root is set, otherwise the hidden
/// sibling `.exp-{name}`.
pub fn collection_dir(root: &Path, config: &Config) -> PathBuf {
    let name = project_name(root);
    match &config.root {
        Some(custom) => custom.join(name),
        None => root
            .parent()
            .unwrap_or(root)
            .join(format!(".exp-{name}")),
    }
}

/// Create the collection directory if needed and return it.
pub fn ensure_collection(root: &Path, config: &Config) -> std::io::Result<PathBuf> {
    let dir = collection_dir(root, config);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Where a command runs: the project it belongs to and that project's
/// collection, resolved once per invocation.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory the command was started from.
    pub cwd: PathBuf,
    /// Fork the command runs inside, if any.
    pub context: Context,
    /// Root of the original project, even when run from inside a fork.
    pub root: PathBuf,
    /// Project name.
    pub name: String,
    /// The project's fork collection (may not exist yet).
    pub collection: PathBuf,
}

impl Workspace {
    /// Resolve the workspace for `cwd`.
    pub fn locate(cwd: &Path, config: &Config) -> Self {
        let context = detect_context(cwd);
        let root = match context.fork() {
            Some(fork) => origin_project(fork),
            None => find_root(cwd),
        };
        let name = project_name(&root);
        let collection = collection_dir(&root, config);
        Self {
            cwd: cwd.to_path_buf(),
            context,
            root,
            name,
            collection,
        }
    }
}
