//! Fork context detection from a working directory.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::store;

/// Upper bound on ancestor steps, far beyond any real directory depth.
const MAX_WALK: usize = 4096;

/// Identity of the fork a directory lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkContext {
    /// Fork root (the directory holding the sidecar).
    pub fork_dir: PathBuf,
    /// Fork name from metadata.
    pub name: String,
    /// Path the fork was cloned from.
    pub origin: PathBuf,
    /// Free-text reason for the fork.
    pub description: String,
    /// Sequence number.
    pub number: u64,
}

/// Where a command is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Context {
    /// Inside a fork.
    Fork(ForkContext),
    /// Not inside any fork.
    Project,
}

impl Context {
    /// Fork details, if inside one.
    pub const fn fork(&self) -> Option<&ForkContext> {
        match self {
            Self::Fork(ctx) => Some(ctx),
            Self::Project => None,
        }
    }

    /// Whether the walk found a fork.
    pub const fn is_fork(&self) -> bool {
        matches!(self, Self::Fork(_))
    }
}

/// Detect whether `start` is inside a fork.
///
/// Walks up from `start` looking for a `.exp` sidecar. The first sidecar
/// found decides the outcome: valid metadata gives a fork context, a
/// malformed one stops the walk and reports "not a fork".
pub fn detect_context(start: &Path) -> Context {
    let mut current = start;

    for _ in 0..MAX_WALK {
        if store::sidecar_path(current).exists() {
            return match store::load(current) {
                Ok(Some(meta)) => {
                    tracing::debug!(fork = %meta.name, dir = %current.display(), "inside fork");
                    Context::Fork(ForkContext {
                        fork_dir: current.to_path_buf(),
                        name: meta.name,
                        origin: meta.source,
                        description: meta.description,
                        number: meta.number,
                    })
                }
                Ok(None) => Context::Project,
                Err(e) => {
                    tracing::debug!(dir = %current.display(), error = %e, "malformed sidecar, not a fork");
                    Context::Project
                }
            };
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    Context::Project
}

/// The project a fork ultimately descends from.
///
/// Follows `source` through forks-of-forks until it reaches a directory
/// that is not itself a fork.
pub fn origin_project(ctx: &ForkContext) -> PathBuf {
    let mut origin = ctx.origin.clone();
    for _ in 0..MAX_WALK {
        match store::load(&origin) {
            Ok(Some(meta)) if meta.source != origin => origin = meta.source,
            _ => break,
        }
    }
    origin
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ForkMetadata;
    use tempfile::tempdir;

    fn sample(source: &str) -> ForkMetadata {
        ForkMetadata::new("001-try-redis", "try redis caching", source, 1)
    }

    #[test]
    fn test_detects_fork_at_root() {
        let dir = tempdir().unwrap();
        store::write(dir.path(), &sample("/work/app")).unwrap();

        let ctx = detect_context(dir.path());
        let fork = ctx.fork().unwrap();
        assert_eq!(fork.fork_dir, dir.path());
        assert_eq!(fork.name, "001-try-redis");
        assert_eq!(fork.origin, PathBuf::from("/work/app"));
        assert_eq!(fork.description, "try redis caching");
        assert_eq!(fork.number, 1);
    }

    #[test]
    fn test_subdirectory_matches_root() {
        let dir = tempdir().unwrap();
        store::write(dir.path(), &sample("/work/app")).unwrap();
        let sub = dir.path().join("src").join("components");
        std::fs::create_dir_all(&sub).unwrap();

        assert_eq!(detect_context(&sub), detect_context(dir.path()));
        assert_eq!(detect_context(&sub.join("..")).fork().unwrap().name, "001-try-redis");
    }

    #[test]
    fn test_no_sidecar_is_project() {
        let dir = tempdir().unwrap();
        assert!(!detect_context(dir.path()).is_fork());
    }

    #[test]
    fn test_malformed_sidecar_is_project() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".exp"), "not json {").unwrap();
        assert_eq!(detect_context(dir.path()), Context::Project);
    }

    #[test]
    fn test_malformed_sidecar_stops_walk() {
        let outer = tempdir().unwrap();
        store::write(outer.path(), &sample("/work/app")).unwrap();
        let inner = outer.path().join("nested");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(inner.join(".exp"), "[]").unwrap();

        assert_eq!(detect_context(&inner), Context::Project);
        assert!(detect_context(outer.path()).is_fork());
    }

    #[test]
    fn test_origin_project_follows_lineage() {
        let tmp = tempdir().unwrap();
        let project = tmp.path().join("app");
        let first = tmp.path().join("001-first");
        let second = tmp.path().join("002-second");
        for d in [&project, &first, &second] {
            std::fs::create_dir(d).unwrap();
        }
        store::write(&first, &ForkMetadata::new("001-first", "first", &project, 1)).unwrap();
        store::write(&second, &ForkMetadata::new("002-second", "second", &first, 2)).unwrap();

        let ctx = detect_context(&second);
        let fork = ctx.fork().unwrap();
        assert_eq!(fork.origin, first);
        assert_eq!(origin_project(fork), project);
    }
}
