//! Directory tree cloning.
//!
//! Cheapest mechanism first, falling through on failure:
//!
//! 1. atomic whole-tree copy-on-write clone (one syscall)
//! 2. per-file copy-on-write copy
//! 3. plain recursive copy
//!
//! A failed level is never retried.

mod native;
mod system;

use std::future::Future;
use std::path::Path;

use serde::Serialize;

use crate::error::{ExpError, Result};

pub use system::SystemCloner;

/// Which cascade level produced a clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloneMethod {
    /// Whole tree in one copy-on-write call.
    AtomicClone,
    /// File-by-file copy-on-write.
    CowCopy,
    /// Full byte-for-byte copy.
    PlainCopy,
}

impl CloneMethod {
    /// Cascade order.
    pub const CASCADE: [Self; 3] = [Self::AtomicClone, Self::CowCopy, Self::PlainCopy];

    /// Whether the clone shares blocks with its source.
    pub const fn is_copy_on_write(self) -> bool {
        !matches!(self, Self::PlainCopy)
    }

    /// Human-readable description of the method.
    pub const fn describe(self) -> &'static str {
        match self {
            Self::AtomicClone => "instant, copy-on-write",
            Self::CowCopy => "copy-on-write, per file",
            Self::PlainCopy => "regular copy, uses full disk space",
        }
    }
}

impl std::fmt::Display for CloneMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::AtomicClone => "atomic-clone",
            Self::CowCopy => "cow-copy",
            Self::PlainCopy => "plain-copy",
        })
    }
}

/// The copy primitives behind each cascade level.
///
/// Each returns `true` on success. Implementations must not create
/// `dest`'s parent and must fail if `dest` cannot be created.
pub trait TreeCloner: Sync {
    /// Level 1: clone the whole tree in a single copy-on-write operation.
    fn atomic_clone(&self, source: &Path, dest: &Path) -> impl Future<Output = bool> + Send;

    /// Level 2: recursive copy where each file shares blocks with its source.
    fn cow_copy(&self, source: &Path, dest: &Path) -> impl Future<Output = bool> + Send;

    /// Level 3: recursive byte-for-byte copy.
    fn plain_copy(&self, source: &Path, dest: &Path) -> impl Future<Output = bool> + Send;
}

/// Clone `source` to `dest`, reporting which method succeeded.
///
/// `dest` must not exist. Leftovers from a failed level are removed before
/// the next level runs; if every level fails, whatever the last level left
/// behind stays in place for the caller to deal with.
pub async fn clone_tree<C: TreeCloner>(cloner: &C, source: &Path, dest: &Path) -> Result<CloneMethod> {
    if dest.exists() {
        return Err(ExpError::DestinationExists(dest.to_path_buf()));
    }

    for (i, method) in CloneMethod::CASCADE.into_iter().enumerate() {
        let ok = match method {
            CloneMethod::AtomicClone => cloner.atomic_clone(source, dest).await,
            CloneMethod::CowCopy => cloner.cow_copy(source, dest).await,
            CloneMethod::PlainCopy => cloner.plain_copy(source, dest).await,
        };
        if ok {
            tracing::debug!(%method, dest = %dest.display(), "clone succeeded");
            return Ok(method);
        }
        tracing::debug!(%method, "clone level unavailable or failed");

        let last = i + 1 == CloneMethod::CASCADE.len();
        if !last && dest.exists() {
            if let Err(e) = std::fs::remove_dir_all(dest) {
                tracing::warn!(dest = %dest.display(), error = %e, "could not clear partial clone");
                break;
            }
        }
    }

    Err(ExpError::CloneFailure {
        from: source.to_path_buf(),
        to: dest.to_path_buf(),
    })
}
