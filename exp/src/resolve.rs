//! Fork ID resolution.
//!
//! Maps a user token (ordinal number, full name, or substring) to one fork
//! directory. First match wins, in this order:
//!
//! 1. exact directory name
//! 2. purely numeric token, zero-padded, as a `{seq}-` prefix
//! 3. first name (ascending sort) containing the token

use std::path::{Component, Path, PathBuf};

use crate::error::{ExpError, Result};
use crate::names::SEQ_WIDTH;

/// Resolve `query` to a fork directory inside `collection`.
///
/// Returns `None` when the collection is missing or nothing matches; never
/// errors. Hidden entries (bookkeeping such as `.snapshots`) only match by
/// exact name.
pub fn resolve(query: &str, collection: &Path) -> Option<PathBuf> {
    if query.is_empty() || !collection.is_dir() {
        return None;
    }

    if is_plain_name(query) {
        let direct = collection.join(query);
        if direct.is_dir() {
            tracing::debug!(query, "resolved by exact name");
            return Some(direct);
        }
    }

    let names = fork_dir_names(collection);

    if query.bytes().all(|b| b.is_ascii_digit()) {
        let prefix = format!("{query:0>width$}-", width = SEQ_WIDTH);
        if let Some(name) = names.iter().find(|n| n.starts_with(&prefix)) {
            tracing::debug!(query, name, "resolved by number");
            return Some(collection.join(name));
        }
    }

    names.iter().find(|n| n.contains(query)).map(|name| {
        tracing::debug!(query, name, "resolved by substring");
        collection.join(name)
    })
}

/// Resolve a target that must exist, for commands that act on it.
///
/// Tokens that could escape the collection, or name a hidden bookkeeping
/// entry, are rejected outright.
pub fn require(query: &str, collection: &Path) -> Result<PathBuf> {
    if query.is_empty() || query.contains(['/', '\\']) || query.starts_with('.') {
        return Err(ExpError::InvalidQuery(query.to_string()));
    }
    resolve(query, collection).ok_or_else(|| ExpError::NotFound(query.to_string()))
}

/// Visible subdirectory names of a collection, sorted ascending.
pub fn fork_dir_names(collection: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(collection) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    names
}

fn is_plain_name(query: &str) -> bool {
    let mut components = Path::new(query).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
