//! Fork naming and numbering.
//!
//! Fork directories are named `{seq}-{slug}`, e.g. `001-try-redis`. The
//! sequence is scoped to one collection and only ever grows.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

/// Width sequence numbers are zero-padded to.
pub const SEQ_WIDTH: usize = 3;

/// Description used when the user gives none.
pub const DEFAULT_DESCRIPTION: &str = "experiment";

static SEQ_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)-").expect("valid regex"));

/// Normalize free text into a filesystem-safe slug.
///
/// Lowercases, maps anything outside `[a-z0-9]` to `-`, collapses runs of
/// `-`, and trims them from both ends. Empty input gives an empty slug.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Pad a sequence number to the collection width.
pub fn pad_seq(n: u64) -> String {
    format!("{n:0width$}", width = SEQ_WIDTH)
}

/// Leading sequence number of a fork directory name, if it has one.
pub fn seq_of(name: &str) -> Option<u64> {
    SEQ_PREFIX
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Next sequence number for a collection, zero-padded.
///
/// Gaps are not backfilled and directories without a numeric prefix are
/// ignored. A missing collection starts at `001`.
pub fn next_seq(collection: &Path) -> String {
    let Ok(entries) = std::fs::read_dir(collection) else {
        return pad_seq(1);
    };
    let max = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|e| seq_of(&e.file_name().to_string_lossy()))
        .max()
        .unwrap_or(0);
    pad_seq(max.saturating_add(1))
}

/// Directory name for a new fork.
pub fn fork_name(seq: &str, slug: &str) -> String {
    format!("{seq}-{slug}")
}

/// Strip the numeric prefix from a fork name.
pub fn extract_slug(name: &str) -> &str {
    SEQ_PREFIX
        .find(name)
        .map_or(name, |m| &name[m.end()..])
}

/// Whether a description adds nothing beyond the fork name's slug.
///
/// Listings use this to skip a redundant description column.
pub fn description_matches_slug(description: &str, name: &str) -> bool {
    description.is_empty() || slugify(description) == extract_slug(name)
}
