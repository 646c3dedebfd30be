//! Display helpers for listings.

use chrono::{DateTime, Utc};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Approximate human size, e.g. `~1.5KB`.
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    match bytes {
        0 => "~0B".to_string(),
        b if b < KB => format!("~{b}B"),
        b if b < MB => format!("~{:.1}KB", b as f64 / KB as f64),
        b if b < GB => format!("~{:.1}MB", b as f64 / MB as f64),
        b => format!("~{:.1}GB", b as f64 / GB as f64),
    }
}

/// Coarse age of `created` relative to `now`: `just now`, `5m ago`, `2d ago`.
///
/// Months are 30 days. Timestamps in the future read as `just now`.
pub fn time_ago(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created);
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("{hours}h ago");
    }
    let days = elapsed.num_days();
    if days < 30 {
        return format!("{days}d ago");
    }
    format!("{}mo ago", days / 30)
}

/// Cap `s` at `max` characters, ending in `…` when cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
