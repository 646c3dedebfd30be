//! Error types for the fork core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, ExpError>;

/// Errors raised by the fork core.
///
/// Informational reads (metadata, divergence) degrade to defaults before
/// these ever reach a caller; only operations with side effects surface them.
#[derive(Error, Debug)]
pub enum ExpError {
    /// Every level of the clone cascade failed.
    #[error("failed to clone {} to {}: no clone method succeeded", from.display(), to.display())]
    CloneFailure { from: PathBuf, to: PathBuf },

    /// Clone destination is already present on disk.
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// No fork matched a user-supplied ID.
    #[error("not found: {0}")]
    NotFound(String),

    /// ID that can never name a directory inside the collection.
    #[error("invalid fork id: {0:?}")]
    InvalidQuery(String),

    /// Sidecar file exists but is not valid fork metadata.
    #[error("malformed metadata at {}: {source}", path.display())]
    MalformedMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Tree comparison took its error path instead of reporting differences.
    #[error("comparison failed: {0}")]
    ComparisonError(String),

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ExpError {
    /// Whether this is the "no such fork" outcome rather than a real failure.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
