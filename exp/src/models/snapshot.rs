//! Snapshot metadata model, persisted as the `.snap` sidecar.

use std::path::PathBuf;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time copy of a fork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Snapshot directory name.
    pub name: String,
    /// Free-text reason for the snapshot.
    pub description: String,
    /// When the snapshot was taken.
    pub created: DateTime<Utc>,
    /// Fork directory the snapshot was taken from.
    pub source: PathBuf,
}

impl SnapshotMetadata {
    /// Metadata for a snapshot taken now.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            created: Utc::now().trunc_subsecs(3),
            source: source.into(),
        }
    }
}
