//! Fork metadata model, persisted as the `.exp` sidecar at a fork's root.

use std::path::PathBuf;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a fork. Informational only; deletion is physical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkStatus {
    /// Fork is in use.
    Active,
    /// Fork is being (or was) removed.
    Trashed,
}

impl ForkStatus {
    /// Convert status to its sidecar string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trashed => "trashed",
        }
    }
}

impl std::fmt::Display for ForkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity and provenance of one fork.
///
/// This record, not the directory name, is authoritative for `source`,
/// `created`, `number` and `description`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkMetadata {
    /// Directory name, `{seq}-{slug}`.
    pub name: String,
    /// Free-text reason for the fork.
    pub description: String,
    /// Absolute path the fork was cloned from (project root or another fork).
    pub source: PathBuf,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Sequence number within the collection.
    pub number: u64,
    /// Lifecycle flag; absent in sidecars written before it existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ForkStatus>,
    /// When the fork was marked trashed.
    #[serde(
        rename = "trashedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub trashed_at: Option<DateTime<Utc>>,
}

impl ForkMetadata {
    /// Metadata for a fork created now.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<PathBuf>,
        number: u64,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            source: source.into(),
            created: Utc::now().trunc_subsecs(3),
            number,
            status: Some(ForkStatus::Active),
            trashed_at: None,
        }
    }

    /// Whether the sidecar marks this fork trashed.
    pub fn is_trashed(&self) -> bool {
        self.status == Some(ForkStatus::Trashed)
    }

    /// Mark the fork trashed as of now.
    pub fn mark_trashed(&mut self) {
        self.status = Some(ForkStatus::Trashed);
        self.trashed_at = Some(Utc::now().trunc_subsecs(3));
    }
}
