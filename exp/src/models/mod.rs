//! Data models for forks and snapshots.

mod fork;
mod snapshot;

pub use fork::{ForkMetadata, ForkStatus};
pub use snapshot::SnapshotMetadata;
