//! Sidecar metadata store.
//!
//! Every fork carries its metadata in a `.exp` JSON file at its root.
//! Reads are informational and degrade to `None`; writes propagate errors.

use std::path::{Path, PathBuf};

use crate::error::{ExpError, Result};
use crate::models::ForkMetadata;

/// Sidecar file name at a fork's root.
pub const SIDECAR: &str = ".exp";

/// Path of the sidecar for a fork directory.
pub fn sidecar_path(fork_dir: &Path) -> PathBuf {
    fork_dir.join(SIDECAR)
}

/// Load metadata, distinguishing "absent" from "present but malformed".
///
/// Returns `Ok(None)` when there is no sidecar, and
/// `Err(ExpError::MalformedMetadata)` when it exists but does not parse.
pub fn load(fork_dir: &Path) -> Result<Option<ForkMetadata>> {
    let path = sidecar_path(fork_dir);
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| ExpError::MalformedMetadata { path, source })
}

/// Read metadata, treating a missing or unreadable sidecar as no metadata.
pub fn read(fork_dir: &Path) -> Option<ForkMetadata> {
    match load(fork_dir) {
        Ok(meta) => meta,
        Err(e) => {
            tracing::warn!(dir = %fork_dir.display(), error = %e, "ignoring unreadable fork metadata");
            None
        }
    }
}

/// Write metadata to the fork's sidecar, replacing any existing one.
pub fn write(fork_dir: &Path, meta: &ForkMetadata) -> Result<()> {
    let json = serde_json::to_string(meta)?;
    std::fs::write(sidecar_path(fork_dir), json)?;
    Ok(())
}

/// Rewrite the sidecar with the fork marked trashed.
///
/// A fork without readable metadata is left untouched.
pub fn mark_trashed(fork_dir: &Path) -> Result<Option<ForkMetadata>> {
    let Some(mut meta) = read(fork_dir) else {
        return Ok(None);
    };
    meta.mark_trashed();
    write(fork_dir, &meta)?;
    Ok(Some(meta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ForkStatus;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let meta = ForkMetadata::new("001-try-redis", "try redis", "/work/app", 1);
        write(dir.path(), &meta).unwrap();
        let back = read(dir.path()).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_missing_sidecar() {
        let dir = tempdir().unwrap();
        assert!(load(dir.path()).unwrap().is_none());
        assert!(read(dir.path()).is_none());
    }

    #[test]
    fn test_malformed_sidecar() {
        let dir = tempdir().unwrap();
        std::fs::write(sidecar_path(dir.path()), "{not json").unwrap();
        assert!(matches!(
            load(dir.path()),
            Err(ExpError::MalformedMetadata { .. })
        ));
        assert!(read(dir.path()).is_none());
    }

    #[test]
    fn test_mark_trashed_rewrites_status() {
        let dir = tempdir().unwrap();
        let meta = ForkMetadata::new("003-x", "x", "/work/app", 3);
        write(dir.path(), &meta).unwrap();

        let updated = mark_trashed(dir.path()).unwrap().unwrap();
        assert_eq!(updated.status, Some(ForkStatus::Trashed));

        let back = read(dir.path()).unwrap();
        assert!(back.is_trashed());
        assert!(back.trashed_at.is_some());
        assert_eq!(back.created, meta.created);
    }

    #[test]
    fn test_mark_trashed_without_metadata() {
        let dir = tempdir().unwrap();
        assert!(mark_trashed(dir.path()).unwrap().is_none());
        assert!(!sidecar_path(dir.path()).exists());
    }
}
