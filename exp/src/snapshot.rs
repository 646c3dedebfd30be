//! Point-in-time snapshots of a fork.
//!
//! Snapshots of fork `NAME` live in `{collection}/.snapshots/NAME/{slug}`,
//! each a clone of the fork plus a `.snap` JSON sidecar.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::clone::{clone_tree, CloneMethod, TreeCloner};
use crate::error::Result;
use crate::models::SnapshotMetadata;
use crate::names::slugify;

/// Snapshot sidecar file name.
pub const SNAP_SIDECAR: &str = ".snap";

/// Bookkeeping directory inside a collection.
pub const SNAPSHOTS_DIR: &str = ".snapshots";

/// A snapshot on disk.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub name: String,
    pub dir: PathBuf,
    pub meta: Option<SnapshotMetadata>,
}

/// Directory holding one fork's snapshots.
pub fn snapshots_dir(collection: &Path, fork_name: &str) -> PathBuf {
    collection.join(SNAPSHOTS_DIR).join(fork_name)
}

/// Read a snapshot's sidecar; missing or malformed reads as `None`.
pub fn read_meta(snap_dir: &Path) -> Option<SnapshotMetadata> {
    let raw = std::fs::read_to_string(snap_dir.join(SNAP_SIDECAR)).ok()?;
    serde_json::from_str(&raw)
        .map_err(|e| tracing::debug!(dir = %snap_dir.display(), error = %e, "bad snapshot sidecar"))
        .ok()
}

fn write_meta(snap_dir: &Path, meta: &SnapshotMetadata) -> Result<()> {
    std::fs::write(snap_dir.join(SNAP_SIDECAR), serde_json::to_string(meta)?)?;
    Ok(())
}

/// Snapshot `fork_dir` under a name derived from `description`.
///
/// A name already taken gets a `-{unix millis}` suffix.
pub async fn create<C: TreeCloner>(
    cloner: &C,
    collection: &Path,
    fork_dir: &Path,
    description: &str,
) -> Result<(Snapshot, CloneMethod)> {
    let slug = match slugify(description) {
        s if s.is_empty() => "snapshot".to_string(),
        s => s,
    };
    let dir = snapshots_dir(collection, &fork_name(fork_dir));
    let name = if dir.join(&slug).exists() {
        format!("{slug}-{}", Utc::now().timestamp_millis())
    } else {
        slug
    };
    take(cloner, fork_dir, &dir, name, description).await
}

async fn take<C: TreeCloner>(
    cloner: &C,
    fork_dir: &Path,
    dir: &Path,
    name: String,
    description: &str,
) -> Result<(Snapshot, CloneMethod)> {
    std::fs::create_dir_all(dir)?;
    let snap_dir = dir.join(&name);
    let method = clone_tree(cloner, fork_dir, &snap_dir).await?;

    let meta = SnapshotMetadata::new(&name, description, fork_dir);
    write_meta(&snap_dir, &meta)?;
    tracing::debug!(snapshot = %name, method = %method, "snapshot taken");

    Ok((
        Snapshot {
            name,
            dir: snap_dir,
            meta: Some(meta),
        },
        method,
    ))
}

/// All snapshots of a fork, sorted by name.
pub fn list(collection: &Path, fork_name: &str) -> Vec<Snapshot> {
    let dir = snapshots_dir(collection, fork_name);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut snaps: Vec<Snapshot> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| {
            let path = e.path();
            Snapshot {
                name: e.file_name().to_string_lossy().into_owned(),
                meta: read_meta(&path),
                dir: path,
            }
        })
        .collect();
    snaps.sort_by(|a, b| a.name.cmp(&b.name));
    snaps
}

/// Find a snapshot by exact name, then by first substring match.
pub fn resolve(collection: &Path, fork_name: &str, query: &str) -> Option<Snapshot> {
    if query.is_empty() {
        return None;
    }
    let snaps = list(collection, fork_name);
    let exact = snaps.iter().position(|s| s.name == query);
    let idx = exact.or_else(|| snaps.iter().position(|s| s.name.contains(query)))?;
    snaps.into_iter().nth(idx)
}

/// Replace a fork's contents with a snapshot.
///
/// The fork is snapshotted as `pre-restore-{unix millis}` first; that
/// backup is returned.
pub async fn restore<C: TreeCloner>(
    cloner: &C,
    collection: &Path,
    fork_dir: &Path,
    snap: &Snapshot,
) -> Result<Snapshot> {
    let dir = snapshots_dir(collection, &fork_name(fork_dir));
    let backup_name = format!("pre-restore-{}", Utc::now().timestamp_millis());
    let description = format!("Auto-backup before restoring {}", snap.name);
    let (backup, _) = take(cloner, fork_dir, &dir, backup_name, &description).await?;

    std::fs::remove_dir_all(fork_dir)?;
    if let Err(e) = clone_tree(cloner, &snap.dir, fork_dir).await {
        tracing::error!(backup = %backup.dir.display(), "restore failed, fork contents are in the backup");
        return Err(e);
    }
    let stray = fork_dir.join(SNAP_SIDECAR);
    if stray.exists() {
        std::fs::remove_file(stray)?;
    }

    Ok(backup)
}

fn fork_name(fork_dir: &Path) -> String {
    fork_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clone::SystemCloner;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let tmp = tempdir().unwrap();
        let collection = tmp.path().join(".exp-app");
        let fork = collection.join("001-try-redis");
        std::fs::create_dir_all(&fork).unwrap();
        std::fs::write(fork.join("main.rs"), "v1").unwrap();
        (tmp, collection, fork)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (_tmp, collection, fork) = setup();
        let (snap, _) = create(&SystemCloner, &collection, &fork, "Before Refactor").await.unwrap();
        assert_eq!(snap.name, "before-refactor");
        assert_eq!(
            std::fs::read_to_string(snap.dir.join("main.rs")).unwrap(),
            "v1"
        );

        let listed = list(&collection, "001-try-redis");
        assert_eq!(listed.len(), 1);
        let meta = listed[0].meta.as_ref().unwrap();
        assert_eq!(meta.description, "Before Refactor");
        assert_eq!(meta.source, fork);
    }

    #[tokio::test]
    async fn test_name_collision_gets_suffix() {
        let (_tmp, collection, fork) = setup();
        create(&SystemCloner, &collection, &fork, "wip").await.unwrap();
        let (second, _) = create(&SystemCloner, &collection, &fork, "wip").await.unwrap();
        assert!(second.name.starts_with("wip-"));
        assert_eq!(list(&collection, "001-try-redis").len(), 2);
    }

    #[tokio::test]
    async fn test_resolve() {
        let (_tmp, collection, fork) = setup();
        create(&SystemCloner, &collection, &fork, "alpha one").await.unwrap();
        create(&SystemCloner, &collection, &fork, "beta").await.unwrap();
        assert_eq!(resolve(&collection, "001-try-redis", "beta").unwrap().name, "beta");
        assert_eq!(resolve(&collection, "001-try-redis", "one").unwrap().name, "alpha-one");
        assert!(resolve(&collection, "001-try-redis", "gamma").is_none());
        assert!(resolve(&collection, "002-other", "beta").is_none());
    }

    #[tokio::test]
    async fn test_restore_keeps_backup() {
        let (_tmp, collection, fork) = setup();
        let (snap, _) = create(&SystemCloner, &collection, &fork, "v1").await.unwrap();
        std::fs::write(fork.join("main.rs"), "v2").unwrap();
        std::fs::write(fork.join("extra.rs"), "new").unwrap();

        let backup = restore(&SystemCloner, &collection, &fork, &snap).await.unwrap();
        assert!(backup.name.starts_with("pre-restore-"));
        assert_eq!(std::fs::read_to_string(fork.join("main.rs")).unwrap(), "v1");
        assert!(!fork.join("extra.rs").exists());
        assert!(!fork.join(SNAP_SIDECAR).exists());
        assert_eq!(
            std::fs::read_to_string(backup.dir.join("main.rs")).unwrap(),
            "v2"
        );
    }

    #[test]
    fn test_list_missing() {
        let tmp = tempdir().unwrap();
        assert!(list(tmp.path(), "001-x").is_empty());
    }
}
