//! Fork lifecycle: create, list, trash, promote.

use std::path::{Component, Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use walkdir::WalkDir;

use crate::clone::{clone_tree, CloneMethod, TreeCloner};
use crate::config::Config;
use crate::error::{ExpError, Result};
use crate::models::ForkMetadata;
use crate::names::{fork_name, next_seq, slugify, DEFAULT_DESCRIPTION};
use crate::notes::{self, Note};
use crate::process::{run, Exec};
use crate::project::Workspace;
use crate::resolve::{fork_dir_names, require};
use crate::store;

/// Prefix of the directory the original project is moved to on promote.
pub const BACKUP_PREFIX: &str = "_backup-";

/// A request to create a fork.
#[derive(Debug, Clone, Default)]
pub struct NewFork<'a> {
    /// Free-text reason; empty means the default description.
    pub description: &'a str,
    /// Fork ID to clone instead of the current project or fork.
    pub from: Option<&'a str>,
}

/// A fork that was just created.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedFork {
    pub name: String,
    pub dir: PathBuf,
    pub number: u64,
    pub seq: String,
    pub description: String,
    /// Tree the fork was cloned from.
    pub source: PathBuf,
    pub method: CloneMethod,
    /// Directories removed right after cloning.
    pub cleaned: Vec<String>,
}

/// One directory in a collection.
#[derive(Debug, Clone)]
pub struct ForkEntry {
    pub name: String,
    pub dir: PathBuf,
    pub meta: Option<ForkMetadata>,
}

/// Create a fork in the workspace's collection.
///
/// The clone source is, in order: the `from` fork, the fork the command runs
/// inside, or the project root.
pub async fn create_fork<C: TreeCloner>(
    ws: &Workspace,
    config: &Config,
    request: &NewFork<'_>,
    cloner: &C,
) -> Result<CreatedFork> {
    let collection = crate::project::ensure_collection(&ws.root, config)?;

    let source = match (request.from, ws.context.fork()) {
        (Some(id), _) => require(id, &collection)?,
        (None, Some(fork)) => fork.fork_dir.clone(),
        (None, None) => ws.root.clone(),
    };

    let description = match request.description.trim() {
        "" => DEFAULT_DESCRIPTION,
        d => d,
    };
    let slug = match slugify(description) {
        s if s.is_empty() => DEFAULT_DESCRIPTION.to_string(),
        s => s,
    };

    // Not locked: concurrent creates in one collection can pick the same
    // number, and the loser fails with DestinationExists.
    let seq = next_seq(&collection);
    let name = fork_name(&seq, &slug);
    let dir = collection.join(&name);
    let number = seq.parse().unwrap_or_default();

    tracing::debug!(source = %source.display(), dest = %dir.display(), "creating fork");
    let method = clone_tree(cloner, &source, &dir).await?;

    store::write(&dir, &ForkMetadata::new(&name, description, &source, number))?;
    let cleaned = clean_after_clone(&dir, &config.clean)?;

    if config.seed_notes {
        let note_path = dir.join(notes::NOTE_FILE);
        notes::strip(&note_path)?;
        let from_fork = (source != ws.root)
            .then(|| source.file_name().map(|n| n.to_string_lossy().into_owned()))
            .flatten();
        notes::seed(
            &dir,
            &Note {
                description,
                project_name: &ws.name,
                project_root: &ws.root,
                seq: &seq,
                from_fork: from_fork.as_deref(),
            },
        )?;
    }

    Ok(CreatedFork {
        name,
        dir,
        number,
        seq,
        description: description.to_string(),
        source,
        method,
        cleaned,
    })
}

/// Remove configured directories from a fresh fork.
///
/// Only plain single-segment names are honoured.
fn clean_after_clone(dir: &Path, targets: &[String]) -> Result<Vec<String>> {
    let mut cleaned = Vec::new();
    for target in targets {
        if !is_plain_name(target) {
            tracing::warn!(target = %target, "ignoring clean target that is not a plain name");
            continue;
        }
        let path = dir.join(target);
        let Ok(meta) = std::fs::symlink_metadata(&path) else {
            continue;
        };
        if meta.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        cleaned.push(target.clone());
    }
    Ok(cleaned)
}

fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && name != crate::store::SIDECAR
}

/// Forks in a collection, in ascending name order.
pub fn list_forks(collection: &Path) -> Vec<ForkEntry> {
    fork_dir_names(collection)
        .into_iter()
        .map(|name| {
            let dir = collection.join(&name);
            ForkEntry {
                meta: store::read(&dir),
                name,
                dir,
            }
        })
        .collect()
}

/// Mark a fork trashed, then delete it.
pub fn remove_fork(dir: &Path) -> Result<()> {
    if let Err(e) = store::mark_trashed(dir) {
        tracing::warn!(dir = %dir.display(), error = %e, "could not mark fork trashed");
    }
    std::fs::remove_dir_all(dir)?;
    Ok(())
}

/// Delete a whole collection, returning how many forks it held.
pub fn remove_collection(collection: &Path) -> Result<usize> {
    if !collection.exists() {
        return Ok(0);
    }
    let count = fork_dir_names(collection).len();
    std::fs::remove_dir_all(collection)?;
    Ok(count)
}

/// Replace the original project with a fork.
///
/// The original moves to `{collection}/_backup-{YYYYMMDD-HHMMSS}` and is
/// moved back if the fork cannot take its place. Returns the backup path.
pub async fn promote(ws: &Workspace, fork_dir: &Path) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let backup = ws.collection.join(format!("{BACKUP_PREFIX}{stamp}"));
    if backup.exists() {
        return Err(ExpError::DestinationExists(backup));
    }

    move_dir(&ws.root, &backup).await?;
    if let Err(e) = move_dir(fork_dir, &ws.root).await {
        if let Err(undo) = move_dir(&backup, &ws.root).await {
            tracing::error!(backup = %backup.display(), error = %undo, "could not restore original");
        }
        return Err(e);
    }

    let sidecar = store::sidecar_path(&ws.root);
    if sidecar.exists() {
        std::fs::remove_file(sidecar)?;
    }
    notes::strip(&ws.root.join(notes::NOTE_FILE))?;

    Ok(backup)
}

async fn move_dir(from: &Path, to: &Path) -> Result<()> {
    let out = run(&Exec::new("mv").path_arg(from).path_arg(to)).await?;
    if out.success() {
        return Ok(());
    }
    Err(ExpError::Io(std::io::Error::other(format!(
        "mv {} {}: {}",
        from.display(),
        to.display(),
        out.stderr_string()
    ))))
}

/// Apparent size of a tree in bytes. Symlinks are not followed.
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .flatten()
        .filter_map(|e| e.metadata().ok())
        .filter(std::fs::Metadata::is_file)
        .map(|m| m.len())
        .sum()
}

/// Session export files (`claude-export-*.md`, `claude-session-*.md`) in a
/// project root.
pub fn session_exports(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            (name.starts_with("claude-export-") || name.starts_with("claude-session-"))
                && name.ends_with(".md")
        })
        .map(|e| e.path())
        .collect();
    found.sort();
    found
}

/// Delete session exports from the project root once forks have them.
pub fn clean_exports(root: &Path) -> Result<Vec<PathBuf>> {
    let exports = session_exports(root);
    for path in &exports {
        std::fs::remove_file(path)?;
    }
    Ok(exports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clone::SystemCloner;
    use crate::models::ForkStatus;
    use crate::resolve::resolve;
    use tempfile::{tempdir, TempDir};

    fn project() -> (TempDir, PathBuf) {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("app");
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("Cargo.toml"), "[package]").unwrap();
        std::fs::write(root.join("src").join("main.rs"), "fn main() {}").unwrap();
        (tmp, root)
    }

    fn quiet() -> Config {
        Config {
            seed_notes: false,
            ..Config::default()
        }
    }

    async fn new_fork(cwd: &Path, config: &Config, description: &str) -> CreatedFork {
        let ws = Workspace::locate(cwd, config);
        let request = NewFork {
            description,
            from: None,
        };
        create_fork(&ws, config, &request, &SystemCloner).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_first_fork() {
        let (tmp, root) = project();
        let config = quiet();
        let created = new_fork(&root, &config, "try redis caching").await;

        assert_eq!(created.name, "001-try-redis-caching");
        assert_eq!(created.number, 1);
        assert_eq!(created.source, root);
        let collection = tmp.path().join(".exp-app");
        assert_eq!(created.dir, collection.join("001-try-redis-caching"));

        let meta = store::read(&created.dir).unwrap();
        assert_eq!(meta.number, 1);
        assert_eq!(meta.description, "try redis caching");
        assert_eq!(meta.status, Some(ForkStatus::Active));
        assert_eq!(resolve("redis", &collection), Some(created.dir.clone()));
        assert!(created.dir.join("src").join("main.rs").exists());
        assert!(!created.dir.join(notes::NOTE_FILE).exists());
    }

    #[tokio::test]
    async fn test_numbers_increase_and_default_description() {
        let (_tmp, root) = project();
        let config = quiet();
        new_fork(&root, &config, "first").await;
        let second = new_fork(&root, &config, "   ").await;
        assert_eq!(second.name, "002-experiment");
        assert_eq!(second.description, DEFAULT_DESCRIPTION);
        let third = new_fork(&root, &config, "???").await;
        assert_eq!(third.name, "003-experiment");
        assert_eq!(third.description, "???");
    }

    #[tokio::test]
    async fn test_fork_of_fork_from_inside() {
        let (tmp, root) = project();
        let config = quiet();
        let first = new_fork(&root, &config, "base idea").await;
        std::fs::write(first.dir.join("idea.txt"), "wip").unwrap();

        let nested = new_fork(&first.dir.join("src"), &config, "variant").await;
        assert_eq!(nested.name, "002-variant");
        assert_eq!(nested.source, first.dir);
        assert_eq!(nested.dir.parent().unwrap(), tmp.path().join(".exp-app"));
        assert!(nested.dir.join("idea.txt").exists());
        assert_eq!(store::read(&nested.dir).unwrap().name, "002-variant");
    }

    #[tokio::test]
    async fn test_from_wins_and_must_resolve() {
        let (_tmp, root) = project();
        let config = quiet();
        let first = new_fork(&root, &config, "redis").await;
        std::fs::write(first.dir.join("marker"), "").unwrap();

        let ws = Workspace::locate(&root, &config);
        let from = NewFork {
            description: "redis v2",
            from: Some("1"),
        };
        let created = create_fork(&ws, &config, &from, &SystemCloner).await.unwrap();
        assert_eq!(created.source, first.dir);
        assert!(created.dir.join("marker").exists());

        let missing = NewFork {
            description: "x",
            from: Some("nope"),
        };
        let err = create_fork(&ws, &config, &missing, &SystemCloner).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_clean_and_note() {
        let (_tmp, root) = project();
        std::fs::create_dir_all(root.join(".next").join("cache")).unwrap();
        std::fs::write(root.join(notes::NOTE_FILE), "# Project notes\n").unwrap();
        let config = Config {
            clean: vec![".next".into(), "../escape".into(), "missing".into()],
            ..Config::default()
        };

        let created = new_fork(&root, &config, "dark mode").await;
        assert_eq!(created.cleaned, vec![".next"]);
        assert!(!created.dir.join(".next").exists());
        assert!(root.join(".next").exists());

        let note = std::fs::read_to_string(created.dir.join(notes::NOTE_FILE)).unwrap();
        assert!(note.starts_with(notes::MARKER_START));
        assert!(note.contains("exp diff 001"));
        assert!(note.ends_with("# Project notes\n"));
        assert_eq!(
            std::fs::read_to_string(root.join(notes::NOTE_FILE)).unwrap(),
            "# Project notes\n"
        );
    }

    #[tokio::test]
    async fn test_list_and_remove() {
        let (tmp, root) = project();
        let config = quiet();
        new_fork(&root, &config, "b").await;
        let second = new_fork(&root, &config, "a").await;
        let collection = tmp.path().join(".exp-app");

        let names: Vec<_> = list_forks(&collection).into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["001-b", "002-a"]);

        remove_fork(&second.dir).unwrap();
        assert!(!second.dir.exists());
        assert_eq!(list_forks(&collection).len(), 1);

        assert_eq!(remove_collection(&collection).unwrap(), 1);
        assert!(!collection.exists());
        assert_eq!(remove_collection(&collection).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_promote_swaps_and_backs_up() {
        let (_tmp, root) = project();
        let config = Config::default();
        let created = new_fork(&root, &config, "rewrite").await;
        std::fs::write(created.dir.join("src").join("main.rs"), "fn main() { new() }").unwrap();

        let ws = Workspace::locate(&root, &config);
        let backup = promote(&ws, &created.dir).await.unwrap();

        assert!(backup.file_name().unwrap().to_string_lossy().starts_with(BACKUP_PREFIX));
        assert_eq!(
            std::fs::read_to_string(root.join("src").join("main.rs")).unwrap(),
            "fn main() { new() }"
        );
        assert_eq!(
            std::fs::read_to_string(backup.join("src").join("main.rs")).unwrap(),
            "fn main() {}"
        );
        assert!(!created.dir.exists());
        assert!(!store::sidecar_path(&root).exists());
        assert!(!root.join(notes::NOTE_FILE).exists());
    }

    #[test]
    fn test_session_exports() {
        let tmp = tempdir().unwrap();
        for name in ["claude-export-1.md", "claude-session-x.md", "claude-export.txt", "notes.md"] {
            std::fs::write(tmp.path().join(name), "").unwrap();
        }
        assert_eq!(session_exports(tmp.path()).len(), 2);
        assert_eq!(clean_exports(tmp.path()).unwrap().len(), 2);
        assert!(session_exports(tmp.path()).is_empty());
        assert!(tmp.path().join("notes.md").exists());
    }

    #[test]
    fn test_dir_size() {
        let tmp = tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("a"), "1234").unwrap();
        std::fs::write(tmp.path().join("sub").join("b"), "56").unwrap();
        assert_eq!(dir_size(tmp.path()), 6);
    }
}
