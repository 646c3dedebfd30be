//! Divergence between a fork and the tree it was cloned from.
//!
//! A recursive comparison classifies every differing path; the fork-side
//! size of added and modified paths is the storage the fork costs beyond
//! copy-on-write sharing.

use std::ffi::OsStr;
use std::future::Future;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::error::{ExpError, Result};
use crate::process::{run, Exec};

/// Names skipped at any depth when comparing trees.
pub const EXCLUDES: &[&str] = &[
    ".exp",
    ".git",
    "node_modules",
    ".next",
    ".turbo",
    "dist",
    "build",
    ".cache",
    "__pycache__",
    ".DS_Store",
    ".pnpm-store",
];

/// Raw result of a tree comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// No differences.
    Identical,
    /// One line per differing path, in the `diff -rq` report format.
    /// Lines stay raw bytes since paths need not be UTF-8.
    Differs(Vec<Vec<u8>>),
}

/// A recursive tree-comparison primitive.
pub trait TreeDiffer: Send + Sync {
    /// Compare two trees, skipping `excludes`.
    ///
    /// Must fail with [`ExpError::ComparisonError`] rather than report
    /// [`Comparison::Identical`] when the comparison itself breaks.
    fn compare(
        &self,
        source: &Path,
        fork: &Path,
        excludes: &[&str],
    ) -> impl Future<Output = Result<Comparison>> + Send;
}

/// Compares trees with `diff -rq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffTool;

impl TreeDiffer for DiffTool {
    async fn compare(&self, source: &Path, fork: &Path, excludes: &[&str]) -> Result<Comparison> {
        let mut exec = Exec::new("diff").arg("-rq");
        for name in excludes {
            exec = exec.arg("--exclude").arg(*name);
        }
        let exec = exec.path_arg(source).path_arg(fork);

        let out = run(&exec)
            .await
            .map_err(|e| ExpError::ComparisonError(e.to_string()))?;
        match out.code {
            Some(0) => Ok(Comparison::Identical),
            Some(1) => Ok(Comparison::Differs(out.stdout)),
            code => {
                let stderr = out.stderr_string();
                Err(ExpError::ComparisonError(if stderr.is_empty() {
                    format!("diff exited with {code:?}")
                } else {
                    stderr
                }))
            }
        }
    }
}

/// How a path differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Only in the fork.
    Added,
    /// Only in the source.
    Removed,
    /// In both, with different content or type.
    Modified,
}

impl ChangeKind {
    /// One-character marker for listings.
    pub const fn marker(self) -> char {
        match self {
            Self::Added => '+',
            Self::Removed => '-',
            Self::Modified => '~',
        }
    }
}

/// One classified difference, relative to the tree root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

/// Classified differences and their fork-side storage cost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DivergenceReport {
    #[serde(rename = "fileChanges")]
    pub changes: Vec<FileChange>,
    #[serde(rename = "extraBytes")]
    pub extra_bytes: u64,
}

impl DivergenceReport {
    /// Whether the fork matches its source.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes of one kind.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

/// Divergence as shown to users: known, or not computable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Divergence {
    Known(DivergenceReport),
    Unknown,
}

impl Divergence {
    pub const fn report(&self) -> Option<&DivergenceReport> {
        match self {
            Self::Known(r) => Some(r),
            Self::Unknown => None,
        }
    }
}

/// Compute divergence, propagating comparison errors.
pub async fn compute<D: TreeDiffer>(differ: &D, source: &Path, fork: &Path) -> Result<DivergenceReport> {
    let lines = match differ.compare(source, fork, EXCLUDES).await? {
        Comparison::Identical => return Ok(DivergenceReport::default()),
        Comparison::Differs(lines) => lines,
    };

    let mut changes: Vec<FileChange> = lines
        .iter()
        .filter_map(|line| parse_line(line, source, fork))
        .filter(|c| !c.path.components().any(|p| is_excluded(p.as_os_str())))
        .collect();
    changes.sort_by(|a, b| a.path.cmp(&b.path).then(a.kind.cmp(&b.kind)));
    changes.dedup();

    let extra_bytes = changes
        .iter()
        .filter(|c| c.kind != ChangeKind::Removed)
        .map(|c| fork_side_bytes(&fork.join(&c.path)))
        .sum();

    Ok(DivergenceReport { changes, extra_bytes })
}

/// Compute divergence, degrading any comparison failure to unknown.
pub async fn divergence<D: TreeDiffer>(differ: &D, source: &Path, fork: &Path) -> Divergence {
    match compute(differ, source, fork).await {
        Ok(report) => Divergence::Known(report),
        Err(e) => {
            tracing::debug!(fork = %fork.display(), error = %e, "divergence unknown");
            Divergence::Unknown
        }
    }
}

/// Divergence for many forks at once, returned sorted by name.
///
/// Each entry is `(name, source, fork)`. Comparisons run concurrently.
pub async fn divergence_all<D>(differ: Arc<D>, entries: Vec<(String, PathBuf, PathBuf)>) -> Vec<(String, Divergence)>
where
    D: TreeDiffer + 'static,
{
    let mut set = JoinSet::new();
    for (name, source, fork) in entries {
        let differ = Arc::clone(&differ);
        set.spawn(async move {
            let div = divergence(differ.as_ref(), &source, &fork).await;
            (name, div)
        });
    }

    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(pair) => results.push(pair),
            Err(e) => tracing::warn!(error = %e, "divergence task failed"),
        }
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));
    results
}

fn is_excluded(name: &std::ffi::OsStr) -> bool {
    EXCLUDES.iter().any(|ex| name == *ex)
}

const ONLY_IN: &[u8] = b"Only in ";
const FILES: &[u8] = b"Files ";
const FILE: &[u8] = b"File ";
const AND: &[u8] = b" and ";
const DIFFER: &[u8] = b" differ";
const WHILE_FILE: &[u8] = b" while file ";
const IS_A: &[u8] = b" is a ";

/// Classify one report line. Unrecognised lines yield `None`.
fn parse_line(line: &[u8], source: &Path, fork: &Path) -> Option<FileChange> {
    let source = source.as_os_str().as_bytes();
    let fork = fork.as_os_str().as_bytes();

    if let Some(rest) = line.strip_prefix(ONLY_IN) {
        return parse_only_in(rest, source, fork);
    }

    // "Files A and B differ"
    if let Some(rest) = line.strip_prefix(FILES).and_then(|r| r.strip_suffix(DIFFER)) {
        let at = find(rest, &[AND, fork].concat())?;
        let rel = relative(&rest[at + AND.len()..], fork)?;
        return Some(FileChange {
            kind: ChangeKind::Modified,
            path: rel,
        });
    }

    // "File A is a directory while file B is a regular file"
    if let Some(rest) = line.strip_prefix(FILE) {
        let at = find(rest, &[WHILE_FILE, fork].concat())?;
        let tail = &rest[at + WHILE_FILE.len()..];
        let rel = relative(&tail[..rfind(tail, IS_A)?], fork)?;
        return Some(FileChange {
            kind: ChangeKind::Modified,
            path: rel,
        });
    }

    None
}

/// "Only in DIR: NAME", classified by which tree DIR lies in.
fn parse_only_in(rest: &[u8], source: &[u8], fork: &[u8]) -> Option<FileChange> {
    for (root, kind) in [(fork, ChangeKind::Added), (source, ChangeKind::Removed)] {
        let Some(tail) = rest.strip_prefix(root) else {
            continue;
        };
        let Some(at) = find(tail, b": ") else {
            continue;
        };
        let (sub, name) = (&tail[..at], &tail[at + 2..]);
        if !sub.is_empty() && !sub.starts_with(b"/") {
            continue;
        }
        return Some(FileChange {
            kind,
            path: Path::new(OsStr::from_bytes(trim_slashes(sub))).join(OsStr::from_bytes(name)),
        });
    }
    None
}

fn relative(path: &[u8], root: &[u8]) -> Option<PathBuf> {
    let tail = path.strip_prefix(root)?;
    if !tail.is_empty() && !tail.starts_with(b"/") {
        return None;
    }
    Some(PathBuf::from(OsStr::from_bytes(trim_slashes(tail))))
}

fn trim_slashes(bytes: &[u8]) -> &[u8] {
    let n = bytes.iter().take_while(|&&b| b == b'/').count();
    &bytes[n..]
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Size of a fork-side path; directories are summed, skipping excluded names.
fn fork_side_bytes(path: &Path) -> u64 {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => WalkDir::new(path)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_excluded(e.file_name()))
            .flatten()
            .filter_map(|e| e.metadata().ok())
            .filter(std::fs::Metadata::is_file)
            .map(|m| m.len())
            .sum(),
        Ok(meta) => meta.len(),
        Err(_) => 0,
    }
}
