//! Agent note block in a fork's `CLAUDE.md`.
//!
//! The block sits between marker comments so it can be stripped again when
//! the fork is promoted back over the project.

use std::io;
use std::path::Path;

pub const NOTE_FILE: &str = "CLAUDE.md";
pub const MARKER_START: &str = "<!-- exp:start -->";
pub const MARKER_END: &str = "<!-- exp:end -->";

/// What the note tells an agent working inside the fork.
#[derive(Debug, Clone)]
pub struct Note<'a> {
    pub description: &'a str,
    pub project_name: &'a str,
    pub project_root: &'a Path,
    pub seq: &'a str,
    /// Name of the fork this one was cloned from, for forks of forks.
    pub from_fork: Option<&'a str>,
}

impl Note<'_> {
    pub fn render(&self) -> String {
        let lineage = self
            .from_fork
            .map(|f| format!("\nForked from experiment `{f}`."))
            .unwrap_or_default();
        format!(
            "{MARKER_START}\n\
             ## Side quest: {desc}\n\
             \n\
             Fork of `{name}`. Original untouched at `{root}`.{lineage}\n\
             Goal: **{desc}**\n\
             Diff: `exp diff {seq}` | Trash: `exp trash {seq}`\n\
             {MARKER_END}\n",
            desc = self.description,
            name = self.project_name,
            root = self.project_root.display(),
            seq = self.seq,
        )
    }
}

/// Prepend the note to `{fork_dir}/CLAUDE.md`, creating the file if needed.
pub fn seed(fork_dir: &Path, note: &Note<'_>) -> io::Result<()> {
    let path = fork_dir.join(NOTE_FILE);
    let block = note.render();
    let contents = match std::fs::read_to_string(&path) {
        Ok(existing) => format!("{block}\n{existing}"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => block,
        Err(e) => return Err(e),
    };
    std::fs::write(path, contents)
}

/// Remove the note block from a `CLAUDE.md`.
///
/// Returns whether the file changed. A file left empty is deleted.
pub fn strip(path: &Path) -> io::Result<bool> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let Some(stripped) = strip_block(&text) else {
        return Ok(false);
    };
    if stripped.trim().is_empty() {
        std::fs::remove_file(path)?;
    } else {
        std::fs::write(path, stripped)?;
    }
    Ok(true)
}

fn strip_block(text: &str) -> Option<String> {
    let start = text.find(MARKER_START)?;
    let end = start + text[start..].find(MARKER_END)? + MARKER_END.len();
    let rest = text[end..].trim_start_matches('\n');
    Some(format!("{}{rest}", &text[..start]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn note(seq: &str) -> Note<'_> {
        Note {
            description: "try redis",
            project_name: "my-app",
            project_root: Path::new("/work/my-app"),
            seq,
            from_fork: None,
        }
    }

    #[test]
    fn test_seed_creates_file() {
        let dir = tempdir().unwrap();
        seed(dir.path(), &note("001")).unwrap();
        let text = std::fs::read_to_string(dir.path().join(NOTE_FILE)).unwrap();
        assert!(text.starts_with(MARKER_START));
        assert!(text.contains(MARKER_END));
        assert!(text.contains("try redis"));
        assert!(text.contains("my-app"));
        assert!(text.contains("exp diff 001"));
        assert!(text.contains("exp trash 001"));
    }

    #[test]
    fn test_seed_prepends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(NOTE_FILE);
        std::fs::write(&path, "# Existing Content\n\nHello world.").unwrap();
        seed(dir.path(), &note("002")).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.find(MARKER_START).unwrap() < text.find("# Existing Content").unwrap());
    }

    #[test]
    fn test_lineage_line() {
        let mut n = note("004");
        n.from_fork = Some("002-dark-mode");
        assert!(n.render().contains("Forked from experiment `002-dark-mode`."));
        assert!(!note("004").render().contains("Forked from"));
    }

    #[test]
    fn test_strip_restores_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(NOTE_FILE);
        let original = "# Existing Content\n\nHello world.";
        std::fs::write(&path, original).unwrap();
        seed(dir.path(), &note("002")).unwrap();

        assert!(strip(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
        assert!(!strip(&path).unwrap());
    }

    #[test]
    fn test_strip_removes_note_only_file() {
        let dir = tempdir().unwrap();
        seed(dir.path(), &note("001")).unwrap();
        let path = dir.path().join(NOTE_FILE);
        assert!(strip(&path).unwrap());
        assert!(!path.exists());
        assert!(!strip(&path).unwrap());
    }
}
