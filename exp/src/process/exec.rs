//! Async execution of external primitives (`cp`, `diff`, `mv`, editors).
//!
//! The core only needs the exit outcome and captured output of a command;
//! it never interprets why a primitive failed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// A command to run.
#[derive(Debug, Clone, Default)]
pub struct Exec {
    /// The program to execute.
    pub program: String,

    /// Arguments to pass to the program, kept as OS strings so paths
    /// reach the child byte for byte.
    pub args: Vec<OsString>,

    /// Working directory for the process.
    pub working_dir: Option<PathBuf>,
}

impl Exec {
    /// Create a command for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Outcome of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code; `None` when killed by a signal.
    pub code: Option<i32>,

    /// All stdout lines collected, as raw bytes without the newline.
    pub stdout: Vec<Vec<u8>>,

    /// All stderr lines collected, as raw bytes without the newline.
    pub stderr: Vec<Vec<u8>>,
}

impl ExecOutput {
    /// Check if the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Get stderr as a single string, replacing invalid UTF-8.
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr.join(&b'\n')).into_owned()
    }
}

/// Run a command to completion, capturing stdout and stderr line by line.
///
/// Fails when the process cannot be spawned or waited on, or its output
/// cannot be read.
pub async fn run(exec: &Exec) -> std::io::Result<ExecOutput> {
    let mut cmd = Command::new(&exec.program);
    cmd.args(&exec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref dir) = exec.working_dir {
        cmd.current_dir(dir);
    }

    tracing::debug!(program = %exec.program, args = ?exec.args, "running");
    let mut child = cmd.spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_task = tokio::spawn(read_lines(stdout));
    let stderr_task = tokio::spawn(read_lines(stderr));

    let status = child.wait().await?;
    let stdout = stdout_task.await.map_err(std::io::Error::other)??;
    let stderr = stderr_task.await.map_err(std::io::Error::other)??;

    Ok(ExecOutput {
        code: status.code(),
        stdout,
        stderr,
    })
}

/// Collect newline-separated output without decoding it.
async fn read_lines<R>(pipe: Option<R>) -> std::io::Result<Vec<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    if let Some(pipe) = pipe {
        let mut segments = BufReader::new(pipe).split(b'\n');
        while let Some(line) = segments.next_segment().await? {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Run a command and report only whether it succeeded.
///
/// Spawn failures count as failure.
pub async fn run_ok(exec: &Exec) -> bool {
    match run(exec).await {
        Ok(out) if out.success() => true,
        Ok(out) => {
            tracing::debug!(program = %exec.program, code = ?out.code, stderr = %out.stderr_string(), "command failed");
            false
        }
        Err(e) => {
            tracing::debug!(program = %exec.program, error = %e, "command could not start");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_echo() {
        let out = run(&Exec::new("echo").arg("hello world")).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, vec![b"hello world".to_vec()]);
        assert!(out.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_run_stderr_and_exit_code() {
        let out = run(&Exec::new("sh").args(["-c", "echo oops >&2; exit 2"]))
            .await
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.code, Some(2));
        assert_eq!(out.stderr, vec![b"oops".to_vec()]);
        assert_eq!(out.stderr_string(), "oops");
    }

    #[tokio::test]
    async fn test_run_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let out = run(&Exec::new("ls").working_dir(dir.path())).await.unwrap();
        assert_eq!(out.stdout, vec![b"marker.txt".to_vec()]);
    }

    #[tokio::test]
    async fn test_output_kept_past_invalid_utf8() {
        let out = run(&Exec::new("printf").arg("one\\n\\351\\ntwo\\n")).await.unwrap();
        assert_eq!(out.stdout, vec![b"one".to_vec(), vec![0xe9], b"two".to_vec()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_path_arg_passed_verbatim() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/tmp/caf\xe9"));
        let out = run(&Exec::new("printf").arg("%s").path_arg(path)).await.unwrap();
        assert_eq!(out.stdout, vec![b"/tmp/caf\xe9".to_vec()]);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        assert!(run(&Exec::new("nonexistent_command_12345")).await.is_err());
        assert!(!run_ok(&Exec::new("nonexistent_command_12345")).await);
    }
}
