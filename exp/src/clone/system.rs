//! Cascade levels backed by the host system.

use std::path::Path;

use super::{native, TreeCloner};
use crate::process::{run_ok, Exec};

/// Clones with `clonefile(2)` where present, then `cp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCloner;

impl TreeCloner for SystemCloner {
    async fn atomic_clone(&self, source: &Path, dest: &Path) -> bool {
        if !native::available() {
            return false;
        }
        let (source, dest) = (source.to_path_buf(), dest.to_path_buf());
        tokio::task::spawn_blocking(move || native::clone_tree(&source, &dest))
            .await
            .unwrap_or(false)
    }

    async fn cow_copy(&self, source: &Path, dest: &Path) -> bool {
        let Some(exec) = cow_copy_command() else {
            return false;
        };
        run_ok(&exec.path_arg(source).path_arg(dest)).await
    }

    async fn plain_copy(&self, source: &Path, dest: &Path) -> bool {
        run_ok(&Exec::new("cp").arg("-R").path_arg(source).path_arg(dest)).await
    }
}

#[cfg(target_os = "macos")]
fn cow_copy_command() -> Option<Exec> {
    Some(Exec::new("/bin/cp").arg("-cR"))
}

#[cfg(target_os = "linux")]
fn cow_copy_command() -> Option<Exec> {
    Some(Exec::new("cp").args(["-R", "--reflink=always"]))
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
const fn cow_copy_command() -> Option<Exec> {
    None
}
