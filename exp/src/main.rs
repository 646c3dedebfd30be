//! exp - instant project forking.
//!
//! Clones the current project into a numbered sibling directory using the
//! cheapest copy the filesystem offers, so side quests never touch the
//! original tree.
//!
//! Layout:
//! - `clone`: copy-on-write cascade behind the `TreeCloner` seam
//! - `names`, `store`, `resolve`: fork naming, `.exp` sidecar, ID lookup
//! - `context`, `project`: where a command runs and which collection it uses
//! - `divergence`: what a fork changed, behind the `TreeDiffer` seam
//! - `fork`, `snapshot`, `notes`: lifecycle operations
//! - `cli`: argument parsing and command output

mod cli;
mod clone;
mod config;
mod context;
mod divergence;
mod error;
mod fork;
mod format;
mod models;
mod names;
mod notes;
mod process;
mod project;
mod resolve;
mod snapshot;
mod store;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{execute, Cli};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_logging(cli.verbose || config.debug);
    execute(cli, &config).await
}

/// Log to stderr; `RUST_LOG` overrides the verbosity flag.
fn init_logging(verbose: bool) {
    let default = if verbose { "warn,exp=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
