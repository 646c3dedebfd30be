//! Command implementations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::CommandFactory;
use serde::Serialize;

use super::args::{Cli, Commands, SnapAction, SnapArgs};
use super::prompt;
use crate::clone::SystemCloner;
use crate::config::Config;
use crate::context::ForkContext;
use crate::divergence::{self, ChangeKind, DiffTool, Divergence};
use crate::fork::{self, CreatedFork, NewFork};
use crate::format::{format_bytes, time_ago, truncate};
use crate::models::{ForkMetadata, ForkStatus};
use crate::names::description_matches_slug;
use crate::process::{run, Exec};
use crate::project::Workspace;
use crate::resolve::require;
use crate::snapshot;

const DESCRIPTION_WIDTH: usize = 40;

/// Output mode shared by every command.
#[derive(Debug, Clone, Copy)]
struct Output {
    json: bool,
}

// === Command Execution ===

pub async fn execute(cli: Cli, config: &Config) -> Result<()> {
    let out = Output { json: cli.json };
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let ws = Workspace::locate(&cwd, config);
    tracing::debug!(root = %ws.root.display(), collection = %ws.collection.display(), "workspace");

    match cli.command {
        Some(Commands::New { description, from }) => {
            new_fork(&ws, config, &description.join(" "), from.as_deref(), out).await
        }
        Some(Commands::Ls { detail }) => list_forks(&ws, detail, out).await,
        Some(Commands::Diff { id }) => diff_fork(&ws, &id, out).await,
        Some(Commands::Trash { id, force }) => trash_fork(&ws, config, &id, force, out),
        Some(Commands::Nuke { force }) => nuke(&ws, force, out),
        Some(Commands::Cd { id }) => cd_fork(&ws, config, &id),
        Some(Commands::Home) => home(&ws, config),
        Some(Commands::Status) => status(&ws, out),
        Some(Commands::Open { id }) => open_fork(&ws, config, &id).await,
        Some(Commands::Promote { id, force }) => promote_fork(&ws, config, &id, force, out).await,
        Some(Commands::Snap(args)) => snap(&ws, args, out).await,
        Some(Commands::CleanExport) => clean_export(&ws, out),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

// === Helpers ===

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Hand a directory to the shell wrapper, if one is active.
fn write_cd_target(config: &Config, dir: &Path) -> Result<bool> {
    let Some(ref file) = config.cd_file else {
        return Ok(false);
    };
    std::fs::write(file, dir.to_string_lossy().as_bytes())
        .with_context(|| format!("Failed to write cd target to {}", file.display()))?;
    Ok(true)
}

fn fork_label(dir: &Path) -> String {
    dir.file_name()
        .map_or_else(|| dir.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Resolve a fork ID for a command that acts on it.
fn target(ws: &Workspace, id: &str) -> Result<PathBuf> {
    require(id, &ws.collection).with_context(|| format!("No fork matching '{id}' for {}", ws.name))
}

/// Ask before a destructive step. Refuses when nobody can answer.
fn confirm_or_refuse(question: &str, force: bool, out: Output) -> Result<bool> {
    if force {
        return Ok(true);
    }
    if out.json || !prompt::is_interactive() {
        bail!("Refusing without confirmation on non-interactive input. Re-run with --force.");
    }
    let yes = prompt::confirm(question)?;
    if !yes {
        eprintln!("Cancelled.");
    }
    Ok(yes)
}

async fn launch_editor(editor: &str, dir: &Path) -> Result<()> {
    let out = run(&Exec::new(editor).path_arg(dir).working_dir(dir))
        .await
        .with_context(|| format!("Failed to launch editor '{editor}'"))?;
    if !out.success() {
        bail!("{editor} exited with {:?}: {}", out.code, out.stderr_string());
    }
    Ok(())
}

// === Commands ===

async fn new_fork(ws: &Workspace, config: &Config, description: &str, from: Option<&str>, out: Output) -> Result<()> {
    let request = NewFork { description, from };
    let created = match fork::create_fork(ws, config, &request, &SystemCloner).await {
        Ok(created) => created,
        Err(e) if e.is_not_found() => bail!("No fork matching --from '{}' for {}", from.unwrap_or_default(), ws.name),
        Err(e) => return Err(e).with_context(|| format!("Failed to fork {}", ws.name)),
    };

    write_cd_target(config, &created.dir)?;

    if out.json {
        print_json(&created)?;
    } else {
        print_created(ws, &created);
    }

    if let Some(ref editor) = config.open_editor {
        if let Err(e) = launch_editor(editor, &created.dir).await {
            tracing::warn!(error = %e, "editor not opened");
        }
    }
    Ok(())
}

fn print_created(ws: &Workspace, created: &CreatedFork) {
    println!(
        "Cloned {} -> {} ({})",
        fork_label(&created.source),
        created.name,
        created.method.describe()
    );
    println!("  source: {}", created.source.display());
    println!("  fork:   {}", created.dir.display());
    for dir in &created.cleaned {
        println!("  cleaned {dir}");
    }
    if !created.method.is_copy_on_write() {
        println!("Copy-on-write is not available here; the fork uses full disk space.");
    }

    let web_project = ["package.json", "next.config.js", "next.config.mjs", "next.config.ts"]
        .iter()
        .any(|f| ws.root.join(f).exists());
    if web_project {
        println!("If a dev server is running, the fork may need a different port (e.g. PORT=3001).");
    }

    println!();
    let seq = &created.seq;
    println!("  exp diff {seq} · exp promote {seq} · exp trash {seq}");
    println!("Ready: cd '{}'", created.dir.display());
}

#[derive(Serialize)]
struct ForkRow<'a> {
    name: &'a str,
    path: &'a Path,
    description: Option<&'a str>,
    number: Option<u64>,
    created: Option<DateTime<Utc>>,
    status: Option<ForkStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    divergence: Option<&'a Divergence>,
}

async fn list_forks(ws: &Workspace, detail: bool, out: Output) -> Result<()> {
    let forks = fork::list_forks(&ws.collection);

    let divergences: Vec<Option<Divergence>> = if detail {
        let entries = forks
            .iter()
            .map(|f| (f.name.clone(), ws.root.clone(), f.dir.clone()))
            .collect();
        let mut by_name: HashMap<String, Divergence> = divergence::divergence_all(Arc::new(DiffTool), entries)
            .await
            .into_iter()
            .collect();
        forks
            .iter()
            .map(|f| Some(by_name.remove(&f.name).unwrap_or(Divergence::Unknown)))
            .collect()
    } else {
        vec![None; forks.len()]
    };

    if out.json {
        let rows: Vec<ForkRow<'_>> = forks
            .iter()
            .zip(&divergences)
            .map(|(f, d)| ForkRow {
                name: &f.name,
                path: &f.dir,
                description: f.meta.as_ref().map(|m| m.description.as_str()),
                number: f.meta.as_ref().map(|m| m.number),
                created: f.meta.as_ref().map(|m| m.created),
                status: f.meta.as_ref().and_then(|m| m.status),
                divergence: d.as_ref(),
            })
            .collect();
        return print_json(&rows);
    }

    if forks.is_empty() {
        println!("No forks for {}. Run: exp new \"my idea\"", ws.name);
        return Ok(());
    }

    let now = Utc::now();
    let name_width = forks.iter().map(|f| f.name.len()).max().unwrap_or(0);
    let current = ws.context.fork().map(|c| c.fork_dir.as_path());

    println!("Forks of {}", ws.name);
    println!();
    for (f, d) in forks.iter().zip(&divergences) {
        let marker = if current == Some(f.dir.as_path()) { '*' } else { ' ' };
        let description = f
            .meta
            .as_ref()
            .filter(|m| !description_matches_slug(&m.description, &f.name))
            .map(|m| truncate(&m.description, DESCRIPTION_WIDTH))
            .unwrap_or_default();
        let age = f
            .meta
            .as_ref()
            .map_or_else(|| "?".to_string(), |m| time_ago(m.created, now));

        let mut line = format!(
            "{marker} {:<name_width$}  {:<desc_width$}  {:<9}",
            f.name,
            description,
            age,
            desc_width = DESCRIPTION_WIDTH
        );
        match d.as_ref().map(Divergence::report) {
            Some(Some(report)) if report.is_empty() => line.push_str("  identical"),
            Some(Some(report)) => line.push_str(&format!(
                "  {} changed  {}",
                report.changes.len(),
                format_bytes(report.extra_bytes)
            )),
            Some(None) => line.push_str("  unknown"),
            None => {}
        }
        if f.meta.as_ref().is_some_and(ForkMetadata::is_trashed) {
            line.push_str(&format!("  [{}]", ForkStatus::Trashed));
        }
        println!("{}", line.trim_end());
    }
    Ok(())
}

async fn diff_fork(ws: &Workspace, id: &str, out: Output) -> Result<()> {
    let dir = target(ws, id)?;
    let report = divergence::compute(&DiffTool, &ws.root, &dir)
        .await
        .with_context(|| format!("Could not compare {} with {}", fork_label(&dir), ws.name))?;

    if out.json {
        return print_json(&report);
    }

    println!("Diff: {} <-> {}", ws.name, fork_label(&dir));
    println!();
    if report.is_empty() {
        println!("  No differences found.");
    } else {
        for change in &report.changes {
            println!("  {} {}", change.kind.marker(), change.path.display());
        }
        println!();
        println!(
            "  {} added, {} removed, {} modified ({} extra)",
            report.count(ChangeKind::Added),
            report.count(ChangeKind::Removed),
            report.count(ChangeKind::Modified),
            format_bytes(report.extra_bytes)
        );
    }
    println!();
    println!(
        "Full: diff -r '{}' '{}' --exclude=node_modules --exclude=.git",
        ws.root.display(),
        dir.display()
    );
    Ok(())
}

fn trash_fork(ws: &Workspace, config: &Config, id: &str, force: bool, out: Output) -> Result<()> {
    let dir = target(ws, id)?;
    let name = fork_label(&dir);
    let size = format_bytes(fork::dir_size(&dir));

    if !confirm_or_refuse(&format!("Delete {name}? ({size})"), force, out)? {
        return Ok(());
    }

    fork::remove_fork(&dir).with_context(|| format!("Failed to trash {name}"))?;
    if ws.context.fork().is_some_and(|f| f.fork_dir == dir) {
        write_cd_target(config, &ws.root)?;
    }

    if out.json {
        print_json(&serde_json::json!({ "trashed": name, "path": dir }))
    } else {
        println!("Trashed {name}");
        Ok(())
    }
}

fn nuke(ws: &Workspace, force: bool, out: Output) -> Result<()> {
    if !ws.collection.exists() {
        println!("No forks for {}", ws.name);
        return Ok(());
    }

    if !force {
        if out.json || !prompt::is_interactive() {
            bail!("exp nuke requires interactive confirmation. To delete single forks from scripts, use: exp trash <id> --force");
        }
        let count = fork::list_forks(&ws.collection).len();
        let size = format_bytes(fork::dir_size(&ws.collection));
        eprintln!("Delete ALL {count} forks for {}? ({size})", ws.name);
        if prompt::ask("Type project name to confirm:")? != ws.name {
            eprintln!("Cancelled.");
            return Ok(());
        }
    }

    let removed = fork::remove_collection(&ws.collection)
        .with_context(|| format!("Failed to delete {}", ws.collection.display()))?;
    if out.json {
        print_json(&serde_json::json!({ "removed": removed, "collection": ws.collection }))
    } else {
        println!("Nuked {removed} forks for {}", ws.name);
        Ok(())
    }
}

fn cd_fork(ws: &Workspace, config: &Config, id: &str) -> Result<()> {
    let dir = target(ws, id)?;
    write_cd_target(config, &dir)?;
    println!("{}", dir.display());
    Ok(())
}

fn home(ws: &Workspace, config: &Config) -> Result<()> {
    if !ws.context.is_fork() {
        eprintln!("Already at project root.");
        return Ok(());
    }
    write_cd_target(config, &ws.root)?;
    println!("{}", ws.root.display());
    Ok(())
}

#[derive(Serialize)]
struct StatusReport<'a> {
    project: &'a str,
    root: &'a Path,
    collection: &'a Path,
    forks: usize,
    size_bytes: u64,
    current_fork: Option<&'a ForkContext>,
    exports: usize,
}

fn status(ws: &Workspace, out: Output) -> Result<()> {
    let forks = fork::list_forks(&ws.collection).len();
    let size_bytes = if forks > 0 { fork::dir_size(&ws.collection) } else { 0 };
    let report = StatusReport {
        project: &ws.name,
        root: &ws.root,
        collection: &ws.collection,
        forks,
        size_bytes,
        current_fork: ws.context.fork(),
        exports: fork::session_exports(&ws.root).len(),
    };

    if out.json {
        return print_json(&report);
    }

    println!("Project:  {}", report.project);
    println!("Root:     {}", report.root.display());
    println!("Exp dir:  {}", report.collection.display());
    if forks > 0 {
        println!("Active:   {forks} forks ({})", format_bytes(size_bytes));
    } else {
        println!("Active:   0");
    }
    if let Some(fork) = report.current_fork {
        println!("In fork:  {} ({})", fork.name, fork.description);
    }
    if report.exports > 0 {
        println!("Exports:  {} session export(s) in project root", report.exports);
    }
    Ok(())
}

async fn open_fork(ws: &Workspace, config: &Config, id: &str) -> Result<()> {
    let dir = target(ws, id)?;
    match config.open_editor {
        Some(ref editor) => launch_editor(editor, &dir).await?,
        None => open::that_detached(&dir).with_context(|| format!("Failed to open {}", dir.display()))?,
    }
    println!("Opened {}", fork_label(&dir));
    Ok(())
}

async fn promote_fork(ws: &Workspace, config: &Config, id: &str, force: bool, out: Output) -> Result<()> {
    let dir = target(ws, id)?;
    let name = fork_label(&dir);
    let question = format!(
        "Promote {name} -> {}? The original is backed up to {}.",
        ws.name,
        ws.collection.display()
    );
    if !confirm_or_refuse(&question, force, out)? {
        return Ok(());
    }

    let backup = fork::promote(ws, &dir)
        .await
        .with_context(|| format!("Failed to promote {name}"))?;
    if ws.context.is_fork() {
        write_cd_target(config, &ws.root)?;
    }

    if out.json {
        print_json(&serde_json::json!({ "promoted": name, "root": ws.root, "backup": backup }))
    } else {
        println!("Promoted {name}. Backup: {}", backup.display());
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapRow<'a> {
    name: &'a str,
    path: &'a Path,
    description: Option<&'a str>,
    created: Option<DateTime<Utc>>,
}

async fn snap(ws: &Workspace, args: SnapArgs, out: Output) -> Result<()> {
    match args.action {
        Some(SnapAction::List { id }) => snap_list(ws, &id, out),
        Some(SnapAction::Restore { id, snap, force }) => snap_restore(ws, &id, &snap, force, out).await,
        None => {
            let Some(id) = args.id else {
                bail!("Usage: exp snap <id> <description>, exp snap list <id>, exp snap restore <id> <snap>");
            };
            let description = args.description.join(" ");
            if description.trim().is_empty() {
                bail!("A description is required: exp snap {id} \"what this captures\"");
            }
            snap_create(ws, &id, &description, out).await
        }
    }
}

async fn snap_create(ws: &Workspace, id: &str, description: &str, out: Output) -> Result<()> {
    let dir = target(ws, id)?;
    let name = fork_label(&dir);
    let (snap, method) = snapshot::create(&SystemCloner, &ws.collection, &dir, description)
        .await
        .with_context(|| format!("Failed to snapshot {name}"))?;

    if out.json {
        return print_json(&SnapRow {
            name: &snap.name,
            path: &snap.dir,
            description: Some(description),
            created: snap.meta.as_ref().map(|m| m.created),
        });
    }
    println!("Snapshot {} of {name} created ({})", snap.name, method.describe());
    println!("  exp snap list {name} · exp snap restore {name} {}", snap.name);
    Ok(())
}

fn snap_list(ws: &Workspace, id: &str, out: Output) -> Result<()> {
    let dir = target(ws, id)?;
    let name = fork_label(&dir);
    let snaps = snapshot::list(&ws.collection, &name);

    if out.json {
        let rows: Vec<SnapRow<'_>> = snaps
            .iter()
            .map(|s| SnapRow {
                name: &s.name,
                path: &s.dir,
                description: s.meta.as_ref().map(|m| m.description.as_str()),
                created: s.meta.as_ref().map(|m| m.created),
            })
            .collect();
        return print_json(&rows);
    }

    if snaps.is_empty() {
        println!("No snapshots for {name}. Run: exp snap {name} \"description\"");
        return Ok(());
    }

    let now = Utc::now();
    let name_width = snaps.iter().map(|s| s.name.len()).max().unwrap_or(0);
    println!("Snapshots of {name}");
    println!();
    for s in &snaps {
        let description = s.meta.as_ref().map_or("", |m| m.description.as_str());
        let age = s
            .meta
            .as_ref()
            .map_or_else(|| "?".to_string(), |m| time_ago(m.created, now));
        println!(
            "  {:<name_width$}  {:<desc_width$}  {age}",
            s.name,
            truncate(description, DESCRIPTION_WIDTH),
            desc_width = DESCRIPTION_WIDTH
        );
    }
    Ok(())
}

async fn snap_restore(ws: &Workspace, id: &str, query: &str, force: bool, out: Output) -> Result<()> {
    let dir = target(ws, id)?;
    let name = fork_label(&dir);
    let Some(snap) = snapshot::resolve(&ws.collection, &name, query) else {
        bail!("Snapshot not found: {query}. Run: exp snap list {name}");
    };

    let question = format!(
        "Restore {name} from snapshot {}? A backup snapshot is taken first.",
        snap.name
    );
    if !confirm_or_refuse(&question, force, out)? {
        return Ok(());
    }

    let backup = snapshot::restore(&SystemCloner, &ws.collection, &dir, &snap)
        .await
        .with_context(|| {
            format!(
                "Failed to restore {name}; backups are in {}",
                snapshot::snapshots_dir(&ws.collection, &name).display()
            )
        })?;

    if out.json {
        print_json(&serde_json::json!({ "restored": name, "snapshot": snap.name, "backup": backup.name }))
    } else {
        println!("Restored {name} from {}. Backup saved as {}", snap.name, backup.name);
        Ok(())
    }
}

fn clean_export(ws: &Workspace, out: Output) -> Result<()> {
    let removed = fork::clean_exports(&ws.root).context("Failed to remove session exports")?;
    if out.json {
        return print_json(&removed);
    }
    if removed.is_empty() {
        println!("No export files found in project root");
    }
    for path in &removed {
        println!("Removed {} from original", fork_label(path));
    }
    Ok(())
}
