//! Runtime configuration.
//!
//! Built once at startup from `~/.config/exp` and `EXP_*` environment
//! variables, then passed by reference to everything that needs it.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Explicit configuration for every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Custom root for fork collections (`{root}/{project}` instead of `.exp-{project}`).
    pub root: Option<PathBuf>,
    /// Editor command used by `exp open`.
    pub open_editor: Option<String>,
    /// Directory names removed from a fork right after cloning.
    pub clean: Vec<String>,
    /// Whether new forks get an agent note prepended to `CLAUDE.md`.
    pub seed_notes: bool,
    /// File the shell wrapper reads to `cd` after a command.
    pub cd_file: Option<PathBuf>,
    /// Debug logging requested through the environment.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            open_editor: None,
            clean: Vec::new(),
            seed_notes: true,
            cd_file: None,
            debug: false,
        }
    }
}

impl Config {
    /// Load from the config file and the process environment.
    pub fn load() -> Result<Self> {
        let file_text = match Self::file_path() {
            Some(path) if path.is_file() => std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?,
            _ => String::new(),
        };
        Ok(Self::from_sources(&file_text, |key| std::env::var(key).ok()))
    }

    /// Location of the key=value config file.
    pub fn file_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".config").join("exp"))
    }

    /// Build a config from file contents and an environment lookup.
    ///
    /// Environment values win over file values; empty values count as unset.
    pub fn from_sources<F>(file_text: &str, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = parse_file(file_text);
        let get = |key: &str, var: &str| -> Option<String> {
            env(var)
                .filter(|v| !v.is_empty())
                .or_else(|| file.get(key).cloned().filter(|v| !v.is_empty()))
        };

        let defaults = Self::default();
        Self {
            root: get("root", "EXP_ROOT").map(PathBuf::from),
            open_editor: get("open_editor", "EXP_OPEN_EDITOR"),
            clean: get("clean", "EXP_CLEAN")
                .map(|v| v.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            seed_notes: get("seed_notes", "EXP_SEED_NOTES")
                .map_or(defaults.seed_notes, |v| parse_bool(&v)),
            cd_file: env("EXP_CD_FILE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            debug: env("EXP_DEBUG").is_some_and(|v| v == "1"),
        }
    }
}

fn parse_file(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
