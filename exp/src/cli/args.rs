//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};

/// exp - instant project forking via copy-on-write clones
#[derive(Parser, Debug)]
#[command(name = "exp")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "IDs: a number (1), a full name (001-try-redis), or part of a name (redis).")]
pub struct Cli {
    /// Show debug logging (paths, clone method, timings)
    #[arg(long, global = true, visible_alias = "debug")]
    pub verbose: bool,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fork the current project (or the fork you are in)
    #[command(visible_alias = "n")]
    New {
        /// Why you are forking; becomes the fork's name
        description: Vec<String>,

        /// Clone an existing fork instead
        #[arg(long, value_name = "ID")]
        from: Option<String>,
    },

    /// List forks
    #[command(visible_aliases = ["list", "l"])]
    Ls {
        /// Include divergence from the original
        #[arg(long)]
        detail: bool,
    },

    /// What changed in a fork vs the original
    #[command(visible_alias = "d")]
    Diff {
        /// Fork ID
        id: String,
    },

    /// Delete a fork
    #[command(visible_aliases = ["rm", "t"])]
    Trash {
        /// Fork ID
        id: String,

        /// Skip confirmation
        #[arg(short, long, short_alias = 'y', alias = "yes")]
        force: bool,
    },

    /// Delete every fork of this project
    Nuke {
        /// Skip confirmation
        #[arg(short, long, short_alias = 'y', alias = "yes")]
        force: bool,
    },

    /// Print a fork's path (use: cd $(exp cd 3))
    Cd {
        /// Fork ID
        id: String,
    },

    /// Print the original project path from inside a fork
    #[command(visible_alias = "h")]
    Home,

    /// Project and fork info
    #[command(visible_alias = "st")]
    Status,

    /// Open a fork in your editor
    #[command(visible_alias = "o")]
    Open {
        /// Fork ID
        id: String,
    },

    /// Replace the original project with a fork
    Promote {
        /// Fork ID
        id: String,

        /// Skip confirmation
        #[arg(short, long, short_alias = 'y', alias = "yes")]
        force: bool,
    },

    /// Snapshot a fork, or list and restore its snapshots
    Snap(SnapArgs),

    /// Remove session export files from the original project
    #[command(visible_alias = "ce")]
    CleanExport,
}

/// `exp snap <ID> <DESCRIPTION>...` unless a subcommand is given.
#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct SnapArgs {
    #[command(subcommand)]
    pub action: Option<SnapAction>,

    /// Fork ID to snapshot
    pub id: Option<String>,

    /// What this snapshot captures
    pub description: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum SnapAction {
    /// List a fork's snapshots
    List {
        /// Fork ID
        id: String,
    },

    /// Restore a fork from a snapshot (backs up the fork first)
    Restore {
        /// Fork ID
        id: String,

        /// Snapshot name or part of one
        snap: String,

        /// Skip confirmation
        #[arg(short, long, short_alias = 'y', alias = "yes")]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_new_with_from() {
        let cli = Cli::try_parse_from(["exp", "new", "try", "variant", "--from", "1"]).unwrap();
        match cli.command {
            Some(Commands::New { description, from }) => {
                assert_eq!(description, vec!["try", "variant"]);
                assert_eq!(from.as_deref(), Some("1"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_from_first() {
        let cli = Cli::try_parse_from(["exp", "n", "--from", "redis", "try", "variant"]).unwrap();
        match cli.command {
            Some(Commands::New { description, from }) => {
                assert_eq!(description, vec!["try", "variant"]);
                assert_eq!(from.as_deref(), Some("redis"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_trash_aliases() {
        for argv in [["exp", "rm", "3", "-y"], ["exp", "t", "3", "--force"]] {
            let cli = Cli::try_parse_from(argv).unwrap();
            assert!(matches!(cli.command, Some(Commands::Trash { force: true, .. })));
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["exp", "ls", "--detail", "--json", "--verbose"]).unwrap();
        assert!(cli.json);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Ls { detail: true })));
    }

    #[test]
    fn test_snap_forms() {
        let cli = Cli::try_parse_from(["exp", "snap", "2", "before", "refactor"]).unwrap();
        let Some(Commands::Snap(args)) = cli.command else {
            panic!("expected snap");
        };
        assert!(args.action.is_none());
        assert_eq!(args.id.as_deref(), Some("2"));
        assert_eq!(args.description, vec!["before", "refactor"]);

        let cli = Cli::try_parse_from(["exp", "snap", "list", "2"]).unwrap();
        let Some(Commands::Snap(args)) = cli.command else {
            panic!("expected snap");
        };
        assert!(matches!(args.action, Some(SnapAction::List { .. })));

        let cli = Cli::try_parse_from(["exp", "snap", "restore", "2", "before"]).unwrap();
        let Some(Commands::Snap(args)) = cli.command else {
            panic!("expected snap");
        };
        assert!(matches!(
            args.action,
            Some(SnapAction::Restore { force: false, .. })
        ));
    }
}
