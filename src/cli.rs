use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oldest-watch")]
#[command(about = "Track the world's oldest living person and announce confirmed changes", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    /// JSON config file (missing file = defaults)
    #[arg(long, global = true, default_value = "oldest-watch.json")]
    pub(crate) config: PathBuf,

    /// History database path (overrides config and OLDEST_DB_PATH)
    #[arg(long, global = true)]
    pub(crate) db: Option<PathBuf>,

    /// Debug-level logging unless OLDEST_LOG is set
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Perform one observation run and exit.
    Run {
        /// Print the run report as JSON.
        #[arg(long)]
        json: bool,
        /// Decide, but do not write history or send anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Observe on a fixed interval until stopped.
    Watch {
        /// Stop after this many runs (0 = forever).
        #[arg(long, default_value_t = 0)]
        max_runs: u64,
        /// Override the poll interval in minutes.
        #[arg(long)]
        interval_minutes: Option<u64>,
    },

    /// List every birth date seen as the current oldest.
    History {
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create the history database if it does not exist.
    Init,

    /// Fetch and print the current top candidate without touching history.
    CheckSource {
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from(["oldest-watch", "run", "--dry-run", "--db", "/tmp/h.sqlite"])
            .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/h.sqlite")));
        assert!(matches!(cli.command, Command::Run { json: false, dry_run: true }));
    }

    #[test]
    fn test_parse_watch_defaults() {
        let cli = Cli::try_parse_from(["oldest-watch", "watch"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("oldest-watch.json"));
        assert!(matches!(
            cli.command,
            Command::Watch { max_runs: 0, interval_minutes: None }
        ));
    }

    #[test]
    fn test_command_is_required() {
        assert!(Cli::try_parse_from(["oldest-watch"]).is_err());
    }
}
