//! Command-line arguments for the collection sync binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use engine_logging::{LogDestination, DEFAULT_LOG_FILE};
use log::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogTarget {
    Terminal,
    File,
    Both,
}

/// Syncs a saved-notes collection page into a local JSON store.
#[derive(Debug, Parser)]
#[command(name = "collection-sync")]
#[command(version)]
pub(crate) struct Cli {
    /// Page to sync from; defaults to the collection url in the settings
    #[arg(long)]
    pub url: Option<String>,

    /// RON settings file; missing file means defaults
    #[arg(short, long, default_value = "sync_settings.ron")]
    pub settings: PathBuf,

    /// Directory holding the record store
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// Cookie header to send, e.g. copied from a logged-in browser session
    #[arg(long)]
    pub cookie: Option<String>,

    /// Where log lines go
    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,

    /// Log file used by `--log file|both`
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the effective settings as RON and exit
    #[arg(long)]
    pub print_settings: bool,
}

impl Cli {
    pub(crate) fn log_destination(&self) -> LogDestination {
        match self.log {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File(self.log_file.clone()),
            LogTarget::Both => LogDestination::Both(self.log_file.clone()),
        }
    }

    pub(crate) fn level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_log_to_terminal_at_info() {
        let cli = Cli::parse_from(["collection-sync"]);
        assert_eq!(cli.log_destination(), LogDestination::Terminal);
        assert_eq!(cli.level(), LevelFilter::Info);
        assert_eq!(cli.output, PathBuf::from("output"));
        assert!(cli.url.is_none());
    }

    #[test]
    fn file_logging_uses_the_given_path() {
        let cli = Cli::parse_from([
            "collection-sync",
            "--log",
            "both",
            "--log-file",
            "run.log",
            "-v",
            "--cookie",
            "web_session=abc",
        ]);
        assert_eq!(
            cli.log_destination(),
            LogDestination::Both(PathBuf::from("run.log"))
        );
        assert_eq!(cli.level(), LevelFilter::Debug);
        assert_eq!(cli.cookie.as_deref(), Some("web_session=abc"));
    }
}
