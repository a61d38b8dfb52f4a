//! Command line interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "pingplot", version, about = "Rolling ping latency monitor")]
pub struct Cli {
    /// Settings file [default: $PINGPLOT_SETTINGS, then ./settings.txt]
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Probe every configured host and redraw the latency table (default)
    Run(RunArgs),
    /// Add a host to the settings file
    Add { address: String },
    /// Remove a host from the settings file, by address or by index from `list`
    Remove { target: String },
    /// Print the configured hosts with their indexes
    List,
}

impl Default for Command {
    fn default() -> Self {
        Command::Run(RunArgs::default())
    }
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Samples shown per host, newest first
    #[arg(long, default_value_t = 15)]
    pub columns: usize,

    /// Redraw interval
    #[arg(long, default_value = "500ms", value_parser = humantime::parse_duration)]
    pub refresh: Duration,

    /// Print one JSON document per refresh instead of the table
    #[arg(long)]
    pub json: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            columns: 15,
            refresh: Duration::from_millis(500),
            json: false,
        }
    }
}

/// What `remove` points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveTarget {
    Index(usize),
    Address(String),
}

impl RemoveTarget {
    /// A bare number is an index; anything else is an address.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<usize>() {
            Ok(index) => RemoveTarget::Index(index),
            Err(_) => RemoveTarget::Address(raw.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["pingplot"]).unwrap();
        assert!(cli.command.is_none());
        assert!(matches!(cli.command.unwrap_or_default(), Command::Run(args) if args.columns == 15));
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from(["pingplot", "run", "--columns", "30", "--refresh", "2s", "--json"]).unwrap();
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.columns, 30);
        assert_eq!(args.refresh, Duration::from_secs(2));
        assert!(args.json);
    }

    #[test]
    fn test_global_settings_flag() {
        let cli = Cli::try_parse_from(["pingplot", "list", "--settings", "/tmp/s.txt"]).unwrap();
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.txt")));
    }

    #[test]
    fn test_remove_target() {
        assert_eq!(RemoveTarget::parse("2"), RemoveTarget::Index(2));
        assert_eq!(RemoveTarget::parse(" example.test "), RemoveTarget::Address("example.test".into()));
        assert_eq!(RemoveTarget::parse("10.0.0.1"), RemoveTarget::Address("10.0.0.1".into()));
    }
}
