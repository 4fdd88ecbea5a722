//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hookgate", version, about = "Webhook intake and relay gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway (default when no subcommand is given).
    Serve {
        /// Path to the gateway config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_with_config_path() {
        let cli = Cli::parse_from(["hookgate", "serve", "--config", "/etc/hookgate.json"]);
        match cli.command {
            Some(Command::Serve { config }) => {
                assert_eq!(config, Some(PathBuf::from("/etc/hookgate.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_is_accepted() {
        let cli = Cli::parse_from(["hookgate"]);
        assert!(cli.command.is_none());
    }
}
