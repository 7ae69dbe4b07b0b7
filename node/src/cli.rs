//! # CLI Interface
//!
//! Defines the command-line argument structure for `trustline-node` using
//! `clap` derive. Two subcommands: `run` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Trustline ledger node.
///
/// Hosts a credit-line registry behind a JSON API and a WebSocket event
/// feed, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "trustline-node",
    about = "Trustline ledger node",
    version,
    propagate_version = true
)]
pub struct TrustlineNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
///
/// Unset options fall back to the config file, then to built-in defaults.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (TOML).
    ///
    /// When omitted, the node looks for `config.toml` in the data directory.
    #[arg(long, short = 'c', env = "TRUSTLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the ledger database.
    #[arg(long, short = 'd', env = "TRUSTLINE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Port for the JSON and WebSocket API.
    #[arg(long, short = 'p', env = "TRUSTLINE_PORT")]
    pub port: Option<u16>,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TRUSTLINE_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Keep the ledger in memory only. Everything is lost on exit.
    #[arg(long, env = "TRUSTLINE_IN_MEMORY")]
    pub in_memory: bool,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "TRUSTLINE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        TrustlineNodeCli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = TrustlineNodeCli::try_parse_from([
            "trustline-node",
            "run",
            "--port",
            "8080",
            "--in-memory",
            "--log-format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.port, Some(8080));
                assert!(args.in_memory);
                assert_eq!(args.log_format, "json");
                assert!(args.metrics_port.is_none());
            }
            Commands::Version => panic!("expected run"),
        }
    }
}
