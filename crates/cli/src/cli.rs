//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Ingest Dispatch - fans ingested items out to storage backends
#[derive(Parser, Debug)]
#[command(
    name = "ingest-dispatch",
    author,
    version,
    about = "Item ingestion and storage dispatch pipeline",
    long_about = "Queues items produced by content sources and dispatches them to every \n\
                  configured storage backend (Redis pub/sub, JSON-lines files, log).\n\n\
                  Backends are resolved by selector; a dead backend never blocks the others."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "INGEST_DISPATCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "INGEST_DISPATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingestion pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "ingest.toml",
        env = "INGEST_DISPATCH_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON-lines file of items to ingest (repeatable)
    #[arg(short, long = "input", env = "INGEST_DISPATCH_INPUT", value_delimiter = ',')]
    pub inputs: Vec<PathBuf>,

    /// Re-poll inputs every N seconds for appended lines (0 = poll once)
    #[arg(long, default_value = "0", env = "INGEST_DISPATCH_POLL_INTERVAL")]
    pub poll_interval: u64,

    /// Stop once the inputs are consumed and the queue is drained
    #[arg(long)]
    pub exit_when_drained: bool,

    /// Override the number of consumers from configuration
    #[arg(long, env = "INGEST_DISPATCH_CONSUMERS")]
    pub consumers: Option<usize>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "INGEST_DISPATCH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "ingest.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "ingest.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show backend parameters
    #[arg(long)]
    pub params: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_args() {
        let cli = Cli::parse_from([
            "ingest-dispatch",
            "-v",
            "run",
            "--config",
            "custom.toml",
            "--input",
            "a.jsonl,b.jsonl",
            "--exit-when-drained",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("custom.toml"));
                assert_eq!(args.inputs.len(), 2);
                assert!(args.exit_when_drained);
                assert_eq!(args.poll_interval, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["ingest-dispatch", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }
}
