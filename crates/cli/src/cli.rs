//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Serial Broadcast - serial device detection and message dispatch
#[derive(Parser, Debug)]
#[command(
    name = "serial-broadcast",
    author,
    version,
    about = "Serial device auto-detection and message broadcast",
    long_about = "Finds the serial port a device is attached to by racing reads across \n\
                  candidate ports, then splits its byte stream into delimited messages \n\
                  and dispatches them to handlers by prefix."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SERIAL_BROADCAST_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SERIAL_BROADCAST_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect the device, then frame and dispatch its messages
    Run(RunArgs),

    /// Run auto-detection only and print the winning port
    Detect(DetectArgs),

    /// List serial ports visible to the OS
    Ports(PortsArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "SERIAL_BROADCAST_CONFIG"
    )]
    pub config: PathBuf,

    /// Use this port directly and skip auto-detection
    #[arg(long, env = "SERIAL_BROADCAST_PORT")]
    pub port: Option<String>,

    /// Override dispatch parallelism from configuration
    #[arg(long, env = "SERIAL_BROADCAST_PARALLELISM")]
    pub parallelism: Option<usize>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SERIAL_BROADCAST_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without opening any port
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `detect` command
#[derive(Parser, Debug, Clone)]
pub struct DetectArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "SERIAL_BROADCAST_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the detection pattern (regular expression)
    #[arg(long)]
    pub pattern: Option<String>,

    /// Override the per-candidate probe timeout
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Override the delay between failed rounds
    #[arg(long)]
    pub backoff_ms: Option<u64>,

    /// Give up after this many rounds (0 = until interrupted)
    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Output result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `ports` command
#[derive(Parser, Debug)]
pub struct PortsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
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
