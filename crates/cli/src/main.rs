//! # Serial Broadcast CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - Port listing and device auto-detection
//! - Framing and dispatch session lifecycle
//! - Graceful shutdown handling

mod cli;
mod commands;
mod error;
mod handlers;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_broadcast, run_detect, run_ports, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Serial Broadcast CLI starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_broadcast(args).await,
        Commands::Detect(args) => run_detect(args).await,
        Commands::Ports(args) => run_ports(args),
        Commands::Validate(args) => run_validate(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
    })
}
