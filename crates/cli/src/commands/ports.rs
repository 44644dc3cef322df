//! `ports` command implementation.

use anyhow::{Context, Result};
use contracts::DeviceCatalog;
use detector::SerialCatalog;
use tracing::info;

use crate::cli::PortsArgs;

/// Execute the `ports` command
pub fn run_ports(args: &PortsArgs) -> Result<()> {
    let ports = SerialCatalog
        .enumerate_ports()
        .context("Failed to enumerate serial ports")?;

    info!(count = ports.len(), "Serial ports enumerated");

    if args.json {
        let json = serde_json::to_string_pretty(&ports).context("Failed to serialize port list")?;
        println!("{}", json);
    } else if ports.is_empty() {
        println!("No serial ports found");
    } else {
        println!("Serial ports ({}):", ports.len());
        for port in &ports {
            println!("  - {}", port);
        }
    }

    Ok(())
}
