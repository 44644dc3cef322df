//! `detect` command implementation.

use anyhow::{Context, Result};
use contracts::Transport;
use detector::DetectorError;
use serde::Serialize;
use tracing::{info, warn};

use super::{load_blueprint, revalidate, serial_detector, shutdown_token};
use crate::cli::DetectArgs;
use crate::error::CliError;

/// Detection result for JSON output
#[derive(Serialize)]
struct DetectionReport {
    port: String,
    key: String,
    matched: String,
    round: u64,
}

/// Execute the `detect` command
pub async fn run_detect(args: &DetectArgs) -> Result<()> {
    let mut blueprint = load_blueprint(&args.config)?;

    // Apply CLI overrides
    if let Some(ref pattern) = args.pattern {
        info!(pattern = %pattern, "Overriding detection pattern from CLI");
        blueprint.detection.pattern = pattern.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        blueprint.detection.probe_timeout_ms = timeout_ms;
    }
    if let Some(backoff_ms) = args.backoff_ms {
        blueprint.detection.probe_backoff_ms = backoff_ms;
    }
    if let Some(max_rounds) = args.max_rounds {
        blueprint.detection.max_rounds = max_rounds;
    }
    revalidate(&blueprint)?;

    let detector = serial_detector(&blueprint)?;
    let shutdown = shutdown_token();

    let device = match detector.detect(&shutdown).await {
        Ok(device) => device,
        Err(DetectorError::Cancelled) => {
            warn!("Detection interrupted before a device matched");
            return Ok(());
        }
        Err(e) => return Err(CliError::detection(e.to_string()).into()),
    };

    let report = DetectionReport {
        port: device.port.clone(),
        key: String::from_utf8_lossy(&device.key).into_owned(),
        matched: String::from_utf8_lossy(&device.matched).into_owned(),
        round: device.round,
    };

    // Detection only; release the port for whoever runs next
    device
        .transport
        .close()
        .await
        .with_context(|| format!("Failed to close {}", device.port))?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize detection result")?;
        println!("{}", json);
    } else {
        println!("✓ Device detected on {} (round {})", report.port, report.round);
        if !report.key.is_empty() {
            println!("  Key: {}", report.key);
        }
        println!("  Matched: {:?}", report.matched);
    }

    Ok(())
}
