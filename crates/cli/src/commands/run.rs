//! `run` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{BroadcastBlueprint, FailureMode, TransportFactory};
use detector::{DetectorError, SerialFactory};
use dispatcher::{DispatchFailure, Dispatcher, DispatcherConfig};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{load_blueprint, revalidate, serial_detector, shutdown_token};
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::handlers::builtin_registry;
use crate::pipeline::{BroadcastSession, SessionEnd};

/// Execute the `run` command
pub async fn run_broadcast(args: &RunArgs) -> Result<()> {
    let mut blueprint = load_blueprint(&args.config)?;

    // Apply CLI overrides
    if let Some(parallelism) = args.parallelism {
        info!(parallelism, "Overriding dispatch parallelism from CLI");
        blueprint.dispatch.parallelism = parallelism;
    }
    revalidate(&blueprint)?;

    info!(
        baud_rate = blueprint.serial.baud_rate,
        delimiter = blueprint.framing.delimiter,
        parallelism = blueprint.dispatch.parallelism,
        pattern = %blueprint.detection.pattern,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint, args.port.as_deref());
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let shutdown = shutdown_token();

    let (transport, port) = match args.port {
        Some(ref port) => {
            info!(port = %port, "Using port from CLI, skipping detection");
            let transport = SerialFactory::new(blueprint.serial.clone())
                .open(port)
                .await
                .with_context(|| format!("Failed to open {}", port))?;
            (transport, port.clone())
        }
        None => {
            let detector = serial_detector(&blueprint)?;
            match detector.detect(&shutdown).await {
                Ok(device) => (device.transport, device.port),
                Err(DetectorError::Cancelled) => {
                    warn!("Shutdown before a device was detected");
                    return Ok(());
                }
                Err(e) => return Err(CliError::detection(e.to_string()).into()),
            }
        }
    };

    let transport = Arc::new(transport);
    let registry = builtin_registry(transport.clone(), blueprint.framing.delimiter);

    let mut builder =
        Dispatcher::builder(DispatcherConfig::from(&blueprint.dispatch)).registry(registry);
    if blueprint.dispatch.failure_mode == FailureMode::Forward {
        let (failure_tx, failure_rx) = mpsc::channel(blueprint.framing.channel_capacity.max(1));
        tokio::spawn(report_failures(failure_rx));
        builder = builder.failure_sink(failure_tx);
    }
    let dispatcher = builder.build().context("Failed to build dispatcher")?;

    info!(port = %port, "Starting session...");
    let report = BroadcastSession::new(transport, &blueprint.framing, dispatcher)
        .run(&shutdown)
        .await?;

    report.print_summary();

    if let SessionEnd::Failed(ref message) = report.end {
        return Err(CliError::session(port, message.clone()).into());
    }

    info!("Serial Broadcast finished");
    Ok(())
}

/// Error-reporting sink for forwarded dispatch failures
async fn report_failures(mut rx: mpsc::Receiver<DispatchFailure>) {
    while let Some(failure) = rx.recv().await {
        error!(
            seq = failure.seq,
            message = %failure.message,
            kind = ?failure.kind,
            "Dispatch failure"
        );
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &BroadcastBlueprint, port: Option<&str>) {
    println!("\n=== Configuration Summary ===\n");
    println!("Serial:");
    println!("  Baud rate: {}", blueprint.serial.baud_rate);
    println!(
        "  Line: {} data bits, parity {:?}, stop bits {:?}",
        blueprint.serial.data_bits, blueprint.serial.parity, blueprint.serial.stop_bits
    );
    let bits = blueprint.serial.modem_bits();
    println!("  DTR/RTS: {}/{}", bits.dtr, bits.rts);

    println!("\nFraming:");
    println!("  Delimiter: {:?}", char::from(blueprint.framing.delimiter));
    println!("  Read buffer: {} bytes", blueprint.framing.read_buffer_size);
    println!("  Channel capacity: {}", blueprint.framing.channel_capacity);
    println!("  Trailing bytes: {:?}", blueprint.framing.trailing);

    println!("\nDispatch:");
    println!("  Parallelism: {}", blueprint.dispatch.parallelism);
    println!("  Failure mode: {:?}", blueprint.dispatch.failure_mode);

    println!("\nDetection:");
    match port {
        Some(port) => println!("  Skipped, using {}", port),
        None => {
            println!("  Pattern: {}", blueprint.detection.pattern);
            println!("  Probe timeout: {} ms", blueprint.detection.probe_timeout_ms);
            println!("  Backoff: {} ms", blueprint.detection.probe_backoff_ms);
            if !blueprint.detection.candidates.is_empty() {
                println!("  Candidates: {:?}", blueprint.detection.candidates);
            }
        }
    }

    println!();
}
