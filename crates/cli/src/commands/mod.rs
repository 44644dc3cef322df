//! Command implementations.

mod detect;
mod ports;
mod run;
mod validate;

pub use detect::run_detect;
pub use ports::run_ports;
pub use run::run_broadcast;
pub use validate::run_validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{BroadcastBlueprint, CancellationToken};
use detector::{AutoDetectConfig, AutoDetector, MaskVerifier, SerialCatalog, SerialFactory};
use tracing::{info, warn};

use crate::error::CliError;

/// Load and validate the configuration file at `path`
fn load_blueprint(path: &Path) -> Result<BroadcastBlueprint> {
    info!(config = %path.display(), "Loading configuration");

    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    let loaded = config_loader::ConfigLoader::inspect_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    for warning in &loaded.warnings {
        warn!(field = %warning.field(), "{warning}");
    }
    Ok(loaded.blueprint)
}

/// Re-check a blueprint after CLI overrides were applied
fn revalidate(blueprint: &BroadcastBlueprint) -> Result<()> {
    config_loader::validate(blueprint)
        .map_err(|e| anyhow::Error::from(CliError::config_validation(e.to_string())))
}

/// Auto-detector over the OS serial ports, configured from `blueprint`
fn serial_detector(
    blueprint: &BroadcastBlueprint,
) -> Result<AutoDetector<SerialCatalog, SerialFactory>> {
    let verifier = MaskVerifier::from_config(&blueprint.detection)
        .context("Failed to build detection verifier")?;

    Ok(AutoDetector::new(
        SerialCatalog,
        SerialFactory::new(blueprint.serial.clone()),
        Arc::new(verifier),
        AutoDetectConfig::from_blueprint(blueprint),
    ))
}

/// Token cancelled on Ctrl+C or SIGTERM
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        setup_shutdown_signal().await;
        warn!("Received shutdown signal, stopping...");
        trigger.cancel();
    });
    token
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
