//! AutoDetector - repeated probing rounds until one device matches
//!
//! Each round re-reads the candidate list (devices come and go between
//! rounds), opens what it can, and races the opened transports. A round with
//! no match is followed by the backoff delay and a new round.

use std::sync::Arc;
use std::time::Duration;

use contracts::{BroadcastBlueprint, CancellationToken, DeviceCatalog, TransportFactory, Verifier};
use observability::{record_probe_round, ProbeRoundOutcome};
use tracing::{debug, info, instrument, warn};

use crate::error::{DetectorError, Result};
use crate::prober::{DeviceProber, ProbeOutcome};

/// Auto-detection settings
#[derive(Debug, Clone)]
pub struct AutoDetectConfig {
    /// Per-candidate read deadline
    pub probe_timeout: Duration,
    /// Delay between failed rounds
    pub backoff: Duration,
    /// Round limit (None = until cancelled)
    pub max_rounds: Option<u64>,
    /// Fixed candidate list; empty = ask the catalog every round
    pub candidates: Vec<String>,
    /// Read size per probing read
    pub read_buffer_size: usize,
}

impl Default for AutoDetectConfig {
    fn default() -> Self {
        Self::from_blueprint(&BroadcastBlueprint::default())
    }
}

impl AutoDetectConfig {
    pub fn from_blueprint(blueprint: &BroadcastBlueprint) -> Self {
        let detection = &blueprint.detection;
        Self {
            probe_timeout: Duration::from_millis(detection.probe_timeout_ms),
            backoff: Duration::from_millis(detection.probe_backoff_ms),
            max_rounds: (detection.max_rounds > 0).then_some(u64::from(detection.max_rounds)),
            candidates: detection.candidates.clone(),
            read_buffer_size: blueprint.framing.read_buffer_size,
        }
    }
}

/// Detection result; the transport is open and owned by the caller
pub struct DetectedDevice<T> {
    pub transport: T,
    /// Winning port identifier
    pub port: String,
    /// Verifier key, for bookkeeping
    pub key: Vec<u8>,
    /// Chunk that matched
    pub matched: Vec<u8>,
    /// Round (1-based) in which the device matched
    pub round: u64,
}

/// Drives probing rounds over a catalog and a transport factory
pub struct AutoDetector<C, F> {
    catalog: C,
    factory: F,
    verifier: Arc<dyn Verifier>,
    prober: DeviceProber,
    config: AutoDetectConfig,
}

impl<C, F> AutoDetector<C, F>
where
    C: DeviceCatalog,
    F: TransportFactory,
{
    pub fn new(catalog: C, factory: F, verifier: Arc<dyn Verifier>, config: AutoDetectConfig) -> Self {
        let prober =
            DeviceProber::new(config.probe_timeout).with_read_buffer_size(config.read_buffer_size);
        Self {
            catalog,
            factory,
            verifier,
            prober,
            config,
        }
    }

    /// Get the transport factory
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Probe until a device matches, the round limit is hit or `cancel` fires
    ///
    /// # Errors
    /// - `Cancelled` on external cancellation (every candidate closed)
    /// - `Exhausted` when `max_rounds` rounds all failed
    #[instrument(
        name = "auto_detector_detect",
        skip(self, cancel),
        fields(
            timeout_ms = self.config.probe_timeout.as_millis() as u64,
            backoff_ms = self.config.backoff.as_millis() as u64
        )
    )]
    pub async fn detect(&self, cancel: &CancellationToken) -> Result<DetectedDevice<F::Transport>> {
        let mut round: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(DetectorError::Cancelled);
            }
            round += 1;

            let ids = self.candidates(round);
            let mut transports = Vec::with_capacity(ids.len());
            for id in &ids {
                match self.factory.open(id).await {
                    Ok(transport) => transports.push(transport),
                    Err(e) => warn!(round, port = %id, error = %e, "open failed, skipping for this round"),
                }
            }
            let opened = transports.len();
            debug!(round, listed = ids.len(), opened, "probing round started");

            match self
                .prober
                .probe(transports, self.verifier.clone(), cancel)
                .await
            {
                ProbeOutcome::Won(winner) => {
                    record_probe_round(round, opened, ProbeRoundOutcome::Won);
                    info!(
                        round,
                        port = %winner.port,
                        key = %String::from_utf8_lossy(self.verifier.key()),
                        "device detected"
                    );
                    return Ok(DetectedDevice {
                        transport: winner.transport,
                        port: winner.port,
                        key: self.verifier.key().to_vec(),
                        matched: winner.matched,
                        round,
                    });
                }
                ProbeOutcome::Cancelled => {
                    record_probe_round(round, opened, ProbeRoundOutcome::Cancelled);
                    info!(round, "detection cancelled");
                    return Err(DetectorError::Cancelled);
                }
                ProbeOutcome::AllFailed => {
                    record_probe_round(round, opened, ProbeRoundOutcome::AllFailed);
                    debug!(round, "no candidate matched");
                }
            }

            if self.config.max_rounds.is_some_and(|max| round >= max) {
                warn!(rounds = round, "round limit reached");
                return Err(DetectorError::Exhausted { rounds: round });
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(DetectorError::Cancelled),
                _ = tokio::time::sleep(self.config.backoff) => {}
            }
        }
    }

    /// Candidate identifiers for one round
    ///
    /// An enumeration failure counts as an empty round rather than ending detection.
    fn candidates(&self, round: u64) -> Vec<String> {
        if !self.config.candidates.is_empty() {
            return self.config.candidates.clone();
        }
        match self.catalog.enumerate_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!(round, error = %e, "port enumeration failed");
                Vec::new()
            }
        }
    }
}
