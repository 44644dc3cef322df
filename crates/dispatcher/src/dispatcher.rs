//! Dispatcher - runs handlers for framed messages under a concurrency bound
//!
//! The intake loop takes a worker slot *before* pulling the next frame, so
//! while all slots are busy no further frames leave the input channel. Each
//! frame then runs as its own task: the handler is resolved at that point, and
//! the slot is released when the task ends, whatever the outcome.

use std::sync::Arc;
use std::time::Instant;

use contracts::{DispatchConfig, FailureMode, Frame, MAX_PARALLELISM};
use observability::{record_dispatch_outcome, record_dispatch_snapshot, DispatchOutcome};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, trace};

use crate::error::{DispatcherError, HandlerError};
use crate::failure::{DispatchFailure, DispatchFailureKind, FailureDelivery};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::registry::{HandlerRegistry, RegistryHandle};

/// Dispatcher configuration
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Worker slots (max concurrent handlers)
    pub parallelism: usize,
    /// Failure delivery mode
    pub failure_mode: FailureMode,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for DispatcherConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            parallelism: config.parallelism,
            failure_mode: config.failure_mode,
        }
    }
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    registry: HandlerRegistry,
    failure_tx: Option<mpsc::Sender<DispatchFailure>>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            registry: HandlerRegistry::empty(),
            failure_tx: None,
        }
    }

    /// Set the handler registry
    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the channel used by the `forward` failure mode
    pub fn failure_sink(mut self, tx: mpsc::Sender<DispatchFailure>) -> Self {
        self.failure_tx = Some(tx);
        self
    }

    /// Build the dispatcher
    ///
    /// # Errors
    /// - `InvalidParallelism` if parallelism is 0 or above `MAX_PARALLELISM`
    /// - `MissingFailureSink` for `forward` mode without a failure sink
    #[instrument(name = "dispatcher_builder_build", skip(self), fields(parallelism = self.config.parallelism))]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let parallelism = self.config.parallelism;
        if parallelism == 0 || parallelism > MAX_PARALLELISM {
            return Err(DispatcherError::InvalidParallelism(parallelism));
        }

        let delivery = match (self.config.failure_mode, self.failure_tx) {
            (FailureMode::Drop, _) => FailureDelivery::Drop,
            (FailureMode::Log, _) => FailureDelivery::Log,
            (FailureMode::Forward, Some(tx)) => FailureDelivery::Forward(tx),
            (FailureMode::Forward, None) => return Err(DispatcherError::MissingFailureSink),
        };

        debug!(registry = ?self.registry, failure_mode = ?delivery.mode(), "dispatcher built");

        Ok(Dispatcher {
            parallelism: self.config.parallelism,
            registry: RegistryHandle::new(self.registry),
            delivery,
            metrics: Arc::new(DispatchMetrics::new()),
        })
    }
}

/// Bounded-concurrency message dispatcher
pub struct Dispatcher {
    parallelism: usize,
    registry: RegistryHandle,
    delivery: FailureDelivery,
    metrics: Arc<DispatchMetrics>,
}

impl Dispatcher {
    pub fn builder(config: DispatcherConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    /// Handle for swapping the registry while running
    pub fn registry_handle(&self) -> RegistryHandle {
        self.registry.clone()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        self.metrics.clone()
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Run the intake loop until `input_rx` closes
    ///
    /// Returns once every dispatched handler has finished.
    #[instrument(name = "dispatcher_run", skip(self, input_rx), fields(parallelism = self.parallelism))]
    pub async fn run(self, mut input_rx: mpsc::Receiver<Frame>) -> MetricsSnapshot {
        info!(parallelism = self.parallelism, "Dispatcher started");

        let slots = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks = JoinSet::new();
        let mut frame_count: u64 = 0;

        loop {
            let Ok(permit) = slots.clone().acquire_owned().await else {
                break;
            };
            let Some(frame) = input_rx.recv().await else {
                break;
            };

            while let Some(result) = tasks.try_join_next() {
                self.reap(result);
            }

            frame_count += 1;
            self.metrics.record_dispatched();
            trace!(seq = frame.seq, "frame dispatched");

            let registry = self.registry.clone();
            let delivery = self.delivery.clone();
            let metrics = self.metrics.clone();
            tasks.spawn(async move {
                let _permit = permit;
                dispatch_one(frame, &registry, &delivery, &metrics).await;
            });

            if frame_count.is_multiple_of(100) {
                record_dispatch_snapshot(self.metrics.in_flight(), self.metrics.peak_in_flight());
                debug!(frames = frame_count, "Dispatcher progress");
            }
        }

        info!(frames = frame_count, "Dispatcher input closed, draining");

        while let Some(result) = tasks.join_next().await {
            self.reap(result);
        }

        let snapshot = self.metrics.snapshot();
        record_dispatch_snapshot(snapshot.in_flight, snapshot.peak_in_flight);
        info!(
            dispatched = snapshot.dispatched,
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            unroutable = snapshot.unroutable,
            peak_in_flight = snapshot.peak_in_flight,
            "Dispatcher shutdown complete"
        );
        snapshot
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self, input_rx: mpsc::Receiver<Frame>) -> JoinHandle<MetricsSnapshot> {
        tokio::spawn(self.run(input_rx))
    }

    /// Handler panics are caught inside `dispatch_one`; this only sees a
    /// dispatch task that itself died.
    fn reap(&self, result: Result<(), JoinError>) {
        if let Err(e) = result {
            self.metrics.record_failed();
            record_dispatch_outcome(DispatchOutcome::Failed);
            error!(error = %e, "dispatch task panicked");
        }
    }
}

async fn dispatch_one(
    frame: Frame,
    registry: &RegistryHandle,
    delivery: &FailureDelivery,
    metrics: &Arc<DispatchMetrics>,
) {
    let _in_flight = metrics.enter();
    let snapshot = registry.snapshot();
    let prefix = String::from_utf8_lossy(frame.prefix()).into_owned();
    let message = frame.text().into_owned();

    let Some(handler) = snapshot.resolve(&frame.payload) else {
        metrics.record_unroutable();
        record_dispatch_outcome(DispatchOutcome::Unroutable);
        delivery
            .deliver(DispatchFailure {
                seq: frame.seq,
                message,
                kind: DispatchFailureKind::Unroutable { prefix },
            })
            .await;
        return;
    };

    let started = Instant::now();
    let result = match tokio::spawn(handler(message.clone())).await {
        Ok(result) => result,
        Err(e) => Err(handler_crashed(e)),
    };
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    metrics.record_latency_ms(latency_ms);
    observability::record_handler_latency_ms(latency_ms);

    match result {
        Ok(()) => {
            metrics.record_succeeded();
            record_dispatch_outcome(DispatchOutcome::Succeeded);
            trace!(seq = frame.seq, prefix = %prefix, latency_ms, "handler succeeded");
        }
        Err(error) => {
            metrics.record_failed();
            record_dispatch_outcome(DispatchOutcome::Failed);
            delivery
                .deliver(DispatchFailure {
                    seq: frame.seq,
                    message,
                    kind: DispatchFailureKind::HandlerFailed { prefix, error },
                })
                .await;
        }
    }
}

/// A handler that panicked or was aborted fails its message like any other
fn handler_crashed(e: JoinError) -> HandlerError {
    if !e.is_panic() {
        return HandlerError::failed(format!("handler aborted: {e}"));
    }
    let payload = e.into_panic();
    let reason = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    HandlerError::failed(format!("handler panicked: {reason}"))
}
