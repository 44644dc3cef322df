//! Dispatch metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use observability::{RunningStats, StatsSummary};

/// Counters for one dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Frames taken off the input and handed to a worker slot
    dispatched: AtomicU64,
    /// Handler returned success
    succeeded: AtomicU64,
    /// Handler reported failure (or panicked)
    failed: AtomicU64,
    /// No handler resolved
    unroutable: AtomicU64,
    /// Handlers currently running
    in_flight: AtomicUsize,
    /// Highest observed `in_flight`
    peak_in_flight: AtomicUsize,
    /// Handler execution time in milliseconds
    latency_ms: Mutex<RunningStats>,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unroutable(&self) {
        self.unroutable.fetch_add(1, Ordering::Relaxed);
    }

    /// Add one handler latency sample
    pub fn record_latency_ms(&self, latency_ms: f64) {
        match self.latency_ms.lock() {
            Ok(mut stats) => stats.push(latency_ms),
            Err(poisoned) => poisoned.into_inner().push(latency_ms),
        }
    }

    /// Mark a handler as running until the guard drops
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard {
            metrics: Arc::clone(self),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let handler_latency_ms = match self.latency_ms.lock() {
            Ok(stats) => stats.summary(),
            Err(poisoned) => poisoned.into_inner().summary(),
        };
        MetricsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unroutable: self.unroutable.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight(),
            handler_latency_ms,
        }
    }
}

/// Decrements `in_flight` on drop, including during a handler panic
pub struct InFlightGuard {
    metrics: Arc<DispatchMetrics>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.metrics.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub unroutable: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub handler_latency_ms: StatsSummary,
}
