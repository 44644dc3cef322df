//! Metric recording for the framing, dispatch and probing stages
//!
//! All functions go through the `metrics` facade and are no-ops until a
//! recorder (e.g. the Prometheus exporter) is installed.

use metrics::{counter, gauge, histogram};

/// Terminal outcome of one dispatched frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler returned success
    Succeeded,
    /// Handler reported a failure
    Failed,
    /// No keyed handler and no default
    Unroutable,
}

impl DispatchOutcome {
    /// Label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unroutable => "unroutable",
        }
    }
}

/// Outcome of one probing round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeRoundOutcome {
    Won,
    AllFailed,
    Cancelled,
}

impl ProbeRoundOutcome {
    /// Label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Won => "won",
            Self::AllFailed => "all_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Record frames extracted on `port`
pub fn record_frames_extracted(port: &str, count: u64) {
    counter!(
        "serial_broadcast_frames_extracted_total",
        "port" => port.to_string()
    )
    .increment(count);
}

/// Record one dispatch outcome
pub fn record_dispatch_outcome(outcome: DispatchOutcome) {
    counter!(
        "serial_broadcast_dispatch_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record handler execution time
pub fn record_handler_latency_ms(latency_ms: f64) {
    histogram!("serial_broadcast_handler_latency_ms").record(latency_ms);
}

/// Record in-flight dispatch gauges
pub fn record_dispatch_snapshot(in_flight: usize, peak_in_flight: usize) {
    gauge!("serial_broadcast_dispatch_in_flight").set(in_flight as f64);
    gauge!("serial_broadcast_dispatch_peak_in_flight").set(peak_in_flight as f64);
}

/// Record a completed probing round
pub fn record_probe_round(round: u64, candidates: usize, outcome: ProbeRoundOutcome) {
    counter!(
        "serial_broadcast_probe_rounds_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
    gauge!("serial_broadcast_probe_candidates").set(candidates as f64);
    gauge!("serial_broadcast_probe_last_round").set(round as f64);
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Summary view
    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
