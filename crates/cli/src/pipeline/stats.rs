//! Session statistics.

use std::fmt;
use std::time::Duration;

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The device closed the stream
    EndOfStream,
    /// Ctrl+C / SIGTERM
    Shutdown,
    /// Transport failure; the message describes it
    Failed(String),
}

impl SessionEnd {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfStream => write!(f, "end of stream"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Statistics from a session run
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Transport identifier
    pub port: String,

    pub end: SessionEnd,

    /// Total duration of the session
    pub duration: Duration,

    /// Frame reader counters
    pub framing: framing::MetricsSnapshot,

    /// Dispatcher counters
    pub dispatch: dispatcher::MetricsSnapshot,
}

impl SessionReport {
    /// Messages per second
    pub fn frames_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.framing.frames_emitted as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Failed and unroutable dispatches as a percentage of all dispatches
    pub fn failure_rate(&self) -> f64 {
        if self.dispatch.dispatched > 0 {
            let failed = self.dispatch.failed + self.dispatch.unroutable;
            (failed as f64 / self.dispatch.dispatched as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Session Statistics                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Port: {}", self.port);
        println!("   ├─ Ended: {}", self.end);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   └─ Messages/s: {:.2}", self.frames_per_sec());

        println!("\n📥 Framing");
        println!("   ├─ Bytes read: {}", self.framing.bytes_read);
        println!("   ├─ Reads with data: {}", self.framing.chunks_read);
        println!("   ├─ Frames extracted: {}", self.framing.frames_emitted);
        println!("   └─ Undelimited bytes left: {}", self.framing.buffered_bytes);

        let latency = self.dispatch.handler_latency_ms;
        println!("\n📤 Dispatch");
        println!("   ├─ Dispatched: {}", self.dispatch.dispatched);
        println!("   ├─ Succeeded: {}", self.dispatch.succeeded);
        println!(
            "   ├─ Failed: {} ({:.2}% incl. unroutable)",
            self.dispatch.failed,
            self.failure_rate()
        );
        println!("   ├─ Unroutable: {}", self.dispatch.unroutable);
        println!("   ├─ Peak concurrent handlers: {}", self.dispatch.peak_in_flight);
        println!("   └─ Handler latency (ms): {}", latency);

        println!();
    }
}
