//! # Framing
//!
//! Delimiter framing of an arbitrarily chunked byte stream.
//!
//! Responsibilities:
//! - Accumulate transport reads in a per-session buffer
//! - Split the buffer into ordered, delimiter-free `Frame`s
//! - Keep undelimited trailing bytes for the next read
//! - Send frames downstream over a bounded channel (backpressure)
//!
//! ## Usage Example
//!
//! ```ignore
//! use framing::FrameReader;
//!
//! let mut reader = FrameReader::new(b'\n');
//! let frames = reader.ingest(b"AAA\nBB");
//! assert_eq!(frames.len(), 1);
//!
//! // or drive it from a transport:
//! let (tx, rx) = tokio::sync::mpsc::channel(100);
//! let summary = reader.read_from(&transport, &tx, &shutdown).await?;
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use framing::MockTransport;
//!
//! let (transport, handle) = MockTransport::new("mock0");
//! handle.push("PING 1\n");
//! handle.end();
//! ```

mod config;
mod error;
mod mock;
mod reader;

// Re-exports
pub use config::{FramingMetrics, MetricsSnapshot};
pub use contracts::{Frame, TrailingPolicy};
pub use error::{FramingError, Result};
pub use mock::{MockStats, MockTransport, MockTransportHandle};
pub use reader::{FrameReader, ReadSummary, StopReason};
