//! BroadcastSession - one transport, one frame reader, one dispatcher.
//!
//! The reader feeds the dispatcher through a bounded channel. When reading
//! stops (end-of-stream, transport failure or shutdown) the channel is closed,
//! in-flight handlers are drained and only then is the transport closed, so a
//! handler replying over the transport never races the close.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{CancellationToken, FramingConfig, Transport};
use dispatcher::Dispatcher;
use framing::{FrameReader, FramingError, StopReason};
use observability::record_frames_extracted;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use super::{SessionEnd, SessionReport};

/// Framing and dispatch over an already open transport
pub struct BroadcastSession<T> {
    transport: Arc<T>,
    reader: FrameReader,
    dispatcher: Dispatcher,
    channel_capacity: usize,
}

impl<T> BroadcastSession<T>
where
    T: Transport + Sync + 'static,
{
    /// Create a session; `dispatcher` should already hold its handlers
    pub fn new(transport: Arc<T>, framing: &FramingConfig, dispatcher: Dispatcher) -> Self {
        Self {
            transport,
            reader: FrameReader::from_config(framing),
            dispatcher,
            channel_capacity: framing.channel_capacity.max(1),
        }
    }

    /// Run until the stream ends, the transport fails or `shutdown` fires
    ///
    /// A transport failure is reported through [`SessionReport::end`]; the
    /// returned error is reserved for the dispatcher task itself failing.
    #[instrument(name = "broadcast_session", skip(self, shutdown), fields(port = %self.transport.id()))]
    pub async fn run(mut self, shutdown: &CancellationToken) -> Result<SessionReport> {
        let port = self.transport.id().to_string();
        let started = Instant::now();

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let dispatch_handle = self.dispatcher.spawn(rx);

        info!(port = %port, channel_capacity = self.channel_capacity, "Session started");

        let read = self.reader.read_from(&*self.transport, &tx, shutdown).await;
        drop(tx);

        let end = match read {
            Ok(summary) => match summary.reason {
                StopReason::EndOfStream => SessionEnd::EndOfStream,
                StopReason::Cancelled => SessionEnd::Shutdown,
            },
            Err(e @ FramingError::Transport { .. }) => SessionEnd::Failed(e.to_string()),
            Err(e @ FramingError::ChannelClosed { .. }) => {
                error!(port = %port, "Dispatcher stopped accepting frames");
                SessionEnd::Failed(e.to_string())
            }
        };

        let dispatch = dispatch_handle
            .await
            .context("Dispatcher task failed")?;

        if let Err(e) = self.transport.close().await {
            warn!(port = %port, error = %e, "Failed to close transport");
        }

        let framing = self.reader.metrics().snapshot();
        record_frames_extracted(&port, framing.frames_emitted);

        let report = SessionReport {
            port,
            end,
            duration: started.elapsed(),
            framing,
            dispatch,
        };
        info!(
            port = %report.port,
            end = %report.end,
            frames = report.framing.frames_emitted,
            succeeded = report.dispatch.succeeded,
            failed = report.dispatch.failed,
            duration_secs = report.duration.as_secs_f64(),
            "Session finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::builtin_registry;
    use dispatcher::DispatcherConfig;
    use framing::{MockTransport, TrailingPolicy};
    use std::time::Duration;

    fn session(transport: Arc<MockTransport>, framing: &FramingConfig) -> BroadcastSession<MockTransport> {
        let dispatcher = Dispatcher::builder(DispatcherConfig::default())
            .registry(builtin_registry(transport.clone(), framing.delimiter))
            .build()
            .unwrap();
        BroadcastSession::new(transport, framing, dispatcher)
    }

    #[tokio::test]
    async fn test_session_runs_to_end_of_stream() {
        let (transport, handle) =
            MockTransport::scripted("mock0", ["PING 1\nHEL", "LO world\nPI"]);
        let report = session(Arc::new(transport), &FramingConfig::default())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.end, SessionEnd::EndOfStream);
        assert_eq!(report.framing.frames_emitted, 2);
        assert_eq!(report.framing.buffered_bytes, 2);
        assert_eq!(report.dispatch.dispatched, 2);
        assert_eq!(report.dispatch.succeeded, 2);
        assert_eq!(handle.stats().written(), b"PONG 1\n");
        assert_eq!(handle.stats().closes(), 1);
    }

    #[tokio::test]
    async fn test_flush_policy_dispatches_remainder() {
        let framing = FramingConfig {
            trailing: TrailingPolicy::Flush,
            ..Default::default()
        };
        let (transport, handle) = MockTransport::scripted("mock0", ["A\nPING tail"]);
        let report = session(Arc::new(transport), &framing)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.framing.frames_emitted, 2);
        assert_eq!(report.framing.buffered_bytes, 0);
        assert_eq!(handle.stats().written(), b"PONG tail\n");
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_closes() {
        let (transport, handle) = MockTransport::new("mock0");
        handle.push("PING a\n");

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let report = session(Arc::new(transport), &FramingConfig::default())
            .run(&shutdown)
            .await
            .unwrap();

        assert_eq!(report.end, SessionEnd::Shutdown);
        assert_eq!(report.dispatch.succeeded, 1);
        assert_eq!(handle.stats().written(), b"PONG a\n");
        assert_eq!(handle.stats().closes(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_ends_session() {
        let (transport, handle) = MockTransport::new("mock0");
        handle.push("one\n");
        handle.fail("framing error");

        let report = session(Arc::new(transport), &FramingConfig::default())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(report.end, SessionEnd::Failed(ref msg) if msg.contains("framing error")));
        assert!(report.end.is_failure());
        assert_eq!(report.dispatch.dispatched, 1);
        assert_eq!(handle.stats().closes(), 1);
    }
}
