//! FrameReader - accumulation buffer and delimiter scan

use std::ops::ControlFlow;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use contracts::{CancellationToken, Frame, FramingConfig, TrailingPolicy, Transport, TransportError};
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, trace};

use crate::config::FramingMetrics;
use crate::error::{FramingError, Result};

/// Default transport read size
const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Why a read loop stopped without error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    /// Transport reported end-of-stream
    #[default]
    EndOfStream,
    /// Shutdown was requested
    Cancelled,
}

/// Outcome of [`FrameReader::read_from`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub reason: StopReason,
    /// Frames sent downstream by this call
    pub frames: u64,
    /// Bytes read by this call
    pub bytes: u64,
    /// Undelimited bytes left in the buffer
    pub retained: usize,
}

/// Splits a byte stream into delimiter-bounded frames
///
/// The accumulation buffer always holds exactly the bytes read so far that are
/// not yet part of an emitted frame. Exclusive ownership (`&mut self`) makes
/// every append and extraction a single critical section.
pub struct FrameReader {
    delimiter: u8,
    trailing: TrailingPolicy,
    read_buffer_size: usize,
    buffer: BytesMut,
    /// Leading bytes of `buffer` already known to be delimiter-free
    scanned: usize,
    next_seq: u64,
    metrics: Arc<FramingMetrics>,
}

impl FrameReader {
    /// Create a reader splitting on `delimiter`
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            trailing: TrailingPolicy::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            buffer: BytesMut::new(),
            scanned: 0,
            next_seq: 0,
            metrics: Arc::new(FramingMetrics::new()),
        }
    }

    /// Create from configuration
    pub fn from_config(config: &FramingConfig) -> Self {
        Self::new(config.delimiter)
            .with_trailing(config.trailing)
            .with_read_buffer_size(config.read_buffer_size)
    }

    /// Set end-of-stream trailing policy
    pub fn with_trailing(mut self, trailing: TrailingPolicy) -> Self {
        self.trailing = trailing;
        self
    }

    /// Set transport read size (minimum 1)
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Configured delimiter
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Bytes waiting for a delimiter
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<FramingMetrics> {
        self.metrics.clone()
    }

    /// Append `chunk` and extract every complete frame, in delimiter order
    ///
    /// Each frame payload is copied out of the buffer, so it stays valid while
    /// the buffer keeps changing. An empty chunk is a no-op.
    pub fn ingest(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = self.scanned;
        while let Some(offset) = self.buffer[start..]
            .iter()
            .position(|b| *b == self.delimiter)
        {
            let end = start + offset;
            let payload = Bytes::copy_from_slice(&self.buffer[..end]);
            self.buffer.advance(end + 1);
            frames.push(Frame::new(self.next_seq, payload));
            self.next_seq += 1;
            start = 0;
        }
        self.scanned = self.buffer.len();

        self.metrics.record_frames(frames.len());
        self.metrics.update_buffered(self.buffer.len());
        trace!(
            chunk_len = chunk.len(),
            frames = frames.len(),
            buffered = self.buffer.len(),
            "chunk ingested"
        );
        frames
    }

    /// Apply the trailing policy at end-of-stream
    ///
    /// With `Retain` the remainder stays buffered and nothing is returned.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.trailing == TrailingPolicy::Retain || self.buffer.is_empty() {
            return None;
        }
        let payload = Bytes::copy_from_slice(&self.buffer);
        self.buffer.clear();
        self.scanned = 0;
        self.metrics.record_frames(1);
        self.metrics.update_buffered(0);

        let frame = Frame {
            seq: self.next_seq,
            payload,
            unterminated: true,
        };
        self.next_seq += 1;
        Some(frame)
    }

    /// Read from `transport` until end-of-stream, failure or shutdown
    ///
    /// Frames go to `tx` in extraction order; a full channel suspends reading
    /// until the consumer catches up or shutdown is requested.
    ///
    /// # Errors
    /// - `FramingError::Transport` on any read failure other than end-of-stream
    /// - `FramingError::ChannelClosed` if the receiver was dropped
    #[instrument(
        name = "frame_reader_read_from",
        skip(self, transport, tx, shutdown),
        fields(port = %transport.id(), delimiter = self.delimiter)
    )]
    pub async fn read_from<T: Transport + Sync>(
        &mut self,
        transport: &T,
        tx: &mpsc::Sender<Frame>,
        shutdown: &CancellationToken,
    ) -> Result<ReadSummary> {
        let port = transport.id().to_string();
        let mut buf = vec![0u8; self.read_buffer_size];
        let mut summary = ReadSummary::default();

        info!(port = %port, "frame reader started");

        loop {
            let read = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    summary.reason = StopReason::Cancelled;
                    break;
                }
                read = transport.read(&mut buf) => read,
            };

            match read {
                Ok(0) => continue,
                Ok(n) => {
                    self.metrics.record_chunk(n);
                    counter!("serial_broadcast_bytes_read_total", "port" => port.clone())
                        .increment(n as u64);
                    summary.bytes += n as u64;

                    let frames = self.ingest(&buf[..n]);
                    let sent = self.forward(frames, tx, &port, shutdown).await?;
                    if summary.count(sent).is_break() {
                        break;
                    }
                }
                Err(TransportError::EndOfStream) => {
                    debug!(port = %port, buffered = self.buffer.len(), "end of stream");
                    summary.reason = StopReason::EndOfStream;
                    if let Some(frame) = self.finish() {
                        let sent = self.forward(vec![frame], tx, &port, shutdown).await?;
                        let _ = summary.count(sent);
                    }
                    break;
                }
                Err(source) => {
                    error!(port = %port, error = %source, "transport read failed");
                    return Err(FramingError::Transport { port, source });
                }
            }
        }

        summary.retained = self.buffer.len();
        info!(
            port = %port,
            reason = ?summary.reason,
            frames = summary.frames,
            bytes = summary.bytes,
            retained = summary.retained,
            "frame reader stopped"
        );
        Ok(summary)
    }

    /// Send frames downstream in order
    ///
    /// Waiting for channel capacity gives way to shutdown; the frames not yet
    /// sent are dropped and the count sent so far comes back as `Break`.
    async fn forward(
        &self,
        frames: Vec<Frame>,
        tx: &mpsc::Sender<Frame>,
        port: &str,
        shutdown: &CancellationToken,
    ) -> Result<ControlFlow<u64, u64>> {
        let mut sent = 0u64;
        let mut flow = ControlFlow::Continue(());
        for frame in frames {
            trace!(seq = frame.seq, len = frame.len(), "frame extracted");
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(port = %port, sent, "shutdown while waiting for consumer");
                    flow = ControlFlow::Break(());
                    break;
                }
                result = tx.send(frame) => {
                    result.map_err(|_| FramingError::ChannelClosed {
                        port: port.to_string(),
                    })?;
                    sent += 1;
                }
            }
        }
        if sent > 0 {
            counter!("serial_broadcast_frames_total", "port" => port.to_string())
                .increment(sent);
        }
        Ok(match flow {
            ControlFlow::Continue(()) => ControlFlow::Continue(sent),
            ControlFlow::Break(()) => ControlFlow::Break(sent),
        })
    }
}

impl ReadSummary {
    /// Add frames sent by one forward step; a shutdown break marks the
    /// summary cancelled
    fn count(&mut self, sent: ControlFlow<u64, u64>) -> ControlFlow<()> {
        match sent {
            ControlFlow::Continue(n) => {
                self.frames += n;
                ControlFlow::Continue(())
            }
            ControlFlow::Break(n) => {
                self.frames += n;
                self.reason = StopReason::Cancelled;
                ControlFlow::Break(())
            }
        }
    }
}
