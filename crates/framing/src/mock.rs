//! Mock transport
//!
//! Scripted in-memory byte stream for tests without serial hardware.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use contracts::{Transport, TransportError};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::trace;

enum MockEvent {
    Chunk(Bytes),
    Fail(String),
    End,
}

struct ReadState {
    rx: mpsc::UnboundedReceiver<MockEvent>,
    pending: Bytes,
}

/// Call counters shared between a mock transport and its handle
#[derive(Debug, Default)]
pub struct MockStats {
    reads: AtomicU64,
    writes: AtomicU64,
    closes: AtomicU64,
    written: Mutex<Vec<u8>>,
}

impl MockStats {
    /// Number of `read` calls
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `write` calls
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of `close` calls
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    /// Everything written so far
    pub fn written(&self) -> Vec<u8> {
        match self.written.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// In-memory transport fed through a [`MockTransportHandle`]
///
/// A read with nothing queued waits for the next event. An empty chunk reads
/// as `Ok(0)`, the same as a poll interval without data. The stream ends only
/// on an explicit [`MockTransportHandle::end`].
pub struct MockTransport {
    id: String,
    state: AsyncMutex<ReadState>,
    // Keeps the stream open after the handle is dropped
    _tx: mpsc::UnboundedSender<MockEvent>,
    closed: AtomicBool,
    stats: Arc<MockStats>,
}

/// Control side of a [`MockTransport`]
#[derive(Clone)]
pub struct MockTransportHandle {
    tx: mpsc::UnboundedSender<MockEvent>,
    stats: Arc<MockStats>,
}

impl MockTransport {
    /// Create a transport and its control handle
    pub fn new(id: impl Into<String>) -> (Self, MockTransportHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(MockStats::default());
        let transport = Self {
            id: id.into(),
            state: AsyncMutex::new(ReadState {
                rx,
                pending: Bytes::new(),
            }),
            _tx: tx.clone(),
            closed: AtomicBool::new(false),
            stats: stats.clone(),
        };
        (transport, MockTransportHandle { tx, stats })
    }

    /// Transport that yields `chunks` in order, then end-of-stream
    pub fn scripted<I, B>(id: impl Into<String>, chunks: I) -> (Self, MockTransportHandle)
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let (transport, handle) = Self::new(id);
        for chunk in chunks {
            handle.push(chunk);
        }
        handle.end();
        (transport, handle)
    }

    /// Shared call counters
    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }
}

impl MockTransportHandle {
    /// Queue a chunk of bytes
    pub fn push(&self, chunk: impl Into<Bytes>) {
        let _ = self.tx.send(MockEvent::Chunk(chunk.into()));
    }

    /// Queue a read failure
    pub fn fail(&self, message: impl Into<String>) {
        let _ = self.tx.send(MockEvent::Fail(message.into()));
    }

    /// Queue end-of-stream
    pub fn end(&self) {
        let _ = self.tx.send(MockEvent::End);
    }

    /// Shared call counters
    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }
}

impl Transport for MockTransport {
    fn id(&self) -> &str {
        &self.id
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::closed(&self.id));
        }
        self.stats.reads.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().await;
        if state.pending.is_empty() {
            match state.rx.recv().await {
                Some(MockEvent::Chunk(chunk)) => state.pending = chunk,
                Some(MockEvent::Fail(message)) => {
                    return Err(TransportError::read(&self.id, message));
                }
                Some(MockEvent::End) | None => return Err(TransportError::EndOfStream),
            }
        }

        let n = buf.len().min(state.pending.len());
        let chunk = state.pending.split_to(n);
        buf[..n].copy_from_slice(&chunk);
        trace!(port = %self.id, len = n, "mock read");
        Ok(n)
    }

    async fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::closed(&self.id));
        }
        self.stats.writes.fetch_add(1, Ordering::SeqCst);
        match self.stats.written.lock() {
            Ok(mut guard) => guard.extend_from_slice(data),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(data),
        }
        Ok(data.len())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
