//! Framing metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Framing metrics
#[derive(Debug, Default)]
pub struct FramingMetrics {
    /// Total bytes read from the transport
    pub bytes_read: AtomicU64,

    /// Total transport reads that returned data
    pub chunks_read: AtomicU64,

    /// Total frames emitted
    pub frames_emitted: AtomicU64,

    /// Bytes currently held in the accumulation buffer
    pub buffered_bytes: AtomicUsize,
}

impl FramingMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one chunk of `len` bytes
    pub fn record_chunk(&self, len: usize) {
        self.chunks_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Record `count` emitted frames
    pub fn record_frames(&self, count: usize) {
        self.frames_emitted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Update buffered byte count
    pub fn update_buffered(&self, len: usize) {
        self.buffered_bytes.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            chunks_read: self.chunks_read.load(Ordering::Relaxed),
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
            buffered_bytes: self.buffered_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total bytes read
    pub bytes_read: u64,

    /// Total chunks read
    pub chunks_read: u64,

    /// Total frames emitted
    pub frames_emitted: u64,

    /// Bytes left in the accumulation buffer
    pub buffered_bytes: usize,
}
