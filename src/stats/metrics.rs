//! Statistics for the broadcasting engine

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters updated on the hot path
///
/// All fields are relaxed atomics; they are informational only.
#[derive(Debug)]
pub struct EngineMetrics {
    started_at: Instant,
    streams_opened: AtomicU64,
    streams_closed: AtomicU64,
    streams_failed: AtomicU64,
    events_published: AtomicU64,
    frames_queued: AtomicU64,
    frames_dropped: AtomicU64,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            streams_opened: AtomicU64::new(0),
            streams_closed: AtomicU64::new(0),
            streams_failed: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            frames_queued: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream_opened(&self) {
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_closed(&self) {
        self.streams_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Stream ended by a write failure or idle reaping
    pub fn stream_failed(&self) {
        self.streams_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_queued(&self, count: u64) {
        self.frames_queued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn frames_dropped(&self, count: u64) {
        self.frames_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Copy the counters into an [`EngineStats`]
    ///
    /// Gauges (open streams, channels, subscriptions) are filled in by the
    /// engine, which owns the registry and index.
    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            uptime: self.started_at.elapsed(),
            streams_opened: self.streams_opened.load(Ordering::Relaxed),
            streams_closed: self.streams_closed.load(Ordering::Relaxed),
            streams_failed: self.streams_failed.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            frames_queued: self.frames_queued.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            ..EngineStats::default()
        }
    }
}

/// Engine-wide statistics
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Currently registered streams
    pub open_streams: usize,
    /// Channels with at least one subscriber
    pub channels: usize,
    /// Total (uid, channel) memberships
    pub subscriptions: usize,
    /// Streams opened since start
    pub streams_opened: u64,
    /// Streams closed since start (any reason)
    pub streams_closed: u64,
    /// Streams closed because of write failure or idleness
    pub streams_failed: u64,
    /// Publish calls
    pub events_published: u64,
    /// Frames handed to transports
    pub frames_queued: u64,
    /// Frames dropped because a subscriber's queue was full or closed
    pub frames_dropped: u64,
    /// Time since the engine was created
    pub uptime: Duration,
}

impl EngineStats {
    /// Fraction of fan-out frames that were dropped
    pub fn drop_ratio(&self) -> f64 {
        let total = self.frames_queued + self.frames_dropped;
        if total > 0 {
            self.frames_dropped as f64 / total as f64
        } else {
            0.0
        }
    }
}
