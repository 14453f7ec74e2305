//! Per-stream entry stored in the registry

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::event::Event;

/// Result of handing an event to a stream's delivery queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Event queued for the transport
    Queued,
    /// Queue full, event dropped for this subscriber
    Full,
    /// Stream closed, event dropped and stream should be reaped
    Closed,
}

/// One open event stream
///
/// Owned by the registry behind an `Arc`. The transport task only holds a
/// `Weak` to it, so dropping the registry entry is what ends its lifetime.
#[derive(Debug)]
pub struct ClientStream {
    uid: String,

    /// Process-unique generation number
    connection_id: u64,

    /// Sending half of the delivery queue
    tx: mpsc::Sender<Event>,

    /// Stops the transport task
    cancel: CancellationToken,

    opened_at: Instant,

    /// Milliseconds since `opened_at` of the last completed write
    last_activity_ms: AtomicU64,

    alive: AtomicBool,
}

impl ClientStream {
    pub(crate) fn new(
        uid: impl Into<String>,
        connection_id: u64,
        tx: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            uid: uid.into(),
            connection_id,
            tx,
            cancel,
            opened_at: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            alive: AtomicBool::new(true),
        }
    }

    /// Client identifier
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Generation number of this connection
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// When the stream was opened
    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Whether the stream is still accepting events
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Record write activity; never moves backwards
    pub fn touch(&self) {
        let elapsed = self.opened_at.elapsed().as_millis() as u64;
        self.last_activity_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Time of the last completed write (or open)
    pub fn last_activity(&self) -> Instant {
        self.opened_at + Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed))
    }

    /// How long the stream has gone without a completed write
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity())
    }

    /// Number of events waiting in the delivery queue
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Hand an event to the transport without waiting
    pub(crate) fn deliver(&self, event: Event) -> Delivery {
        if !self.is_alive() {
            return Delivery::Closed;
        }

        match self.tx.try_send(event) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Mark dead and stop the transport
    ///
    /// Returns `true` only for the call that actually terminated the stream.
    pub(crate) fn terminate(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::AcqRel);
        self.cancel.cancel();
        was_alive
    }

    /// Snapshot for diagnostics
    pub fn info(&self) -> StreamInfo {
        let now = Instant::now();
        StreamInfo {
            uid: self.uid.clone(),
            connection_id: self.connection_id,
            age: now.saturating_duration_since(self.opened_at),
            idle: self.idle_for(now),
            queued: self.queued(),
        }
    }
}

/// Point-in-time view of a stream
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Client identifier
    pub uid: String,
    /// Generation number
    pub connection_id: u64,
    /// Time since open
    pub age: Duration,
    /// Time since last completed write
    pub idle: Duration,
    /// Events waiting in the delivery queue
    pub queued: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(capacity: usize) -> (ClientStream, mpsc::Receiver<Event>, CancellationToken) {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        (ClientStream::new("u1", 1, tx, cancel.clone()), rx, cancel)
    }

    #[test]
    fn test_deliver_queued() {
        let (stream, mut rx, _) = stream(4);

        assert_eq!(stream.deliver(Event::new("news", "a")), Delivery::Queued);
        assert_eq!(stream.queued(), 1);
        assert_eq!(rx.try_recv().unwrap().data().as_ref(), b"a");
    }

    #[test]
    fn test_deliver_full() {
        let (stream, _rx, _) = stream(1);

        assert_eq!(stream.deliver(Event::new("news", "a")), Delivery::Queued);
        assert_eq!(stream.deliver(Event::new("news", "b")), Delivery::Full);
    }

    #[test]
    fn test_deliver_after_receiver_dropped() {
        let (stream, rx, _) = stream(4);
        drop(rx);

        assert_eq!(stream.deliver(Event::new("news", "a")), Delivery::Closed);
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let (stream, _rx, cancel) = stream(4);

        assert!(stream.terminate());
        assert!(!stream.terminate());
        assert!(!stream.is_alive());
        assert!(cancel.is_cancelled());
        assert_eq!(stream.deliver(Event::new("news", "a")), Delivery::Closed);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let (stream, _rx, _) = stream(4);
        let before = stream.last_activity();

        stream.touch();
        assert!(stream.last_activity() >= before);
    }
}
