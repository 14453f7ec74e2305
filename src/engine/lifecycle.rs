//! Lifecycle notifications
//!
//! The engine publishes an [`EngineEvent`] for every connect, disconnect,
//! subscription change and publish. Receivers that fall behind miss events;
//! nothing in the engine waits on them.

/// Why a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Closed explicitly through the engine or its handle
    Closed,
    /// Another stream was opened with the same uid
    Replaced,
    /// A write failed or timed out
    PeerGone,
    /// No completed write within the idle timeout
    Idle,
    /// Engine shutdown
    Shutdown,
}

/// Engine lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A stream was opened
    Connected { uid: String, connection_id: u64 },
    /// A stream ended
    Disconnected {
        uid: String,
        connection_id: u64,
        reason: DisconnectReason,
    },
    /// A new subscription was created
    Subscribed { uid: String, channel: String },
    /// A subscription was removed
    Unsubscribed { uid: String, channel: String },
    /// An event was fanned out
    Published { channel: String, recipients: usize },
}
