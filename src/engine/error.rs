//! Subscription error types

use thiserror::Error;

/// Reason a subscribe or unsubscribe request was refused
///
/// The boolean engine API collapses all of these into `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    /// Empty uid or channel
    #[error("Invalid uid or channel")]
    InvalidId,

    /// The authorizer rejected the subscription
    #[error("Not authorized to subscribe to {0}")]
    Unauthorized(String),

    /// No open stream for the uid (only when an open stream is required)
    #[error("No open stream for {0}")]
    NotConnected(String),
}
