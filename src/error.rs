//! Crate-level error type
//!
//! Module errors (`RegistryError`, `SubscribeError`, `TransportError`) convert
//! into [`Error`] so callers can use a single `Result` alias.

use thiserror::Error;

use crate::engine::SubscribeError;
use crate::registry::RegistryError;
use crate::transport::TransportError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Stream registration failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Subscription rejected
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),

    /// Write side of a stream failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Listener or socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Engine has been shut down and accepts no new streams
    #[error("Engine is shutting down")]
    ShuttingDown,
}
