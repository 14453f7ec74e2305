//! Registry error types

use thiserror::Error;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Client identifier is empty
    #[error("Invalid client id")]
    InvalidId,

    /// A live stream already exists for this uid (reject policy)
    #[error("Stream already open: {0}")]
    AlreadyOpen(String),

    /// The configured stream limit is reached
    #[error("Stream limit reached ({0})")]
    LimitReached(usize),
}
