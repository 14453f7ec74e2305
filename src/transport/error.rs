//! Transport error types

use std::time::Duration;

use thiserror::Error;

/// Failure on the write side of a stream
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection rejected a write (peer gone, pipe closed)
    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),

    /// A write did not complete in time
    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),
}
