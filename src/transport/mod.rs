//! Stream transport
//!
//! Serializes events onto a client connection using server-sent events
//! framing, sends keep-alive comments, and turns write failures into a
//! "stream terminated" exit instead of an error.

pub mod config;
pub mod error;
pub mod frame;
pub mod stream;

pub use config::TransportConfig;
pub use error::TransportError;
pub use stream::{StreamTransport, TransportExit};
