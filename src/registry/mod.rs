//! Registry of open event streams
//!
//! Each client identifier (`uid`) maps to at most one live [`ClientStream`].
//! The registry owns the streams; the transport task writing a stream only
//! holds a weak reference, and the delivery path reaches it through
//! the registry lookup.
//!
//! # Architecture
//!
//! ```text
//!                     Arc<ConnectionRegistry>
//!                 ┌───────────────────────────────┐
//!                 │ streams: HashMap<uid,         │
//!                 │   Arc<ClientStream> {         │
//!                 │     tx: mpsc::Sender<Event>,  │
//!                 │     cancel, last_activity,    │
//!                 │   }                           │
//!                 │ >                             │
//!                 └───────────────┬───────────────┘
//!                                 │ try_send
//!         ┌───────────────────────┼───────────────────────┐
//!         ▼                       ▼                       ▼
//!  [StreamTransport]       [StreamTransport]       [StreamTransport]
//!    rx.recv() ──► SSE frame ──► writer (HTTP response body)
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod store;

pub use config::{DuplicatePolicy, RegistryConfig};
pub use entry::{ClientStream, Delivery, StreamInfo};
pub use error::RegistryError;
pub use store::ConnectionRegistry;
