//! Broadcasting engine
//!
//! The façade the HTTP layer talks to. It owns the [`ConnectionRegistry`]
//! and the [`ChannelIndex`] and exposes the three operations the endpoints
//! need (`create_stream`, `subscribe_to_channel`, `unsubscribe_from_channel`)
//! plus `publish` for application code.
//!
//! # Delivery
//!
//! ```text
//!   publish(event)
//!        │
//!        ├─► index.subscribers_of(channel)   (owned snapshot, lock released)
//!        │
//!        └─► for uid in snapshot:
//!               registry.get(uid) ─► stream.deliver(event.clone())
//!                                         │ try_send, never blocks
//!                                         ▼
//!                                   [StreamTransport] ─► client
//! ```
//!
//! A subscriber that joins or leaves while a publish is in flight may or may
//! not receive that event; within one publish call nobody receives it twice.
//!
//! [`ConnectionRegistry`]: crate::registry::ConnectionRegistry
//! [`ChannelIndex`]: crate::channel::ChannelIndex

pub mod authorizer;
pub mod broadcaster;
pub mod context;
pub mod error;
pub mod lifecycle;

pub use authorizer::{AllowAll, ChannelAuthorizer, ChannelRules};
pub use broadcaster::{BroadcastEngine, DeliveryReport, StreamHandle};
pub use context::SubscribeContext;
pub use error::SubscribeError;
pub use lifecycle::{DisconnectReason, EngineEvent};
