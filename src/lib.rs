//! Server-sent events broadcasting engine
//!
//! Clients open a long-lived event stream identified by a client-chosen
//! `uid`, subscribe that uid to named channels, and receive every event
//! published to those channels over the stream.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use transmit_rs::{BroadcastEngine, Event, ServerConfig, TransmitServer};
//!
//! # async fn example() -> transmit_rs::Result<()> {
//! let engine = Arc::new(BroadcastEngine::new());
//! let server = TransmitServer::new(ServerConfig::default(), Arc::clone(&engine));
//!
//! tokio::spawn(async move {
//!     engine.publish(Event::new("news", "hello")).await;
//! });
//!
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```
//!
//! Modules, leaf first:
//!
//! - [`registry`]: open streams keyed by uid
//! - [`channel`]: channel membership index
//! - [`transport`]: per-connection SSE writer task
//! - [`engine`]: the façade combining the above
//! - [`server`]: axum routes and listener

pub mod channel;
pub mod engine;
pub mod error;
pub mod event;
pub mod registry;
pub mod server;
pub mod stats;
pub mod transport;

pub use engine::{BroadcastEngine, DeliveryReport, StreamHandle, SubscribeContext};
pub use error::{Error, Result};
pub use event::Event;
pub use registry::RegistryConfig;
pub use server::{ServerConfig, TransmitServer};
pub use transport::TransportConfig;
