//! HTTP integration
//!
//! Mounts the stream, subscribe and unsubscribe endpoints on an axum router
//! backed by one shared [`BroadcastEngine`](crate::engine::BroadcastEngine).

pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::TransmitServer;
pub use routes::{transmit_routes, TransmitState};
