//! HTTP server listener
//!
//! Binds the endpoints, runs the registry cleanup task alongside the accept
//! loop, and shuts the engine down when the server stops.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::engine::BroadcastEngine;
use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::routes::{transmit_routes, TransmitState};

/// Server exposing a [`BroadcastEngine`] over HTTP
pub struct TransmitServer {
    config: ServerConfig,
    engine: Arc<BroadcastEngine>,
}

impl TransmitServer {
    /// Create a new server for `engine`
    pub fn new(config: ServerConfig, engine: Arc<BroadcastEngine>) -> Self {
        Self { config, engine }
    }

    /// Get a reference to the engine
    pub fn engine(&self) -> &Arc<BroadcastEngine> {
        &self.engine
    }

    /// Router with the endpoints mounted under the configured prefix
    ///
    /// Use this to merge the endpoints into an existing application.
    pub fn router(&self) -> Router {
        let routes = transmit_routes(TransmitState::new(
            Arc::clone(&self.engine),
            &self.config,
        ));

        if self.config.route_prefix.is_empty() {
            routes
        } else {
            Router::new().nest(&self.config.route_prefix, routes)
        }
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    ///
    /// When `shutdown` completes the engine is shut down, which ends every
    /// open stream so in-flight responses can finish.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            prefix = %self.config.route_prefix,
            "Transmit server listening"
        );

        // Spawn cleanup task for the registry
        let cleanup_handle = self.engine.spawn_cleanup_task();

        let engine = Arc::clone(&self.engine);
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
                engine.shutdown().await;
            })
            .await;

        // Stop cleanup task on shutdown
        cleanup_handle.abort();

        result.map_err(Into::into)
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
