//! Simple transmit server with a clock channel
//!
//! Run with: cargo run --example simple_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_server                    # binds to 0.0.0.0:3333
//!   cargo run --example simple_server 127.0.0.1:4000     # binds to 127.0.0.1:4000
//!
//! ## Open a stream
//!
//!   curl -N 'http://localhost:3333/__transmit/events?uid=alice'
//!
//! ## Subscribe (in another terminal)
//!
//!   curl -X POST localhost:3333/__transmit/subscribe \
//!        -H 'content-type: application/json' \
//!        -d '{"uid":"alice","channel":"clock"}'
//!
//! ## Private channels
//!
//! `users/:id` channels require `Authorization: Bearer <id>` on subscribe:
//!
//!   curl -X POST localhost:3333/__transmit/subscribe \
//!        -H 'content-type: application/json' -H 'authorization: Bearer alice' \
//!        -d '{"uid":"alice","channel":"users/alice"}'

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use transmit_rs::engine::{ChannelRules, EngineEvent};
use transmit_rs::{BroadcastEngine, Event, RegistryConfig, ServerConfig, TransmitServer, TransportConfig};

fn parse_addr() -> SocketAddr {
    std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or_else(|| ServerConfig::default().bind_addr)
}

#[tokio::main]
async fn main() -> transmit_rs::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transmit_rs=debug,simple_server=info".into()),
        )
        .init();

    let rules = ChannelRules::new().rule("users/:id", |ctx, params| {
        ctx.bearer_token() == params.get("id")
    });

    let engine = Arc::new(
        BroadcastEngine::with_config(
            RegistryConfig::default(),
            TransportConfig::default()
                .keepalive_interval(Duration::from_secs(15))
                .retry(Duration::from_secs(2)),
        )
        .with_authorizer(rules),
    );

    // Log lifecycle events
    let mut lifecycle = engine.lifecycle();
    tokio::spawn(async move {
        while let Ok(event) = lifecycle.recv().await {
            match event {
                EngineEvent::Published { .. } => {}
                other => tracing::info!(event = ?other, "Lifecycle"),
            }
        }
    });

    // Publish the time every second
    let clock = Arc::clone(&engine);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);

            match Event::json("clock", &serde_json::json!({ "now": now })) {
                Ok(event) => {
                    clock.publish(event.with_type("tick")).await;
                }
                Err(e) => tracing::error!(error = %e, "Failed to encode clock event"),
            }
        }
    });

    let server = TransmitServer::new(ServerConfig::with_addr(parse_addr()), engine);
    println!("Transmit server on http://{}/__transmit", server.bind_addr());

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
