//! HTTP endpoints
//!
//! `GET /events?uid=..` opens a stream, `POST /subscribe` and
//! `POST /unsubscribe` take a JSON body `{"uid": .., "channel": ..}` and
//! answer 204 on success, 400 otherwise.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::engine::{BroadcastEngine, SubscribeContext};
use crate::error::Error;
use crate::registry::RegistryError;

use super::config::ServerConfig;

/// State shared by the handlers
#[derive(Clone)]
pub struct TransmitState {
    engine: Arc<BroadcastEngine>,
    pipe_capacity: usize,
}

impl TransmitState {
    pub fn new(engine: Arc<BroadcastEngine>, config: &ServerConfig) -> Self {
        Self {
            engine,
            pipe_capacity: config.pipe_capacity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Deserialize)]
pub struct ChannelRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub channel: String,
}

/// Build the router for the three endpoints (without prefix)
pub fn transmit_routes(state: TransmitState) -> Router {
    Router::new()
        .route("/events", get(events_handler))
        .route("/subscribe", post(subscribe_handler))
        .route("/unsubscribe", post(unsubscribe_handler))
        .with_state(state)
}

/// Open an event stream
async fn events_handler(
    State(state): State<TransmitState>,
    Query(query): Query<StreamQuery>,
) -> Response {
    if query.uid.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    // The transport writes into one end; the response body reads the other.
    // When the client goes away the body is dropped and the next write fails.
    let (reader, writer) = tokio::io::duplex(state.pipe_capacity);

    match state.engine.create_stream(&query.uid, writer).await {
        Ok(_) => {}
        Err(Error::Registry(RegistryError::AlreadyOpen(_))) => {
            return StatusCode::CONFLICT.into_response();
        }
        Err(Error::Registry(RegistryError::InvalidId)) => {
            return StatusCode::BAD_REQUEST.into_response();
        }
        Err(Error::Registry(RegistryError::LimitReached(_))) | Err(Error::ShuttingDown) => {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        Err(e) => {
            tracing::error!(uid = %query.uid, error = %e, "Failed to open stream");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        ),
    ];

    (headers, Body::from_stream(ReaderStream::new(reader))).into_response()
}

/// Subscribe a uid to a channel
async fn subscribe_handler(
    State(state): State<TransmitState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<ChannelRequest>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(request)) = body else {
        return StatusCode::BAD_REQUEST;
    };

    let mut ctx = SubscribeContext::new(request.uid.as_str());
    if let Some(ConnectInfo(addr)) = peer {
        ctx = ctx.with_peer_addr(addr);
    }
    for (name, value) in &headers {
        if let Ok(value) = value.to_str() {
            ctx.insert_metadata(name.as_str(), value);
        }
    }

    if state
        .engine
        .subscribe_to_channel(&request.uid, &request.channel, &ctx)
        .await
    {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::BAD_REQUEST
    }
}

/// Unsubscribe a uid from a channel
async fn unsubscribe_handler(
    State(state): State<TransmitState>,
    body: Result<Json<ChannelRequest>, JsonRejection>,
) -> StatusCode {
    let Ok(Json(request)) = body else {
        return StatusCode::BAD_REQUEST;
    };

    if state
        .engine
        .unsubscribe_from_channel(&request.uid, &request.channel)
        .await
    {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::BAD_REQUEST
    }
}
