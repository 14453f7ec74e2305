//! Broadcasting engine
//!
//! Combines the connection registry and the channel index: opens and closes
//! streams, manages subscriptions, and fans published events out to the
//! subscribers of a channel.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::ChannelIndex;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::registry::{ClientStream, ConnectionRegistry, Delivery, RegistryConfig, RegistryError};
use crate::stats::{EngineMetrics, EngineStats};
use crate::transport::{StreamTransport, TransportConfig, TransportExit};

use super::authorizer::{AllowAll, ChannelAuthorizer};
use super::context::SubscribeContext;
use super::error::SubscribeError;
use super::lifecycle::{DisconnectReason, EngineEvent};

/// Capacity of the lifecycle notification channel
const LIFECYCLE_CAPACITY: usize = 1024;

/// Outcome of one publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers whose queue accepted the event
    pub delivered: usize,
    /// Subscribers whose queue was full or closed
    pub dropped: usize,
    /// Subscribers without an open stream
    pub skipped: usize,
    /// Subscribers excluded by the caller
    pub excluded: usize,
}

/// Handle to an open stream, returned by [`BroadcastEngine::create_stream`]
#[derive(Debug)]
pub struct StreamHandle {
    uid: String,
    connection_id: u64,
    cancel: CancellationToken,
    task: JoinHandle<TransportExit>,
}

impl StreamHandle {
    /// Client identifier
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Generation number of this connection
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Whether the transport has stopped or been asked to stop
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.task.is_finished()
    }

    /// Ask the transport to stop; cleanup follows asynchronously
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Wait for the transport to stop
    pub async fn closed(self) -> Option<TransportExit> {
        self.task.await.ok()
    }
}

/// The broadcasting engine
///
/// Create one per process, wrap it in an `Arc`, and share it with request
/// handlers. Streams are spawned as tasks that hold a clone of that `Arc`
/// until they end; [`shutdown`](Self::shutdown) ends all of them.
///
/// Streams and subscriptions are only reachable through the engine, so
/// closing a stream always drops its subscriptions too:
///
/// ```compile_fail
/// let engine = transmit_rs::BroadcastEngine::new();
/// let _ = engine.registry();
/// ```
pub struct BroadcastEngine {
    registry: ConnectionRegistry,
    index: ChannelIndex,
    authorizer: Arc<dyn ChannelAuthorizer>,
    transport_config: TransportConfig,
    metrics: EngineMetrics,
    lifecycle: broadcast::Sender<EngineEvent>,

    /// Parent of every stream's cancellation token
    shutdown: CancellationToken,

    next_connection_id: AtomicU64,
}

impl BroadcastEngine {
    /// Create an engine with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default(), TransportConfig::default())
    }

    /// Create an engine with custom configuration
    ///
    /// The keep-alive interval is lowered below the idle timeout if needed,
    /// so quiet but healthy streams are never reaped as idle.
    pub fn with_config(registry_config: RegistryConfig, transport_config: TransportConfig) -> Self {
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        let transport_config = fit_keepalive(&registry_config, transport_config);

        Self {
            registry: ConnectionRegistry::with_config(registry_config),
            index: ChannelIndex::new(),
            authorizer: Arc::new(AllowAll),
            transport_config,
            metrics: EngineMetrics::new(),
            lifecycle,
            shutdown: CancellationToken::new(),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Replace the channel authorizer
    pub fn with_authorizer(mut self, authorizer: impl ChannelAuthorizer + 'static) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    /// Subscribe to lifecycle notifications
    pub fn lifecycle(&self) -> broadcast::Receiver<EngineEvent> {
        self.lifecycle.subscribe()
    }

    /// Open an event stream for `uid`, writing frames to `writer`
    ///
    /// The uid is chosen by the client; subscribe and unsubscribe requests
    /// refer to the stream by it. The transport runs as its own task until
    /// the stream is closed, replaced, reaped, or the writer fails.
    pub async fn create_stream<W>(self: &Arc<Self>, uid: &str, writer: W) -> Result<StreamHandle>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        if uid.is_empty() {
            return Err(RegistryError::InvalidId.into());
        }

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let capacity = self.registry.config().delivery_queue_capacity;
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = self.shutdown.child_token();

        let stream = Arc::new(ClientStream::new(uid, connection_id, tx, cancel.clone()));
        let weak = Arc::downgrade(&stream);

        if let Some(replaced) = self.registry.open(stream).await? {
            self.metrics.stream_closed();
            self.notify(EngineEvent::Disconnected {
                uid: uid.to_string(),
                connection_id: replaced.connection_id(),
                reason: DisconnectReason::Replaced,
            });
        }
        self.metrics.stream_opened();
        self.notify(EngineEvent::Connected {
            uid: uid.to_string(),
            connection_id,
        });

        let transport = StreamTransport::new(
            writer,
            rx,
            cancel.clone(),
            weak,
            self.transport_config.clone(),
        );

        let engine = Arc::clone(self);
        let task_uid = uid.to_string();
        let task = tokio::spawn(async move {
            let exit = transport.run().await;
            engine.on_transport_exit(&task_uid, connection_id, &exit).await;
            exit
        });

        Ok(StreamHandle {
            uid: uid.to_string(),
            connection_id,
            cancel,
            task,
        })
    }

    /// Close the stream for `uid` and drop all of its subscriptions
    ///
    /// Returns whether a stream was open. Does not wait for the transport.
    pub async fn close_stream(&self, uid: &str) -> bool {
        match self.registry.remove(uid).await {
            Some(stream) => {
                self.release(uid, stream.connection_id(), DisconnectReason::Closed)
                    .await;
                true
            }
            None => false,
        }
    }

    /// Subscribe `uid` to `channel`
    ///
    /// Returns `false` for an empty uid or channel, when the authorizer
    /// rejects the request, or (if configured) when `uid` has no open stream.
    pub async fn subscribe_to_channel(
        &self,
        uid: &str,
        channel: &str,
        ctx: &SubscribeContext,
    ) -> bool {
        match self.try_subscribe(uid, channel, ctx).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(uid = %uid, channel = %channel, error = %e, "Subscribe refused");
                false
            }
        }
    }

    /// Subscribe with a typed error
    ///
    /// `Ok(true)` means a new membership was created, `Ok(false)` that it
    /// already existed.
    pub async fn try_subscribe(
        &self,
        uid: &str,
        channel: &str,
        ctx: &SubscribeContext,
    ) -> std::result::Result<bool, SubscribeError> {
        if uid.is_empty() || channel.is_empty() {
            return Err(SubscribeError::InvalidId);
        }

        if self.registry.config().require_open_stream && !self.registry.is_open(uid).await {
            return Err(SubscribeError::NotConnected(uid.to_string()));
        }

        if !self.authorizer.authorize(ctx, channel) {
            return Err(SubscribeError::Unauthorized(channel.to_string()));
        }

        let created = self.index.subscribe(uid, channel).await;
        if created {
            tracing::debug!(uid = %uid, channel = %channel, "Subscribed");
            self.notify(EngineEvent::Subscribed {
                uid: uid.to_string(),
                channel: channel.to_string(),
            });
        }

        Ok(created)
    }

    /// Unsubscribe `uid` from `channel`
    ///
    /// Returns `false` only for an empty uid or channel. Unsubscribing from a
    /// channel the uid is not subscribed to succeeds as a no-op.
    pub async fn unsubscribe_from_channel(&self, uid: &str, channel: &str) -> bool {
        self.try_unsubscribe(uid, channel).await.is_ok()
    }

    /// Unsubscribe with a typed error
    ///
    /// `Ok(true)` means a membership was removed.
    pub async fn try_unsubscribe(
        &self,
        uid: &str,
        channel: &str,
    ) -> std::result::Result<bool, SubscribeError> {
        if uid.is_empty() || channel.is_empty() {
            return Err(SubscribeError::InvalidId);
        }

        let removed = self.index.unsubscribe(uid, channel).await;
        if removed {
            tracing::debug!(uid = %uid, channel = %channel, "Unsubscribed");
            self.notify(EngineEvent::Unsubscribed {
                uid: uid.to_string(),
                channel: channel.to_string(),
            });
        }

        Ok(removed)
    }

    /// Deliver `event` to every subscriber of its channel
    pub async fn publish(&self, event: Event) -> DeliveryReport {
        self.publish_except(event, &[]).await
    }

    /// Deliver `event` to every subscriber of its channel except `excluded`
    ///
    /// Works on a snapshot of the subscriber set. Each subscriber is handled
    /// independently: a closed stream is reaped, a full queue drops the event
    /// for that subscriber only. Never waits on network I/O.
    pub async fn publish_except(&self, event: Event, excluded: &[&str]) -> DeliveryReport {
        let channel = event.channel().to_string();
        let subscribers = self.index.subscribers_of(&channel).await;

        let mut report = DeliveryReport::default();
        let mut dead = Vec::new();

        for uid in subscribers {
            if excluded.contains(&uid.as_str()) {
                report.excluded += 1;
                continue;
            }

            let Some(stream) = self.registry.get(&uid).await else {
                report.skipped += 1;
                continue;
            };

            match stream.deliver(event.clone()) {
                Delivery::Queued => report.delivered += 1,
                Delivery::Full => {
                    report.dropped += 1;
                    tracing::warn!(uid = %uid, channel = %channel, "Delivery queue full, event dropped");
                }
                Delivery::Closed => {
                    report.dropped += 1;
                    dead.push((uid, stream.connection_id()));
                }
            }
        }

        for (uid, connection_id) in dead {
            self.reap(&uid, connection_id, DisconnectReason::PeerGone)
                .await;
        }

        self.metrics.event_published();
        self.metrics.frames_queued(report.delivered as u64);
        self.metrics.frames_dropped(report.dropped as u64);

        tracing::debug!(
            channel = %channel,
            delivered = report.delivered,
            dropped = report.dropped,
            skipped = report.skipped,
            "Event published"
        );

        self.notify(EngineEvent::Published {
            channel,
            recipients: report.delivered,
        });

        report
    }

    /// Snapshot of the subscribers of `channel`
    pub async fn subscribers_of(&self, channel: &str) -> Vec<String> {
        self.index.subscribers_of(channel).await
    }

    /// Channels `uid` is subscribed to
    pub async fn channels_of(&self, uid: &str) -> Vec<String> {
        self.index.channels_of(uid).await
    }

    /// Whether `uid` has an open stream
    pub async fn is_open(&self, uid: &str) -> bool {
        self.registry.is_open(uid).await
    }

    /// Engine statistics
    pub async fn stats(&self) -> EngineStats {
        let mut stats = self.metrics.snapshot();
        stats.open_streams = self.registry.len().await;
        stats.channels = self.index.channel_count().await;
        stats.subscriptions = self.index.subscription_count().await;
        stats
    }

    /// Run cleanup once
    ///
    /// Reaps streams idle beyond the idle timeout and drops subscriptions of
    /// uids that have had no open stream for the orphan TTL.
    pub async fn cleanup(&self) {
        let config = self.registry.config();

        for (uid, connection_id) in self.registry.stale(config.idle_timeout).await {
            tracing::info!(uid = %uid, connection_id = connection_id, "Reaping idle stream");
            self.reap(&uid, connection_id, DisconnectReason::Idle).await;
        }

        let open: HashSet<String> = self.registry.uids().await.into_iter().collect();
        for uid in self
            .index
            .orphans(&open, config.orphan_subscription_ttl)
            .await
        {
            let channels = self.index.remove_all(&uid).await;
            tracing::debug!(uid = %uid, channels = channels.len(), "Orphaned subscriptions removed");
        }
    }

    /// Spawn the background cleanup task
    ///
    /// The task stops on [`shutdown`](Self::shutdown), or when the handle is aborted.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let interval = engine.registry.config().cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = engine.shutdown.cancelled() => break,
                    _ = ticker.tick() => engine.cleanup().await,
                }
            }
        })
    }

    /// Close every stream and forget every subscription
    ///
    /// New streams are refused afterwards.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        for stream in self.registry.drain().await {
            self.metrics.stream_closed();
            self.notify(EngineEvent::Disconnected {
                uid: stream.uid().to_string(),
                connection_id: stream.connection_id(),
                reason: DisconnectReason::Shutdown,
            });
        }
        self.index.clear().await;

        tracing::info!("Broadcast engine shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    async fn on_transport_exit(&self, uid: &str, connection_id: u64, exit: &TransportExit) {
        let reason = match exit {
            TransportExit::Failed(e) => {
                tracing::debug!(uid = %uid, connection_id = connection_id, error = %e, "Stream transport failed");
                DisconnectReason::PeerGone
            }
            TransportExit::Cancelled | TransportExit::QueueClosed => DisconnectReason::Closed,
        };

        // No-op when the stream was already removed or replaced
        self.reap(uid, connection_id, reason).await;
    }

    // Remove a specific connection, then its subscriptions
    async fn reap(&self, uid: &str, connection_id: u64, reason: DisconnectReason) {
        if self.registry.close_if(uid, connection_id).await {
            self.release(uid, connection_id, reason).await;
        }
    }

    async fn release(&self, uid: &str, connection_id: u64, reason: DisconnectReason) {
        // A newer connection for the same uid keeps the subscriptions
        let superseded = matches!(
            self.registry.connection_id_of(uid).await,
            Some(current) if current != connection_id
        );
        let channels = if superseded {
            Vec::new()
        } else {
            self.index.remove_all(uid).await
        };

        self.metrics.stream_closed();
        if matches!(reason, DisconnectReason::PeerGone | DisconnectReason::Idle) {
            self.metrics.stream_failed();
        }

        tracing::info!(
            uid = %uid,
            connection_id = connection_id,
            reason = ?reason,
            channels = channels.len(),
            "Stream released"
        );

        self.notify(EngineEvent::Disconnected {
            uid: uid.to_string(),
            connection_id,
            reason,
        });
    }

    fn notify(&self, event: EngineEvent) {
        // Err only means nobody is listening
        let _ = self.lifecycle.send(event);
    }
}

impl Default for BroadcastEngine {
    fn default() -> Self {
        Self::new()
    }
}

// Keep-alive writes count as activity; they must land inside the idle window
fn fit_keepalive(registry: &RegistryConfig, mut transport: TransportConfig) -> TransportConfig {
    if transport.keepalive_interval >= registry.idle_timeout {
        let fitted = (registry.idle_timeout / 2).max(Duration::from_millis(1));
        tracing::warn!(
            keepalive = ?transport.keepalive_interval,
            idle_timeout = ?registry.idle_timeout,
            fitted = ?fitted,
            "Keep-alive interval not below idle timeout, lowering it"
        );
        transport.keepalive_interval = fitted;
    }
    transport
}
