//! Connection registry implementation
//!
//! Maps client identifiers to their single live stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::config::{DuplicatePolicy, RegistryConfig};
use super::entry::{ClientStream, StreamInfo};
use super::error::RegistryError;

/// Registry of all open streams
///
/// Thread-safe via `RwLock`. Delivery only takes the read lock and never
/// holds it across a network write; writes happen in the transport tasks.
pub struct ConnectionRegistry {
    /// Map of uid to its live stream
    streams: RwLock<HashMap<String, Arc<ClientStream>>>,

    /// Configuration
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a stream under its uid
    ///
    /// With [`DuplicatePolicy::Replace`] an existing stream for the same uid is
    /// terminated and returned. With [`DuplicatePolicy::Reject`] the call fails
    /// and the existing stream is left untouched.
    pub async fn open(
        &self,
        stream: Arc<ClientStream>,
    ) -> Result<Option<Arc<ClientStream>>, RegistryError> {
        if stream.uid().is_empty() {
            return Err(RegistryError::InvalidId);
        }

        let mut streams = self.streams.write().await;

        match streams.get(stream.uid()) {
            Some(existing) => {
                if existing.is_alive() && self.config.duplicate_policy == DuplicatePolicy::Reject {
                    return Err(RegistryError::AlreadyOpen(stream.uid().to_string()));
                }
            }
            None => {
                let max = self.config.max_streams;
                if max > 0 && streams.len() >= max {
                    tracing::warn!(uid = %stream.uid(), max = max, "Stream rejected: limit reached");
                    return Err(RegistryError::LimitReached(max));
                }
            }
        }

        let uid = stream.uid().to_string();
        let connection_id = stream.connection_id();
        let replaced = streams.insert(uid.clone(), stream);

        if let Some(ref old) = replaced {
            old.terminate();
            tracing::info!(
                uid = %uid,
                old_connection = old.connection_id(),
                connection_id = connection_id,
                "Stream replaced"
            );
        } else {
            tracing::info!(uid = %uid, connection_id = connection_id, "Stream opened");
        }

        Ok(replaced)
    }

    /// Terminate and remove the stream for `uid`
    ///
    /// Returns whether a stream existed. Does not wait for the transport.
    pub async fn close(&self, uid: &str) -> bool {
        self.remove(uid).await.is_some()
    }

    /// Terminate and remove the stream for `uid`, returning it
    pub async fn remove(&self, uid: &str) -> Option<Arc<ClientStream>> {
        let stream = self.streams.write().await.remove(uid)?;
        stream.terminate();

        tracing::info!(
            uid = %uid,
            connection_id = stream.connection_id(),
            "Stream closed"
        );

        Some(stream)
    }

    /// Remove the stream for `uid` only if it is still the given connection
    ///
    /// Used when a transport ends on its own, so that an old connection
    /// never removes the stream that replaced it.
    pub async fn close_if(&self, uid: &str, connection_id: u64) -> bool {
        let mut streams = self.streams.write().await;

        match streams.get(uid) {
            Some(stream) if stream.connection_id() == connection_id => {
                if let Some(stream) = streams.remove(uid) {
                    stream.terminate();
                }
                tracing::debug!(uid = %uid, connection_id = connection_id, "Stream reaped");
                true
            }
            _ => false,
        }
    }

    /// Get the live stream for `uid`
    pub(crate) async fn get(&self, uid: &str) -> Option<Arc<ClientStream>> {
        self.streams
            .read()
            .await
            .get(uid)
            .filter(|stream| stream.is_alive())
            .cloned()
    }

    /// Check if a live stream is registered for `uid`
    pub async fn is_open(&self, uid: &str) -> bool {
        self.get(uid).await.is_some()
    }

    /// Number of registered streams
    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Whether no stream is registered
    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }

    /// All registered uids
    pub async fn uids(&self) -> Vec<String> {
        self.streams.read().await.keys().cloned().collect()
    }

    /// Diagnostics for one stream
    pub async fn info(&self, uid: &str) -> Option<StreamInfo> {
        self.streams.read().await.get(uid).map(|stream| stream.info())
    }

    /// Streams without a completed write for longer than `idle_timeout`
    ///
    /// Returns `(uid, connection_id)` pairs for use with [`close_if`](Self::close_if).
    pub async fn stale(&self, idle_timeout: Duration) -> Vec<(String, u64)> {
        let now = Instant::now();

        self.streams
            .read()
            .await
            .values()
            .filter(|stream| !stream.is_alive() || stream.idle_for(now) > idle_timeout)
            .map(|stream| (stream.uid().to_string(), stream.connection_id()))
            .collect()
    }

    /// Connection id of the stream registered for `uid`
    pub async fn connection_id_of(&self, uid: &str) -> Option<u64> {
        self.streams
            .read()
            .await
            .get(uid)
            .map(|stream| stream.connection_id())
    }

    /// Terminate and remove every stream
    pub async fn drain(&self) -> Vec<Arc<ClientStream>> {
        let drained: Vec<_> = self.streams.write().await.drain().map(|(_, s)| s).collect();

        for stream in &drained {
            stream.terminate();
        }

        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "All streams closed");
        }

        drained
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::event::Event;

    fn client(uid: &str, id: u64) -> (Arc<ClientStream>, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(8);
        let stream = ClientStream::new(uid, id, tx, CancellationToken::new());
        (Arc::new(stream), rx)
    }

    #[tokio::test]
    async fn test_open_and_close() {
        let registry = ConnectionRegistry::new();
        let (stream, _rx) = client("u1", 1);

        assert!(registry.open(stream).await.unwrap().is_none());
        assert!(registry.is_open("u1").await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.close("u1").await);
        assert!(!registry.is_open("u1").await);
        assert!(!registry.close("u1").await);
    }

    #[tokio::test]
    async fn test_open_empty_uid() {
        let registry = ConnectionRegistry::new();
        let (stream, _rx) = client("", 1);

        assert!(matches!(
            registry.open(stream).await,
            Err(RegistryError::InvalidId)
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_open_replaces_existing() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = client("u1", 1);
        let (second, _rx2) = client("u1", 2);

        registry.open(Arc::clone(&first)).await.unwrap();
        let replaced = registry.open(second).await.unwrap().unwrap();

        assert_eq!(replaced.connection_id(), 1);
        assert!(!first.is_alive());
        assert_eq!(registry.get("u1").await.unwrap().connection_id(), 2);
    }

    #[tokio::test]
    async fn test_open_rejects_existing() {
        let config = RegistryConfig::default().duplicate_policy(DuplicatePolicy::Reject);
        let registry = ConnectionRegistry::with_config(config);
        let (first, _rx1) = client("u1", 1);
        let (second, _rx2) = client("u1", 2);

        registry.open(Arc::clone(&first)).await.unwrap();
        let result = registry.open(second).await;

        assert!(matches!(result, Err(RegistryError::AlreadyOpen(ref uid)) if uid == "u1"));
        assert!(first.is_alive());
        assert_eq!(registry.get("u1").await.unwrap().connection_id(), 1);
    }

    #[tokio::test]
    async fn test_stream_limit_allows_replacement() {
        let registry = ConnectionRegistry::with_config(RegistryConfig::default().max_streams(1));
        let (first, _rx1) = client("u1", 1);
        let (again, _rx2) = client("u1", 2);
        let (other, _rx3) = client("u2", 3);

        registry.open(first).await.unwrap();

        // Same uid replaces its own slot
        assert!(registry.open(again).await.unwrap().is_some());
        assert_eq!(registry.connection_id_of("u1").await, Some(2));

        assert!(matches!(
            registry.open(other).await,
            Err(RegistryError::LimitReached(1))
        ));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_close_if_ignores_replaced_connection() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = client("u1", 1);
        let (second, _rx2) = client("u1", 2);

        registry.open(first).await.unwrap();
        registry.open(second).await.unwrap();

        // The old connection's transport finishing must not remove the new one
        assert!(!registry.close_if("u1", 1).await);
        assert!(registry.is_open("u1").await);

        assert!(registry.close_if("u1", 2).await);
        assert!(!registry.is_open("u1").await);
    }

    #[tokio::test]
    async fn test_stale_streams() {
        let registry = ConnectionRegistry::new();
        let (stream, _rx) = client("u1", 1);
        registry.open(stream).await.unwrap();

        assert!(registry.stale(Duration::from_secs(60)).await.is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let stale = registry.stale(Duration::from_millis(5)).await;
        assert_eq!(stale, vec![("u1".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_drain() {
        let registry = ConnectionRegistry::new();
        let (a, _rx1) = client("a", 1);
        let (b, _rx2) = client("b", 2);
        registry.open(Arc::clone(&a)).await.unwrap();
        registry.open(Arc::clone(&b)).await.unwrap();

        let drained = registry.drain().await;

        assert_eq!(drained.len(), 2);
        assert!(!a.is_alive());
        assert!(!b.is_alive());
        assert!(registry.is_empty().await);
    }
}
