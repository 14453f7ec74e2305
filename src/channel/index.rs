//! Channel membership index
//!
//! Forward map channel -> uids for delivery, reverse map uid -> channels for
//! cascading cleanup when a stream goes away.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Subscriptions held by one uid
#[derive(Debug)]
struct Memberships {
    channels: HashSet<String>,

    /// Last subscribe for this uid, used to expire orphans
    touched: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    members: HashMap<String, HashSet<String>>,
    by_uid: HashMap<String, Memberships>,
}

/// Index of channel subscriptions
///
/// Empty subscriber sets are removed eagerly, so an unknown channel and a
/// channel without subscribers look the same to callers.
#[derive(Debug, Default)]
pub struct ChannelIndex {
    inner: RwLock<Inner>,
}

impl ChannelIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `uid` to `channel`
    ///
    /// Returns `true` if this created a new membership.
    pub async fn subscribe(&self, uid: &str, channel: &str) -> bool {
        let mut inner = self.inner.write().await;

        let added = inner
            .members
            .entry(channel.to_string())
            .or_default()
            .insert(uid.to_string());

        let memberships = inner
            .by_uid
            .entry(uid.to_string())
            .or_insert_with(|| Memberships {
                channels: HashSet::new(),
                touched: Instant::now(),
            });
        memberships.channels.insert(channel.to_string());
        memberships.touched = Instant::now();

        added
    }

    /// Remove `uid` from `channel`
    ///
    /// Returns `true` if a membership existed and was removed.
    pub async fn unsubscribe(&self, uid: &str, channel: &str) -> bool {
        let mut inner = self.inner.write().await;

        let removed = match inner.members.get_mut(channel) {
            Some(uids) => {
                let removed = uids.remove(uid);
                if uids.is_empty() {
                    inner.members.remove(channel);
                }
                removed
            }
            None => false,
        };

        if let Some(memberships) = inner.by_uid.get_mut(uid) {
            memberships.channels.remove(channel);
            if memberships.channels.is_empty() {
                inner.by_uid.remove(uid);
            }
        }

        removed
    }

    /// Snapshot of the subscribers of `channel`
    ///
    /// The returned set is owned by the caller; later changes to the index
    /// do not affect it.
    pub async fn subscribers_of(&self, channel: &str) -> Vec<String> {
        self.inner
            .read()
            .await
            .members
            .get(channel)
            .map(|uids| uids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Check a single membership
    pub async fn is_subscribed(&self, uid: &str, channel: &str) -> bool {
        self.inner
            .read()
            .await
            .members
            .get(channel)
            .is_some_and(|uids| uids.contains(uid))
    }

    /// Channels `uid` is subscribed to
    pub async fn channels_of(&self, uid: &str) -> Vec<String> {
        self.inner
            .read()
            .await
            .by_uid
            .get(uid)
            .map(|m| m.channels.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every subscription held by `uid`
    ///
    /// Returns the channels it was removed from.
    pub async fn remove_all(&self, uid: &str) -> Vec<String> {
        let mut inner = self.inner.write().await;

        let Some(memberships) = inner.by_uid.remove(uid) else {
            return Vec::new();
        };

        for channel in &memberships.channels {
            if let Some(uids) = inner.members.get_mut(channel) {
                uids.remove(uid);
                if uids.is_empty() {
                    inner.members.remove(channel);
                }
            }
        }

        memberships.channels.into_iter().collect()
    }

    /// Uids with subscriptions, no open stream, and no subscribe within `ttl`
    pub async fn orphans(&self, open: &HashSet<String>, ttl: Duration) -> Vec<String> {
        let now = Instant::now();

        self.inner
            .read()
            .await
            .by_uid
            .iter()
            .filter(|(uid, m)| {
                !open.contains(uid.as_str()) && now.saturating_duration_since(m.touched) > ttl
            })
            .map(|(uid, _)| uid.clone())
            .collect()
    }

    /// Number of channels with at least one subscriber
    pub async fn channel_count(&self) -> usize {
        self.inner.read().await.members.len()
    }

    /// Total number of (uid, channel) memberships
    pub async fn subscription_count(&self) -> usize {
        self.inner
            .read()
            .await
            .members
            .values()
            .map(HashSet::len)
            .sum()
    }

    /// Remove everything
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.members.clear();
        inner.by_uid.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let index = ChannelIndex::new();

        assert!(index.subscribe("u1", "news").await);
        assert!(!index.subscribe("u1", "news").await);
        assert_eq!(index.subscribers_of("news").await, vec!["u1".to_string()]);
        assert_eq!(index.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let index = ChannelIndex::new();
        index.subscribe("u1", "news").await;

        assert!(index.unsubscribe("u1", "news").await);
        assert!(!index.unsubscribe("u1", "news").await);
        assert!(!index.unsubscribe("u2", "sports").await);
        assert!(index.subscribers_of("news").await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_channel_is_removed() {
        let index = ChannelIndex::new();
        index.subscribe("u1", "news").await;
        index.unsubscribe("u1", "news").await;

        assert_eq!(index.channel_count().await, 0);
        assert!(index.channels_of("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_operations_apply_in_order() {
        let index = ChannelIndex::new();
        let ops = [true, true, false, true, false, false, true];

        for subscribe in ops {
            if subscribe {
                index.subscribe("u1", "news").await;
            } else {
                index.unsubscribe("u1", "news").await;
            }
        }

        assert!(index.is_subscribed("u1", "news").await);
    }

    #[tokio::test]
    async fn test_snapshot_is_stable() {
        let index = ChannelIndex::new();
        index.subscribe("u1", "news").await;

        let snapshot = index.subscribers_of("news").await;
        index.subscribe("u2", "news").await;
        index.unsubscribe("u1", "news").await;

        assert_eq!(snapshot, vec!["u1".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_all() {
        let index = ChannelIndex::new();
        index.subscribe("u1", "news").await;
        index.subscribe("u1", "sports").await;
        index.subscribe("u2", "news").await;

        let mut removed = index.remove_all("u1").await;
        removed.sort();

        assert_eq!(removed, vec!["news".to_string(), "sports".to_string()]);
        assert_eq!(index.subscribers_of("news").await, vec!["u2".to_string()]);
        assert!(index.subscribers_of("sports").await.is_empty());
        assert_eq!(index.channel_count().await, 1);
        assert!(index.remove_all("u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_orphans() {
        let index = ChannelIndex::new();
        index.subscribe("connected", "news").await;
        index.subscribe("orphan", "news").await;

        let open: HashSet<String> = ["connected".to_string()].into_iter().collect();

        assert!(index.orphans(&open, Duration::from_secs(60)).await.is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let orphans = index.orphans(&open, Duration::from_millis(5)).await;
        assert_eq!(orphans, vec!["orphan".to_string()]);
    }
}
