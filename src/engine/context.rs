//! Context handed to channel authorizers

use std::collections::HashMap;
use std::net::SocketAddr;

/// Information about a subscribe request
///
/// Built by the HTTP layer from the incoming request. The engine does not
/// interpret it; it only passes it to the configured authorizer.
#[derive(Debug, Clone, Default)]
pub struct SubscribeContext {
    uid: String,
    peer_addr: Option<SocketAddr>,

    /// Request metadata (headers), keys lowercased
    metadata: HashMap<String, String>,
}

impl SubscribeContext {
    /// Create a context for `uid`
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Default::default()
        }
    }

    /// Set the remote address
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert_metadata(key, value);
        self
    }

    /// Add a metadata entry in place
    pub fn insert_metadata(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.metadata
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Client identifier of the subscriber
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Remote address, if known
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Look up a metadata entry (case-insensitive key)
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Bearer token from the `authorization` entry
    pub fn bearer_token(&self) -> Option<&str> {
        self.metadata("authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_case_insensitive() {
        let ctx = SubscribeContext::new("u1").with_metadata("X-Tenant", "acme");

        assert_eq!(ctx.metadata("x-tenant"), Some("acme"));
        assert_eq!(ctx.metadata("X-TENANT"), Some("acme"));
        assert_eq!(ctx.metadata("other"), None);
    }

    #[test]
    fn test_bearer_token() {
        let ctx = SubscribeContext::new("u1").with_metadata("Authorization", "Bearer abc");
        assert_eq!(ctx.bearer_token(), Some("abc"));

        let ctx = SubscribeContext::new("u1").with_metadata("Authorization", "Basic abc");
        assert_eq!(ctx.bearer_token(), None);

        let ctx = SubscribeContext::new("u1").with_metadata("Authorization", "Bearer ");
        assert_eq!(ctx.bearer_token(), None);
    }
}
