//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};

/// HTTP server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Path prefix the three endpoints are mounted under
    pub route_prefix: String,

    /// Buffer between a stream's transport and its HTTP response body
    pub pipe_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 3333)),
            route_prefix: "/__transmit".to_string(),
            pipe_capacity: 64 * 1024, // 64KB
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the route prefix; a leading `/` is added if missing
    ///
    /// An empty prefix (or `/`) mounts the endpoints at the root.
    pub fn route_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        self.route_prefix = if trimmed.is_empty() || trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };
        self
    }

    /// Set the response pipe capacity (minimum 1 byte)
    pub fn pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 3333);
        assert_eq!(config.route_prefix, "/__transmit");
        assert_eq!(config.pipe_capacity, 64 * 1024);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_route_prefix_normalized() {
        assert_eq!(ServerConfig::default().route_prefix("events/").route_prefix, "/events");
        assert_eq!(ServerConfig::default().route_prefix("/sse").route_prefix, "/sse");
        assert_eq!(ServerConfig::default().route_prefix("/").route_prefix, "");
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .pipe_capacity(0);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.pipe_capacity, 1);
    }
}
