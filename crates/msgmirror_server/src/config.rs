//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the feed server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Request path accepting WebSocket upgrades.
    pub path: String,
    /// Interval between keep-alive pings.
    pub ping_interval: Duration,
    /// Outbound frames buffered per client before it is dropped.
    pub client_buffer: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            path: "/ws".into(),
            ping_interval: Duration::from_secs(5),
            client_buffer: 32,
        }
    }

    /// Sets the WebSocket path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the keep-alive ping interval.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the per-client outbound buffer.
    pub fn with_client_buffer(mut self, frames: usize) -> Self {
        self.client_buffer = frames.max(1);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.path, "/ws");
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.client_buffer, 32);
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_path("/feed")
            .with_ping_interval(Duration::from_millis(250))
            .with_client_buffer(0);

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.path, "/feed");
        assert_eq!(config.ping_interval, Duration::from_millis(250));
        assert_eq!(config.client_buffer, 1);
    }
}
