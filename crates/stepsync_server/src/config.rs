//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the remote sink server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Directory holding the sample file.
    pub data_dir: PathBuf,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Whether to answer cross-origin requests from any origin.
    pub cors: bool,
    /// Largest accepted request body in bytes. `None` accepts any size.
    pub max_body_bytes: Option<usize>,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            data_dir: PathBuf::from("data"),
            request_timeout: Duration::from_secs(30),
            cors: true,
            max_body_bytes: None,
        }
    }

    /// Sets the data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Caps request bodies at `limit` bytes; larger appends are rejected
    /// with a 400.
    pub fn with_max_body_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Enables or disables permissive CORS.
    pub fn with_cors(mut self, cors: bool) -> Self {
        self.cors = cors;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], 8000)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.cors);
        assert_eq!(config.max_body_bytes, None);
    }

    #[test]
    fn builder_pattern() {
        let config = ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 9000)))
            .with_data_dir("/tmp/steps")
            .with_request_timeout(Duration::from_secs(5))
            .with_cors(false)
            .with_max_body_bytes(Some(1024));

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/steps"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(!config.cors);
        assert_eq!(config.max_body_bytes, Some(1024));
    }
}
