//! Server configuration.

use cardsync_protocol::DEFAULT_PORT;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the card server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Directory holding one serialized card file per resource.
    pub data_dir: PathBuf,
    /// How long shutdown waits for active sessions to drain before
    /// force-closing them.
    pub drain_timeout: Duration,
}

impl ServerConfig {
    /// Creates a configuration serving `data_dir` on `bind_addr`.
    pub fn new(bind_addr: SocketAddr, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            data_dir: data_dir.into(),
            drain_timeout: Duration::from_secs(2),
        }
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the shutdown drain window.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(
            SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            PathBuf::from("cards"),
        )
    }
}
