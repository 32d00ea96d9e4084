//! Configuration for netmux
//!
//! Centralized configuration with sensible defaults.

use crate::error::{NetmuxError, Result};

/// Default TCP port shared by server and client
pub const DEFAULT_PORT: u16 = 8765;

/// Main configuration for a netmux server or client
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Endpoint Configuration
    // -------------------------------------------------------------------------
    /// Host to listen on (server) or connect to (client)
    pub listen_addr: String,

    /// TCP port
    pub port: u16,

    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Size of the per-connection scratch buffer used during a read burst
    pub read_chunk_size: usize,

    /// Max registered connections; extra accepts are closed immediately
    pub max_connections: usize,

    /// How long a write may keep retrying `WouldBlock` (milliseconds)
    pub write_timeout_ms: u64,

    /// Disable Nagle's algorithm on every stream
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Loop Configuration
    // -------------------------------------------------------------------------
    /// Sleep used by idle update hooks between ticks (milliseconds)
    pub idle_sleep_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "localhost".to_string(),
            port: DEFAULT_PORT,
            read_chunk_size: 1024,
            max_connections: 1024,
            write_timeout_ms: 250,
            nodelay: true,
            idle_sleep_ms: 10,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the multiplexer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.read_chunk_size == 0 {
            return Err(NetmuxError::Config("read_chunk_size must be > 0".into()));
        }
        if self.max_connections == 0 {
            return Err(NetmuxError::Config("max_connections must be > 0".into()));
        }
        if self.listen_addr.is_empty() {
            return Err(NetmuxError::Config("listen_addr is empty".into()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the host
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the TCP port (0 picks an ephemeral port)
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the scratch buffer size used per read
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Set the maximum number of registered connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the idle sleep between ticks (in milliseconds)
    pub fn idle_sleep_ms(mut self, ms: u64) -> Self {
        self.config.idle_sleep_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
