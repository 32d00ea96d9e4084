//! TCP Client
//!
//! Connects to a server and shuttles bytes in both directions from one
//! thread, polling the caller for outbound data once per tick.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::buffer::NetworkBuffer;
use crate::config::Config;
use crate::error::{NetmuxError, Result};
use crate::registry::{ClientId, Connection, ReadOutcome};
use super::endpoint::resolve_endpoint;

/// Callbacks the client loop drives
pub trait ClientHooks {
    /// Called once after the connection is established
    fn on_connect(&mut self, _stream: &TcpStream) {}

    /// Called per chunk read, and once with an empty buffer when a burst of
    /// chunks is followed by a tick with nothing to read
    fn on_received(&mut self, chunk: &NetworkBuffer);

    /// Polled once per tick; `None` when nothing is pending
    fn data_to_write(&mut self) -> Option<NetworkBuffer>;

    /// Returning false ends the client loop
    fn keep_running(&mut self) -> bool {
        true
    }
}

/// Byte counters for a client session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub bytes_sent: u64,
    pub bytes_read: u64,
}

/// Single-connection client
pub struct Client {
    connection: Connection<TcpStream>,
    local_addr: Option<SocketAddr>,
    peer: SocketAddr,

    /// Read window; holds exactly one chunk at a time
    input: NetworkBuffer,

    /// Whether the previous tick read data
    received_last_tick: bool,

    idle_sleep: Duration,
    stats: ClientStats,
}

impl Client {
    /// Resolve the configured endpoint and connect to it
    pub fn connect(config: &Config) -> Result<Self> {
        config.validate()?;
        let peer = resolve_endpoint(&config.listen_addr, config.port)?;
        let stream = TcpStream::connect(peer)
            .map_err(|e| NetmuxError::Network(format!("unable to connect to {}: {}", peer, e)))?;

        if config.nodelay {
            stream.set_nodelay(true)?;
        }
        stream.set_nonblocking(true)?;
        let local_addr = stream.local_addr().ok();

        tracing::info!("connected to {}", peer);
        Ok(Self {
            connection: Connection::new(
                ClientId::LOCAL,
                stream,
                Duration::from_millis(config.write_timeout_ms),
            ),
            local_addr,
            peer,
            input: NetworkBuffer::with_capacity(config.read_chunk_size),
            received_last_tick: false,
            idle_sleep: Duration::from_millis(config.idle_sleep_ms),
            stats: ClientStats::default(),
        })
    }

    /// Run until the server closes the connection or `keep_running` declines
    ///
    /// A failed write ends the loop with an error.
    pub fn work<H: ClientHooks + ?Sized>(&mut self, hooks: &mut H) -> Result<ClientStats> {
        if let Some(stream) = self.connection.transport() {
            hooks.on_connect(stream);
        }

        while self.connection.is_alive() && hooks.keep_running() {
            let wrote = self.keep_writing(hooks)?;
            let read = self.keep_reading(hooks);
            if !wrote && !read && !self.idle_sleep.is_zero() {
                std::thread::sleep(self.idle_sleep);
            }
        }

        tracing::info!(
            "connection to {} closed ({}b sent, {}b read)",
            self.peer,
            self.stats.bytes_sent,
            self.stats.bytes_read
        );
        Ok(self.stats)
    }

    fn keep_writing<H: ClientHooks + ?Sized>(&mut self, hooks: &mut H) -> Result<bool> {
        let Some(data) = hooks.data_to_write() else {
            return Ok(false);
        };
        if data.is_empty() {
            return Ok(false);
        }
        data.write_to(&mut self.connection)?;
        self.stats.bytes_sent += data.len() as u64;
        Ok(true)
    }

    fn keep_reading<H: ClientHooks + ?Sized>(&mut self, hooks: &mut H) -> bool {
        match self.input.fill_from(&mut self.connection) {
            ReadOutcome::Data(n) => {
                self.stats.bytes_read += n as u64;
                self.received_last_tick = true;
                hooks.on_received(&self.input);
                true
            }
            ReadOutcome::Empty | ReadOutcome::Closed => {
                if self.received_last_tick {
                    self.received_last_tick = false;
                    self.input.clear();
                    hooks.on_received(&self.input);
                }
                false
            }
        }
    }

    pub fn stats(&self) -> ClientStats {
        self.stats
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
