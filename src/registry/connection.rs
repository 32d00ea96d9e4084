//! Connection Handle
//!
//! One accepted stream plus its assigned id.

use std::fmt;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use crate::error::{NetmuxError, Result};
use crate::transport::Transport;

/// Pause between write attempts on a full socket buffer
const WRITE_BACKOFF: Duration = Duration::from_millis(1);

/// Identifier assigned to a registered connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl ClientId {
    /// Sender id used for messages produced locally (console, server code)
    pub const LOCAL: ClientId = ClientId(0);
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClientId {
    fn from(id: u64) -> Self {
        ClientId(id)
    }
}

/// Lifecycle of a registered connection
///
/// ```text
/// Active ──liveness fails──► Dead ──purge──► Purged
/// ```
///
/// Before approval an accepted stream is just a `TcpStream` handed to the
/// connect hook; a handle only exists once it is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Active,
    Dead,
    Purged,
}

/// Result of a single non-blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were read
    Data(usize),

    /// Nothing available right now
    Empty,

    /// Peer closed or the transport failed
    Closed,
}

/// Owned handle to one connection's transport
pub struct Connection<T: Transport = TcpStream> {
    id: ClientId,

    /// `None` once the handle has been closed
    transport: Option<T>,

    state: ConnectionState,

    /// Set when a read hit EOF or an I/O call failed
    hung_up: bool,

    /// Bound on retrying `WouldBlock` while writing
    write_timeout: Duration,

    /// Peer address for logging
    peer_addr: String,
}

impl<T: Transport> Connection<T> {
    /// Wrap an approved transport as an `Active` handle
    pub fn new(id: ClientId, transport: T, write_timeout: Duration) -> Self {
        let peer_addr = transport.peer_label();
        Self {
            id,
            transport: Some(transport),
            state: ConnectionState::Active,
            hung_up: false,
            write_timeout,
            peer_addr,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// True iff the transport exists and reports connected
    pub fn is_alive(&self) -> bool {
        match &self.transport {
            Some(transport) => !self.hung_up && transport.is_connected(),
            None => false,
        }
    }

    /// Write all of `bytes` and flush
    ///
    /// `WouldBlock` is retried until the write timeout elapses; any failure
    /// leaves the handle reporting not alive.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let result = self.write_all_within_timeout(bytes);
        if result.is_err() {
            self.hung_up = true;
        }
        result
    }

    fn write_all_within_timeout(&mut self, mut bytes: &[u8]) -> Result<()> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| NetmuxError::Network(format!("client {} is closed", self.id)))?;

        let deadline = Instant::now() + self.write_timeout;
        while !bytes.is_empty() {
            match transport.write(bytes) {
                Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero).into()),
                Ok(n) => bytes = &bytes[n..],
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(std::io::Error::from(ErrorKind::TimedOut).into());
                    }
                    std::thread::sleep(WRITE_BACKOFF);
                }
                Err(e) => return Err(e.into()),
            }
        }

        loop {
            match transport.flush() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock && Instant::now() < deadline => {
                    std::thread::sleep(WRITE_BACKOFF);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// One non-blocking read into `buf`
    ///
    /// EOF and I/O errors both report `Closed` and leave the handle not alive;
    /// they are never surfaced as errors.
    pub fn try_read(&mut self, buf: &mut [u8]) -> ReadOutcome {
        let Some(transport) = self.transport.as_mut() else {
            return ReadOutcome::Closed;
        };
        if buf.is_empty() {
            return ReadOutcome::Empty;
        }

        loop {
            match transport.read(buf) {
                Ok(0) => {
                    tracing::debug!("client {} ({}) closed the stream", self.id, self.peer_addr);
                    self.hung_up = true;
                    return ReadOutcome::Closed;
                }
                Ok(n) => return ReadOutcome::Data(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return ReadOutcome::Empty,
                Err(e) => {
                    tracing::debug!("read from client {} failed: {}", self.id, e);
                    self.hung_up = true;
                    return ReadOutcome::Closed;
                }
            }
        }
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    /// Release the transport; the handle is `Purged` afterwards
    pub fn close(&mut self) {
        self.transport = None;
        self.state = ConnectionState::Purged;
    }

    /// Borrow the underlying transport, if still open
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}
