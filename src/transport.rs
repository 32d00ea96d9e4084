//! Transport
//!
//! The byte-stream seam under a connection handle.
//!
//! A transport is a non-blocking `Read + Write`: a read with nothing
//! available returns `WouldBlock`, a read of zero bytes means the peer
//! closed. On top of that it reports whether it still considers itself
//! connected, which is what liveness checks consult.
//!
//! Two implementations ship with the crate:
//! - `std::net::TcpStream` (set non-blocking by whoever accepted/connected it)
//! - [`MemoryTransport`], an in-process pipe driven by a [`MemoryPeer`]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use parking_lot::Mutex;

/// A non-blocking byte stream with a liveness probe
pub trait Transport: Read + Write {
    /// Whether the transport still reports a connected peer
    fn is_connected(&self) -> bool;

    /// Peer description for logging
    fn peer_label(&self) -> String {
        "unknown".to_string()
    }
}

impl Transport for TcpStream {
    fn is_connected(&self) -> bool {
        // A pending socket error (reset, refused) means the stream is gone
        matches!(self.take_error(), Ok(None)) && self.peer_addr().is_ok()
    }

    fn peer_label(&self) -> String {
        self.peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

// =============================================================================
// In-memory transport
// =============================================================================

#[derive(Debug, Default)]
struct PipeState {
    /// Bytes the peer sent, waiting to be read by the transport
    inbound: VecDeque<u8>,

    /// Bytes the transport wrote, waiting to be collected by the peer
    outbound: Vec<u8>,

    /// Either side hung up
    closed: bool,

    /// Writes fail while the pipe still reports connected
    broken_writes: bool,

    /// Writes report `WouldBlock`, like a full socket send buffer
    stalled_writes: bool,

    /// Number of successful write calls
    writes: usize,
}

/// Transport half of an in-memory pipe
#[derive(Debug)]
pub struct MemoryTransport {
    state: Arc<Mutex<PipeState>>,
    label: String,
}

/// Test/embedding half of an in-memory pipe
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    state: Arc<Mutex<PipeState>>,
}

/// Create a connected in-memory transport and the peer that drives it
pub fn memory_pair(label: impl Into<String>) -> (MemoryTransport, MemoryPeer) {
    let state = Arc::new(Mutex::new(PipeState::default()));
    (
        MemoryTransport {
            state: Arc::clone(&state),
            label: label.into(),
        },
        MemoryPeer { state },
    )
}

impl Read for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.inbound.is_empty() {
            if state.closed {
                return Ok(0);
            }
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.closed || state.broken_writes {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        if state.stalled_writes {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        state.outbound.extend_from_slice(buf);
        state.writes += 1;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn is_connected(&self) -> bool {
        !self.state.lock().closed
    }

    fn peer_label(&self) -> String {
        self.label.clone()
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.state.lock().closed = true;
    }
}

impl MemoryPeer {
    /// Queue bytes for the transport to read
    pub fn send(&self, bytes: &[u8]) {
        self.state.lock().inbound.extend(bytes.iter().copied());
    }

    /// Take everything the transport has written so far
    pub fn take_received(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().outbound)
    }

    /// Number of successful writes the transport has performed
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    /// Hang up; the transport reports disconnected from now on
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Make writes fail while the transport still reports connected
    pub fn break_writes(&self) {
        self.state.lock().broken_writes = true;
    }

    /// Make writes report `WouldBlock` until the write timeout gives up
    pub fn stall_writes(&self) {
        self.state.lock().stalled_writes = true;
    }

    /// Whether the transport side was dropped or the peer hung up
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
