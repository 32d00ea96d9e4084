//! Network Buffer
//!
//! Growable byte container that keeps the filled length separate from the
//! allocated length.
//!
//! ## Layout
//! ```text
//! ┌───────────────────────────┬─────────────────────┐
//! │   filled (valid bytes)    │   spare (inert)     │
//! └───────────────────────────┴─────────────────────┘
//! 0                        filled              capacity
//! ```
//!
//! Only `[0, filled)` is meaningful. `clear` resets `filled` but keeps the
//! storage, so a buffer reused across ticks stops allocating once it has
//! grown to the largest burst it has seen.

use std::borrow::Cow;

use bytes::Bytes;

use crate::error::Result;
use crate::registry::{Connection, ReadOutcome};
use crate::transport::Transport;

/// Growable byte buffer with a fill/capacity split
#[derive(Debug, Clone, Default)]
pub struct NetworkBuffer {
    /// Allocated storage; its length is the capacity
    data: Vec<u8>,

    /// Length of the valid prefix
    filled: usize,
}

impl NetworkBuffer {
    /// Create an empty buffer with no storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with `capacity` bytes of storage
    ///
    /// Scratch buffers are created this way: reads fill up to the capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            filled: 0,
        }
    }

    /// Create a buffer whose storage is entirely filled with `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            filled: bytes.len(),
        }
    }

    /// UTF-8 encode `text` into a new buffer
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    // =========================================================================
    // Lengths
    // =========================================================================

    /// Number of valid bytes
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Allocated size
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Append `bytes` after the filled prefix, growing storage if needed
    ///
    /// Storage grows by exactly the missing amount and never shrinks.
    pub fn append(&mut self, bytes: &[u8]) {
        let needed = self.filled + bytes.len();
        if needed > self.data.len() {
            self.data.resize(needed, 0);
        }
        self.data[self.filled..needed].copy_from_slice(bytes);
        self.filled = needed;
    }

    /// Append the filled prefix of another buffer
    pub fn append_buffer(&mut self, other: &NetworkBuffer) {
        self.append(other.as_slice());
    }

    /// Logically truncate to zero; storage is kept
    pub fn clear(&mut self) {
        self.filled = 0;
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// The valid bytes `[0, filled)`
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// Decode the valid bytes as UTF-8, replacing invalid sequences
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_slice())
    }

    /// Copy the valid bytes into an immutable shared payload
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_slice())
    }

    // =========================================================================
    // I/O
    // =========================================================================

    /// Write the valid bytes to `connection` and flush
    ///
    /// Failures are returned to the caller; the caller decides whether the
    /// connection is dead.
    pub fn write_to<T: Transport>(&self, connection: &mut Connection<T>) -> Result<()> {
        connection.send(self.as_slice())
    }

    /// Replace the contents with a single non-blocking read from `connection`
    ///
    /// Reads at most `capacity` bytes. On anything other than data the
    /// buffer is left empty.
    pub fn fill_from<T: Transport>(&mut self, connection: &mut Connection<T>) -> ReadOutcome {
        self.filled = 0;
        let outcome = connection.try_read(&mut self.data);
        if let ReadOutcome::Data(n) = outcome {
            self.filled = n;
        }
        outcome
    }

    /// Drain everything `connection` has available right now into `self`
    ///
    /// Each read lands in `scratch` first; `on_chunk` sees the scratch buffer
    /// (filled with just that read) before the bytes are appended here.
    /// Stops when no more data is immediately available or the peer closed.
    /// Returns the number of bytes appended.
    pub fn read_from<T, F>(
        &mut self,
        connection: &mut Connection<T>,
        scratch: &mut NetworkBuffer,
        mut on_chunk: F,
    ) -> usize
    where
        T: Transport,
        F: FnMut(&NetworkBuffer),
    {
        if scratch.capacity() == 0 {
            scratch.data.resize(DEFAULT_SCRATCH_SIZE, 0);
        }

        let mut total = 0;
        while let ReadOutcome::Data(n) = scratch.fill_from(connection) {
            tracing::trace!("read {}b from client {}", n, connection.id());
            on_chunk(&*scratch);
            self.append(scratch.as_slice());
            total += n;
        }
        scratch.clear();
        total
    }
}

/// Scratch size used when a zero-capacity scratch buffer is handed to `read_from`
const DEFAULT_SCRATCH_SIZE: usize = 1024;

impl From<Vec<u8>> for NetworkBuffer {
    fn from(data: Vec<u8>) -> Self {
        let filled = data.len();
        Self { data, filled }
    }
}

impl From<&str> for NetworkBuffer {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl PartialEq for NetworkBuffer {
    /// Buffers compare by their valid bytes only
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for NetworkBuffer {}
