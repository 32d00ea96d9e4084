//! # netmux
//!
//! A single-threaded TCP connection multiplexer for a small broadcast/echo
//! service:
//! - One listening socket, many clients, no thread per connection
//! - Inbound bytes from every client are broadcast back to all of them
//! - Queued messages routed per message (broadcast, broadcast-except,
//!   targeted, echo-to-sender)
//! - Dead connections detected on touch and purged after each step
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Server loop (one thread)                  │
//! │   accept probe → update hook → read → flush → broadcast     │
//! └──────┬───────────────────────┬──────────────────────┬───────┘
//!        │                       │                      │
//!        ▼                       ▼                      ▼
//! ┌─────────────┐        ┌───────────────┐      ┌──────────────┐
//! │  Registry   │◄───────│    Router     │─────►│ Shared buffer│
//! │ (dead-set)  │        │ (per message) │      │ (NetBuffer)  │
//! └──────┬──────┘        └───────────────┘      └──────────────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  Transport  │
//! │ (TcpStream) │
//! └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod buffer;
pub mod transport;
pub mod registry;
pub mod router;
pub mod network;
pub mod console;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{NetmuxError, Result};
pub use config::Config;
pub use buffer::NetworkBuffer;
pub use registry::{ClientId, ConnectionRegistry};
pub use router::{Message, Route};
pub use network::{Client, Server};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of netmux
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
