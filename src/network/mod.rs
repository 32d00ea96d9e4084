//! Network Module
//!
//! TCP server and client loops.
//!
//! ## Architecture
//! - One thread, no per-connection threads
//! - Non-blocking accept probe and non-blocking reads
//! - Removals deferred through the registry's dead-set

mod endpoint;
mod server;
mod client;

pub use endpoint::resolve_endpoint;
pub use server::{Accepted, MessageQueue, Server, ServerHooks, ServerState};
pub use client::{Client, ClientHooks, ClientStats};
