//! Error types for netmux
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using NetmuxError
pub type Result<T> = std::result::Result<T, NetmuxError>;

/// Unified error type for netmux operations
#[derive(Debug, Error)]
pub enum NetmuxError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Listener Errors
    // -------------------------------------------------------------------------
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not resolve endpoint: {0}")]
    Resolve(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    // -------------------------------------------------------------------------
    // Message Errors
    // -------------------------------------------------------------------------
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
