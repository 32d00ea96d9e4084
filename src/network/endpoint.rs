//! Endpoint resolution

use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{NetmuxError, Result};

/// Resolve `host:port` to the first address the resolver returns
pub fn resolve_endpoint(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| NetmuxError::Resolve(format!("{}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| NetmuxError::Resolve(format!("{}:{}: no addresses", host, port)))
}
