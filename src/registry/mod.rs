//! Registry Module
//!
//! Connection handles and the registry that owns them.
//!
//! ## Liveness
//! Liveness is checked lazily, when a handle is about to be touched, rather
//! than through a heartbeat. A dead handle is detected by the first read or
//! write attempt after it died and is purged at the end of that step, so a
//! dead connection stays registered for at most one tick.

mod connection;
#[allow(clippy::module_inception)]
mod registry;

pub use connection::{ClientId, Connection, ConnectionState, ReadOutcome};
pub use registry::ConnectionRegistry;
