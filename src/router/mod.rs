//! Router Module
//!
//! Per-message delivery policies.
//!
//! ## Policies
//! - `SendToAll`: staged in the shared buffer, coalesced into the next broadcast
//! - `SendToAllExcept`: written now to every live connection not excluded
//! - `SendToSpecificClients`: written now to each target; the first missing
//!   target sends `ERROR: client <id> failed` to the sender and ends the message
//! - `EchoToSender`: written now to the sender
//! - `Nothing`: dropped

mod message;
mod dispatch;

pub use message::{Message, Route};
pub use dispatch::{route, target_failed_payload, RouteOutcome};
