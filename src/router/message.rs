//! Message definitions
//!
//! One queued send request and its delivery policy.

use std::collections::BTreeSet;

use bytes::Bytes;

use crate::error::{NetmuxError, Result};
use crate::registry::ClientId;

/// Delivery policy of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Drop the message
    Nothing,

    /// Stage the payload in the shared buffer for the next broadcast
    SendToAll,

    /// Write to every live connection not in the set
    SendToAllExcept(BTreeSet<ClientId>),

    /// Write to each listed connection, stopping at the first one missing
    SendToSpecificClients(BTreeSet<ClientId>),

    /// Write back to the sender only
    EchoToSender,
}

impl Route {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Route::Nothing => "nothing",
            Route::SendToAll => "send-to-all",
            Route::SendToAllExcept(_) => "send-to-all-except",
            Route::SendToSpecificClients(_) => "send-to-specific-clients",
            Route::EchoToSender => "echo-to-sender",
        }
    }
}

/// A routing request: payload, originating id, policy
#[derive(Debug, Clone)]
pub struct Message {
    payload: Bytes,
    sender: ClientId,
    route: Route,
}

impl Message {
    /// Create a message, rejecting a targeted route with no targets
    pub fn new(sender: ClientId, route: Route, payload: impl Into<Bytes>) -> Result<Self> {
        if let Route::SendToSpecificClients(targets) = &route {
            if targets.is_empty() {
                return Err(NetmuxError::InvalidMessage(
                    "send-to-specific-clients needs at least one target".into(),
                ));
            }
        }
        Ok(Self {
            payload: payload.into(),
            sender,
            route,
        })
    }

    pub fn nothing(sender: ClientId) -> Self {
        Self {
            payload: Bytes::new(),
            sender,
            route: Route::Nothing,
        }
    }

    pub fn broadcast(sender: ClientId, payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            sender,
            route: Route::SendToAll,
        }
    }

    pub fn broadcast_except<I>(sender: ClientId, excluded: I, payload: impl Into<Bytes>) -> Self
    where
        I: IntoIterator<Item = ClientId>,
    {
        Self {
            payload: payload.into(),
            sender,
            route: Route::SendToAllExcept(excluded.into_iter().collect()),
        }
    }

    /// Targeted message; errors if `targets` is empty
    pub fn to_clients<I>(sender: ClientId, targets: I, payload: impl Into<Bytes>) -> Result<Self>
    where
        I: IntoIterator<Item = ClientId>,
    {
        Self::new(
            sender,
            Route::SendToSpecificClients(targets.into_iter().collect()),
            payload,
        )
    }

    pub fn echo(sender: ClientId, payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            sender,
            route: Route::EchoToSender,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn sender(&self) -> ClientId {
        self.sender
    }

    pub fn route(&self) -> &Route {
        &self.route
    }
}
