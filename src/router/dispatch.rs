//! Message dispatch
//!
//! Routes one message against the registry and the shared broadcast buffer.
//! The router keeps no state of its own.

use crate::buffer::NetworkBuffer;
use crate::registry::{ClientId, ConnectionRegistry};
use crate::transport::Transport;
use super::{Message, Route};

/// What happened to a routed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// `Nothing` route
    Ignored,

    /// Payload staged in the shared buffer for the next broadcast
    Deferred { bytes: usize },

    /// Payload written directly to this many connections
    Delivered { count: usize },

    /// Echo requested by a sender that is absent or dead
    SenderMissing,

    /// A target was absent or dead; remaining targets were skipped
    TargetFailed {
        target: ClientId,
        delivered: usize,
        notified_sender: bool,
    },
}

/// Text written back to the sender when a target cannot be reached
pub fn target_failed_payload(target: ClientId) -> String {
    format!("ERROR: client {} failed", target)
}

/// Dispatch `message` by its route
///
/// Direct writes that fail put the connection in the dead-set and do not
/// stop delivery to the others. Nothing is purged here.
pub fn route<T: Transport>(
    message: &Message,
    registry: &mut ConnectionRegistry<T>,
    shared: &mut NetworkBuffer,
) -> RouteOutcome {
    let sender = message.sender();
    let payload = message.payload();

    match message.route() {
        Route::Nothing => RouteOutcome::Ignored,

        Route::SendToAll => {
            shared.append(payload);
            RouteOutcome::Deferred {
                bytes: payload.len(),
            }
        }

        Route::EchoToSender => {
            if registry.mark_if_dead(sender) {
                tracing::warn!("echo requested by client {} which is not connected", sender);
                return RouteOutcome::SenderMissing;
            }
            let count = usize::from(registry.deliver(sender, payload));
            RouteOutcome::Delivered { count }
        }

        Route::SendToSpecificClients(targets) => {
            let mut delivered = 0;
            for &target in targets {
                if registry.mark_if_dead(target) {
                    let notified_sender = notify_target_failed(registry, sender, target);
                    return RouteOutcome::TargetFailed {
                        target,
                        delivered,
                        notified_sender,
                    };
                }
                if registry.deliver(target, payload) {
                    delivered += 1;
                }
            }
            RouteOutcome::Delivered { count: delivered }
        }

        Route::SendToAllExcept(excluded) => {
            let mut count = 0;
            registry.for_each_live(|connection| {
                if excluded.contains(&connection.id()) {
                    return Ok(());
                }
                connection.send(payload)?;
                count += 1;
                Ok(())
            });
            RouteOutcome::Delivered { count }
        }
    }
}

fn notify_target_failed<T: Transport>(
    registry: &mut ConnectionRegistry<T>,
    sender: ClientId,
    target: ClientId,
) -> bool {
    if registry.mark_if_dead(sender) {
        tracing::warn!(
            "client {} targeted missing client {} but is not connected itself",
            sender,
            target
        );
        return false;
    }
    tracing::debug!("client {} targeted missing client {}", sender, target);
    registry.deliver(sender, target_failed_payload(target).as_bytes())
}
