//! Router Tests
//!
//! Tests verify each delivery policy against an in-memory registry:
//! - SendToAll coalescing into the shared buffer
//! - SendToAllExcept exclusion
//! - SendToSpecificClients fail-fast error reply
//! - EchoToSender
//! - Failed writes marking connections dead without aborting delivery

use std::time::Duration;

use netmux::buffer::NetworkBuffer;
use netmux::registry::{ClientId, ConnectionRegistry};
use netmux::router::{route, target_failed_payload, Message, Route, RouteOutcome};
use netmux::transport::{memory_pair, MemoryPeer, MemoryTransport};
use netmux::NetmuxError;

/// Registry with clients 1..=count
fn setup(count: usize) -> (ConnectionRegistry<MemoryTransport>, Vec<MemoryPeer>) {
    let mut registry = ConnectionRegistry::starting_at(1, Duration::from_millis(100));
    let mut peers = Vec::new();
    for i in 1..=count {
        let (transport, peer) = memory_pair(format!("client-{}", i));
        registry.register(transport);
        peers.push(peer);
    }
    (registry, peers)
}

fn ids(list: &[u64]) -> Vec<ClientId> {
    list.iter().copied().map(ClientId).collect()
}

// =============================================================================
// SendToAllExcept Tests
// =============================================================================

#[test]
fn test_send_to_all_except_skips_excluded() {
    let (mut registry, peers) = setup(3);
    let mut shared = NetworkBuffer::new();
    let message = Message::broadcast_except(ClientId(1), ids(&[2]), "payload");

    let outcome = route(&message, &mut registry, &mut shared);

    assert_eq!(outcome, RouteOutcome::Delivered { count: 2 });
    assert_eq!(peers[0].take_received(), b"payload");
    assert_eq!(peers[0].write_count(), 1);
    assert!(peers[1].take_received().is_empty());
    assert_eq!(peers[1].write_count(), 0);
    assert_eq!(peers[2].take_received(), b"payload");
    assert_eq!(peers[2].write_count(), 1);
    assert!(shared.is_empty());
}

#[test]
fn test_send_to_all_except_ignores_absent_exclusions() {
    let (mut registry, peers) = setup(2);
    let mut shared = NetworkBuffer::new();
    let message = Message::broadcast_except(ClientId(1), ids(&[77]), "x");

    let outcome = route(&message, &mut registry, &mut shared);

    assert_eq!(outcome, RouteOutcome::Delivered { count: 2 });
    assert_eq!(peers[0].take_received(), b"x");
    assert_eq!(peers[1].take_received(), b"x");
}

#[test]
fn test_send_to_all_except_continues_after_failed_write() {
    let (mut registry, peers) = setup(3);
    peers[1].break_writes();
    let mut shared = NetworkBuffer::new();
    let message = Message::broadcast_except(ClientId(1), Vec::new(), "x");

    let outcome = route(&message, &mut registry, &mut shared);

    assert_eq!(outcome, RouteOutcome::Delivered { count: 2 });
    assert!(registry.is_marked_dead(ClientId(2)));
    assert_eq!(peers[0].take_received(), b"x");
    assert_eq!(peers[2].take_received(), b"x");
}

#[test]
fn test_send_to_all_except_skips_disconnected() {
    let (mut registry, peers) = setup(3);
    peers[2].close();
    let mut shared = NetworkBuffer::new();
    let message = Message::broadcast_except(ClientId(1), ids(&[1]), "x");

    let outcome = route(&message, &mut registry, &mut shared);

    assert_eq!(outcome, RouteOutcome::Delivered { count: 1 });
    assert!(registry.is_marked_dead(ClientId(3)));
    assert_eq!(peers[2].write_count(), 0);
}

// =============================================================================
// SendToSpecificClients Tests
// =============================================================================

#[test]
fn test_specific_clients_missing_target_replies_error_to_sender() {
    let (mut registry, peers) = setup(3);
    let mut shared = NetworkBuffer::new();
    let message = Message::to_clients(ClientId(1), ids(&[99]), "secret").unwrap();

    let outcome = route(&message, &mut registry, &mut shared);

    assert_eq!(
        outcome,
        RouteOutcome::TargetFailed {
            target: ClientId(99),
            delivered: 0,
            notified_sender: true,
        }
    );
    assert_eq!(peers[0].take_received(), b"ERROR: client 99 failed");
    assert_eq!(peers[1].write_count(), 0);
    assert_eq!(peers[2].write_count(), 0);
}

#[test]
fn test_specific_clients_delivers_to_each_target() {
    let (mut registry, peers) = setup(3);
    let mut shared = NetworkBuffer::new();
    let message = Message::to_clients(ClientId(1), ids(&[2, 3]), "hey").unwrap();

    let outcome = route(&message, &mut registry, &mut shared);

    assert_eq!(outcome, RouteOutcome::Delivered { count: 2 });
    assert!(peers[0].take_received().is_empty());
    assert_eq!(peers[1].take_received(), b"hey");
    assert_eq!(peers[2].take_received(), b"hey");
}

#[test]
fn test_specific_clients_stops_at_first_missing_target() {
    let (mut registry, peers) = setup(3);
    let mut shared = NetworkBuffer::new();
    // Ascending order: 2 is delivered, 50 fails, 3... is never reached
    let message = Message::to_clients(ClientId(1), ids(&[2, 50, 51]), "m").unwrap();

    let outcome = route(&message, &mut registry, &mut shared);

    assert_eq!(
        outcome,
        RouteOutcome::TargetFailed {
            target: ClientId(50),
            delivered: 1,
            notified_sender: true,
        }
    );
    assert_eq!(peers[1].take_received(), b"m");
    assert_eq!(peers[0].take_received(), target_failed_payload(ClientId(50)).as_bytes());
}

#[test]
fn test_specific_clients_dead_target_counts_as_missing() {
    let (mut registry, peers) = setup(3);
    peers[2].close();
    let mut shared = NetworkBuffer::new();
    let message = Message::to_clients(ClientId(1), ids(&[3]), "m").unwrap();

    let outcome = route(&message, &mut registry, &mut shared);

    assert!(matches!(outcome, RouteOutcome::TargetFailed { target: ClientId(3), .. }));
    assert!(registry.is_marked_dead(ClientId(3)));
    assert_eq!(peers[0].take_received(), b"ERROR: client 3 failed");
}

#[test]
fn test_specific_clients_missing_target_and_missing_sender() {
    let (mut registry, peers) = setup(2);
    let mut shared = NetworkBuffer::new();
    let message = Message::to_clients(ClientId(40), ids(&[41]), "m").unwrap();

    let outcome = route(&message, &mut registry, &mut shared);

    assert_eq!(
        outcome,
        RouteOutcome::TargetFailed {
            target: ClientId(41),
            delivered: 0,
            notified_sender: false,
        }
    );
    assert_eq!(peers[0].write_count(), 0);
    assert_eq!(peers[1].write_count(), 0);
}

#[test]
fn test_specific_clients_requires_targets() {
    let result = Message::to_clients(ClientId(1), Vec::new(), "m");
    assert!(matches!(result, Err(NetmuxError::InvalidMessage(_))));

    let result = Message::new(ClientId(1), Route::SendToSpecificClients(Default::default()), "m");
    assert!(result.is_err());
}

// =============================================================================
// EchoToSender Tests
// =============================================================================

#[test]
fn test_echo_to_sender() {
    let (mut registry, peers) = setup(2);
    let mut shared = NetworkBuffer::new();
    let message = Message::echo(ClientId(2), "back at you");

    let outcome = route(&message, &mut registry, &mut shared);

    assert_eq!(outcome, RouteOutcome::Delivered { count: 1 });
    assert_eq!(peers[1].take_received(), b"back at you");
    assert_eq!(peers[0].write_count(), 0);
}

#[test]
fn test_echo_from_absent_sender() {
    let (mut registry, peers) = setup(1);
    let mut shared = NetworkBuffer::new();
    let message = Message::echo(ClientId(9), "lost");

    assert_eq!(route(&message, &mut registry, &mut shared), RouteOutcome::SenderMissing);
    assert_eq!(peers[0].write_count(), 0);
}

#[test]
fn test_echo_from_dead_sender() {
    let (mut registry, peers) = setup(1);
    peers[0].close();
    let mut shared = NetworkBuffer::new();
    let message = Message::echo(ClientId(1), "lost");

    assert_eq!(route(&message, &mut registry, &mut shared), RouteOutcome::SenderMissing);
    assert!(registry.is_marked_dead(ClientId(1)));
}

// =============================================================================
// SendToAll / Nothing Tests
// =============================================================================

#[test]
fn test_send_to_all_is_deferred_into_shared_buffer() {
    let (mut registry, peers) = setup(2);
    let mut shared = NetworkBuffer::new();

    let first = Message::broadcast(ClientId(1), "one;");
    let second = Message::broadcast(ClientId(2), "two;");
    let nothing = Message::nothing(ClientId(1));

    assert_eq!(
        route(&first, &mut registry, &mut shared),
        RouteOutcome::Deferred { bytes: 4 }
    );
    assert_eq!(
        route(&second, &mut registry, &mut shared),
        RouteOutcome::Deferred { bytes: 4 }
    );
    assert_eq!(route(&nothing, &mut registry, &mut shared), RouteOutcome::Ignored);

    assert_eq!(shared.to_text(), "one;two;");
    assert_eq!(peers[0].write_count(), 0);
    assert_eq!(peers[1].write_count(), 0);
}

#[test]
fn test_route_names() {
    assert_eq!(Route::Nothing.name(), "nothing");
    assert_eq!(Message::echo(ClientId(1), "x").route().name(), "echo-to-sender");
}
