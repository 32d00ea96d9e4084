//! Registry Tests
//!
//! Tests verify:
//! - Id assignment
//! - Dead detection on touch
//! - Deferred removal through purge
//! - Delivery marking failed connections dead

use std::time::{Duration, Instant};

use netmux::registry::{ClientId, Connection, ConnectionRegistry, ConnectionState};
use netmux::transport::{memory_pair, MemoryPeer, MemoryTransport};

fn registry() -> ConnectionRegistry<MemoryTransport> {
    ConnectionRegistry::starting_at(1, Duration::from_millis(100))
}

fn add(registry: &mut ConnectionRegistry<MemoryTransport>, label: &str) -> (ClientId, MemoryPeer) {
    let (transport, peer) = memory_pair(label);
    (registry.register(transport), peer)
}

// =============================================================================
// Registration Tests
// =============================================================================

#[test]
fn test_ids_are_assigned_in_order() {
    let mut registry = registry();
    let (a, _pa) = add(&mut registry, "a");
    let (b, _pb) = add(&mut registry, "b");
    let (c, _pc) = add(&mut registry, "c");

    assert_eq!((a, b, c), (ClientId(1), ClientId(2), ClientId(3)));
    assert_eq!(registry.ids(), vec![a, b, c]);
    assert_eq!(registry.next_id(), ClientId(4));
}

#[test]
fn test_clock_seeded_ids_are_recent() {
    let registry: ConnectionRegistry<MemoryTransport> =
        ConnectionRegistry::new(Duration::from_millis(100));
    // 2020-01-01 in milliseconds
    assert!(registry.next_id().0 > 1_577_836_800_000);
}

#[test]
fn test_new_connection_is_active() {
    let mut registry = registry();
    let (id, _peer) = add(&mut registry, "a");

    let conn = registry.get(id).unwrap();
    assert_eq!(conn.state(), ConnectionState::Active);
    assert_eq!(conn.peer_addr(), "a");
    assert!(conn.is_alive());
}

// =============================================================================
// Liveness Tests
// =============================================================================

#[test]
fn test_mark_if_dead_on_live_connection() {
    let mut registry = registry();
    let (id, _peer) = add(&mut registry, "a");

    assert!(!registry.mark_if_dead(id));
    assert_eq!(registry.dead_count(), 0);
}

#[test]
fn test_mark_if_dead_on_disconnected_connection() {
    let mut registry = registry();
    let (id, peer) = add(&mut registry, "a");
    peer.close();

    assert!(registry.mark_if_dead(id));
    assert!(registry.is_marked_dead(id));
    assert_eq!(registry.get(id).unwrap().state(), ConnectionState::Dead);
    // Still registered until purge
    assert!(registry.contains(id));
}

#[test]
fn test_connection_lifecycle_active_dead_purged() {
    let (transport, peer) = memory_pair("a");
    let mut conn = Connection::new(ClientId(7), transport, Duration::from_millis(100));
    assert_eq!(conn.state(), ConnectionState::Active);

    let mut registry = registry();
    let (id, reg_peer) = add(&mut registry, "b");
    reg_peer.close();
    registry.mark_dead(id);
    assert_eq!(registry.get(id).unwrap().state(), ConnectionState::Dead);

    conn.close();
    assert_eq!(conn.state(), ConnectionState::Purged);
    assert!(!conn.is_alive());
    assert!(peer.is_closed());
}

#[test]
fn test_mark_if_dead_on_absent_id() {
    let mut registry = registry();
    assert!(registry.mark_if_dead(ClientId(42)));
    assert_eq!(registry.dead_count(), 0);
}

#[test]
fn test_purge_removes_dead_and_releases_transport() {
    let mut registry = registry();
    let (a, pa) = add(&mut registry, "a");
    let (b, pb) = add(&mut registry, "b");

    pb.break_writes();
    assert!(!registry.deliver(b, b"x"));
    assert!(registry.is_marked_dead(b));
    assert!(!pb.is_closed());

    let purged = registry.purge();
    assert_eq!(purged, vec![b]);
    assert!(!registry.contains(b));
    assert!(registry.contains(a));
    assert_eq!(registry.dead_count(), 0);
    // Dropping the transport hangs up the pipe
    assert!(pb.is_closed());
    assert!(!pa.is_closed());
}

#[test]
fn test_purge_never_removes_live_connections() {
    let mut registry = registry();
    let peers: Vec<_> = (0..5).map(|i| add(&mut registry, &format!("c{}", i))).collect();
    peers[1].1.close();
    peers[3].1.close();

    for (id, _) in &peers {
        registry.mark_if_dead(*id);
    }
    let purged = registry.purge();

    assert_eq!(purged, vec![peers[1].0, peers[3].0]);
    assert_eq!(registry.ids(), vec![peers[0].0, peers[2].0, peers[4].0]);
    for id in registry.ids() {
        assert!(registry.get(id).unwrap().is_alive());
    }
}

#[test]
fn test_purge_with_empty_dead_set() {
    let mut registry = registry();
    let (_id, _peer) = add(&mut registry, "a");
    assert!(registry.purge().is_empty());
    assert_eq!(registry.len(), 1);
}

// =============================================================================
// Delivery Tests
// =============================================================================

#[test]
fn test_deliver_writes_to_live_connection() {
    let mut registry = registry();
    let (id, peer) = add(&mut registry, "a");

    assert!(registry.deliver(id, b"hi"));
    assert_eq!(peer.take_received(), b"hi");
}

#[test]
fn test_deliver_skips_dead_connection_without_io() {
    let mut registry = registry();
    let (id, peer) = add(&mut registry, "a");
    peer.close();

    assert!(!registry.deliver(id, b"hi"));
    assert_eq!(peer.write_count(), 0);
    assert!(registry.is_marked_dead(id));
}

#[test]
fn test_for_each_live_skips_and_marks_dead() {
    let mut registry = registry();
    let (a, pa) = add(&mut registry, "a");
    let (b, pb) = add(&mut registry, "b");
    let (c, pc) = add(&mut registry, "c");
    pb.close();

    let mut visited = Vec::new();
    let count = registry.for_each_live(|conn| {
        visited.push(conn.id());
        conn.send(b"tick")
    });
    visited.sort();

    assert_eq!(count, 2);
    assert_eq!(visited, vec![a, c]);
    assert!(registry.is_marked_dead(b));
    assert_eq!(pa.take_received(), b"tick");
    assert_eq!(pc.take_received(), b"tick");

    registry.purge();
    assert_eq!(registry.ids(), vec![a, c]);
}

#[test]
fn test_for_each_live_marks_failed_callback_dead() {
    let mut registry = registry();
    let (a, pa) = add(&mut registry, "a");
    let (b, _pb) = add(&mut registry, "b");
    pa.break_writes();

    let count = registry.for_each_live(|conn| conn.send(b"x"));

    assert_eq!(count, 1);
    assert!(registry.is_marked_dead(a));
    assert!(!registry.is_marked_dead(b));
}

#[test]
fn test_stalled_write_times_out_and_marks_dead() {
    let mut registry: ConnectionRegistry<MemoryTransport> =
        ConnectionRegistry::starting_at(1, Duration::from_millis(20));
    let (a, pa) = add(&mut registry, "a");
    pa.stall_writes();

    let started = Instant::now();
    assert!(!registry.deliver(a, b"stuck"));

    assert!(started.elapsed() >= Duration::from_millis(20));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(registry.is_marked_dead(a));
    assert!(!registry.get(a).unwrap().is_alive());
    assert!(pa.take_received().is_empty());
}
