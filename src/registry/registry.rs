//! Connection Registry
//!
//! Id → handle mapping plus the per-tick dead-set.

use std::collections::{HashMap, HashSet};
use std::net::TcpStream;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::transport::Transport;
use super::{ClientId, Connection, ConnectionState};

/// Registered connections and the handles found dead this tick
///
/// Handles are never removed while the mapping is being walked. A handle
/// that fails its liveness check, or whose write fails, goes into the
/// dead-set; [`purge`](Self::purge) removes and closes them once the walk
/// is over. The dead-set is empty between ticks.
pub struct ConnectionRegistry<T: Transport = TcpStream> {
    connections: HashMap<ClientId, Connection<T>>,

    /// Ids observed dead during the current tick, not yet removed
    dead: HashSet<ClientId>,

    /// Next id to hand out
    next_id: u64,

    /// Write timeout given to every new handle
    write_timeout: Duration,
}

impl<T: Transport> ConnectionRegistry<T> {
    /// Create an empty registry whose ids are seeded from the wall clock
    ///
    /// Seeding with the current time in milliseconds keeps a restarted
    /// server from reusing ids its peers saw recently.
    pub fn new(write_timeout: Duration) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1);
        Self::starting_at(seed, write_timeout)
    }

    /// Create an empty registry whose first id is `first_id`
    pub fn starting_at(first_id: u64, write_timeout: Duration) -> Self {
        Self {
            connections: HashMap::new(),
            dead: HashSet::new(),
            next_id: first_id,
            write_timeout,
        }
    }

    // =========================================================================
    // Registration & Lookup
    // =========================================================================

    /// Register an approved transport as a new `Active` handle
    pub fn register(&mut self, transport: T) -> ClientId {
        let id = ClientId(self.next_id);
        self.next_id += 1;
        let connection = Connection::new(id, transport, self.write_timeout);
        tracing::debug!("registered client {} ({})", id, connection.peer_addr());
        self.connections.insert(id, connection);
        id
    }

    pub fn get(&self, id: ClientId) -> Option<&Connection<T>> {
        self.connections.get(&id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Number of registered handles, dead-but-unpurged included
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Registered ids in ascending order
    pub fn ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Id the next registration will receive
    pub fn next_id(&self) -> ClientId {
        ClientId(self.next_id)
    }

    // =========================================================================
    // Liveness
    // =========================================================================

    /// Check `id` before touching it; true means "do not perform I/O"
    ///
    /// Absent ids report true without entering the dead-set. A registered
    /// handle that is not alive is moved to the dead-set.
    pub fn mark_if_dead(&mut self, id: ClientId) -> bool {
        if self.dead.contains(&id) {
            return true;
        }
        match self.connections.get_mut(&id) {
            None => true,
            Some(connection) if !connection.is_alive() => {
                connection.set_state(ConnectionState::Dead);
                self.dead.insert(id);
                true
            }
            Some(_) => false,
        }
    }

    /// Put `id` in the dead-set regardless of what its transport reports
    pub fn mark_dead(&mut self, id: ClientId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.set_state(ConnectionState::Dead);
            self.dead.insert(id);
        }
    }

    pub fn is_marked_dead(&self, id: ClientId) -> bool {
        self.dead.contains(&id)
    }

    /// Size of the dead-set
    pub fn dead_count(&self) -> usize {
        self.dead.len()
    }

    /// Remove and close every handle in the dead-set, then empty it
    ///
    /// Returns the purged ids in ascending order.
    pub fn purge(&mut self) -> Vec<ClientId> {
        if self.dead.is_empty() {
            return Vec::new();
        }
        let mut purged: Vec<ClientId> = self.dead.drain().collect();
        purged.sort_unstable();
        for id in &purged {
            if let Some(mut connection) = self.connections.remove(id) {
                tracing::debug!("purging client {} ({})", id, connection.peer_addr());
                connection.close();
            }
        }
        purged
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Write `bytes` to one connection
    ///
    /// Returns false without I/O if the id is absent or dead. A failed write
    /// moves the handle to the dead-set and also returns false.
    pub fn deliver(&mut self, id: ClientId, bytes: &[u8]) -> bool {
        if self.mark_if_dead(id) {
            return false;
        }
        let Some(connection) = self.connections.get_mut(&id) else {
            return false;
        };
        match connection.send(bytes) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("write to client {} failed: {}", id, e);
                self.mark_dead(id);
                false
            }
        }
    }

    /// Run `f` on every live handle
    ///
    /// Handles failing the liveness check are skipped and go into the
    /// dead-set, as do handles for which `f` errors or that stop being alive
    /// during `f`. Nothing is removed; call [`purge`](Self::purge) afterwards.
    /// Returns how many handles `f` succeeded on.
    pub fn for_each_live<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&mut Connection<T>) -> Result<()>,
    {
        let mut succeeded = 0;
        for (id, connection) in self.connections.iter_mut() {
            if self.dead.contains(id) {
                continue;
            }
            if !connection.is_alive() {
                connection.set_state(ConnectionState::Dead);
                self.dead.insert(*id);
                continue;
            }
            match f(connection) {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    tracing::warn!("client {} failed: {}", id, e);
                    connection.set_state(ConnectionState::Dead);
                    self.dead.insert(*id);
                    continue;
                }
            }
            if !connection.is_alive() {
                connection.set_state(ConnectionState::Dead);
                self.dead.insert(*id);
            }
        }
        succeeded
    }
}
