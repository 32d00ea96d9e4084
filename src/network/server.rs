//! TCP Server
//!
//! Accepts connections and services all of them from one thread.
//!
//! ## Tick
//! While no new connection is waiting:
//! 1. `update` hook (returning false stops the server)
//! 2. read every live connection into the shared buffer, then purge
//! 3. route every queued message in FIFO order, then purge
//! 4. broadcast the shared buffer to every live connection, purge, clear
//!
//! A waiting connection is offered to the `on_connect` hook and registered
//! if approved.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crate::buffer::NetworkBuffer;
use crate::config::Config;
use crate::error::{NetmuxError, Result};
use crate::registry::{ClientId, ConnectionRegistry};
use crate::router::{route, Message};
use super::endpoint::resolve_endpoint;

/// Server lifecycle
///
/// ```text
/// Starting ──bind ok──► Listening ──work──► Running ──► Stopped
///    │                                         │
///    └──bind fails──► Failed ◄──loop error─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Listening,
    Running,
    Stopped,
    Failed,
}

/// What one accept poll produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    /// No connection was waiting
    Idle,

    /// A connection was approved and registered under this id
    Registered(ClientId),

    /// A connection arrived but was closed without registering
    Rejected,
}

/// FIFO of messages waiting for the next flush
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: VecDeque<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Remove all messages in queue order
    pub fn drain(&mut self) -> impl Iterator<Item = Message> + '_ {
        self.messages.drain(..)
    }
}

/// Callbacks the server loop drives
pub trait ServerHooks {
    /// Decide on a freshly accepted stream before it is registered
    ///
    /// The stream is still blocking here. An error ends the server loop.
    fn on_connect(&mut self, _stream: &mut TcpStream) -> Result<bool> {
        Ok(true)
    }

    /// Called once per chunk read from `id`, and once more with an empty
    /// buffer after the last chunk of a burst
    ///
    /// The chunk is only valid for the duration of the call.
    fn on_received(&mut self, _id: ClientId, _chunk: &NetworkBuffer, _queue: &mut MessageQueue) {}

    /// Called once per idle iteration; returning false stops the server
    fn update(&mut self, registry: &ConnectionRegistry, queue: &mut MessageQueue) -> bool;
}

/// Single-threaded TCP multiplexer
pub struct Server {
    config: Config,

    /// Non-blocking listener; `None` before bind and after the loop exits
    listener: Option<TcpListener>,

    local_addr: Option<SocketAddr>,

    registry: ConnectionRegistry,

    /// Inbound bytes from every connection plus staged `SendToAll` payloads
    shared: NetworkBuffer,

    /// Per-connection read window, reused across connections
    scratch: NetworkBuffer,

    queue: MessageQueue,

    state: ServerState,
}

impl Server {
    /// Create a server in the `Starting` state
    pub fn new(config: Config) -> Self {
        let write_timeout = Duration::from_millis(config.write_timeout_ms);
        let scratch = NetworkBuffer::with_capacity(config.read_chunk_size);
        Self {
            config,
            listener: None,
            local_addr: None,
            registry: ConnectionRegistry::new(write_timeout),
            shared: NetworkBuffer::new(),
            scratch,
            queue: MessageQueue::new(),
            state: ServerState::Starting,
        }
    }

    /// Build a fresh server and run it until it stops
    pub fn serve<H: ServerHooks + ?Sized>(config: Config, hooks: &mut H) -> bool {
        Server::new(config).work(hooks)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bind the listener and move to `Listening`
    ///
    /// Fails if the endpoint does not resolve or a listener already holds
    /// the port; the server is then `Failed`.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let result = self.try_bind();
        match &result {
            Ok(addr) => {
                tracing::info!("listening at {}", addr);
                self.state = ServerState::Listening;
            }
            Err(_) => self.state = ServerState::Failed,
        }
        result
    }

    fn try_bind(&mut self) -> Result<SocketAddr> {
        if self.state != ServerState::Starting {
            return Err(NetmuxError::Network(format!(
                "cannot bind a server in state {:?}",
                self.state
            )));
        }
        self.config.validate()?;

        let addr = resolve_endpoint(&self.config.listen_addr, self.config.port)?;
        let listener = TcpListener::bind(addr).map_err(|source| NetmuxError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        self.listener = Some(listener);
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Run the loop until the update hook declines or an error occurs
    ///
    /// Binds first if needed. Returns true on a clean stop and false on a
    /// bind failure or loop error; neither is propagated. The listener is
    /// released on every exit path.
    pub fn work<H: ServerHooks + ?Sized>(&mut self, hooks: &mut H) -> bool {
        if self.state == ServerState::Starting {
            if let Err(e) = self.bind() {
                tracing::warn!("server could not start: {}", e);
                return false;
            }
        }
        if self.state != ServerState::Listening {
            tracing::warn!("server cannot run from state {:?}", self.state);
            return false;
        }

        self.state = ServerState::Running;
        let result = self.run_loop(hooks);
        self.listener = None;

        match result {
            Ok(()) => {
                tracing::info!("server stopped");
                self.state = ServerState::Stopped;
                true
            }
            Err(e) => {
                tracing::error!("server error: {}", e);
                self.state = ServerState::Failed;
                false
            }
        }
    }

    fn run_loop<H: ServerHooks + ?Sized>(&mut self, hooks: &mut H) -> Result<()> {
        loop {
            match self.accept_pending(hooks)? {
                Accepted::Idle => {
                    if !hooks.update(&self.registry, &mut self.queue) {
                        tracing::info!("update hook requested shutdown");
                        return Ok(());
                    }
                    self.tick(hooks);
                }
                Accepted::Registered(_) | Accepted::Rejected => {}
            }
        }
    }

    // =========================================================================
    // Accept
    // =========================================================================

    /// Poll the listener once and admit whatever is waiting
    pub fn accept_pending<H: ServerHooks + ?Sized>(&mut self, hooks: &mut H) -> Result<Accepted> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| NetmuxError::Network("server is not listening".into()))?;

        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                return Ok(Accepted::Idle);
            }
            Err(e) if matches!(e.kind(), ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset) => {
                tracing::debug!("connection dropped before accept: {}", e);
                return Ok(Accepted::Rejected);
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!("connected to {}", peer);
        self.admit(stream, peer, hooks)
    }

    fn admit<H: ServerHooks + ?Sized>(
        &mut self,
        mut stream: TcpStream,
        peer: SocketAddr,
        hooks: &mut H,
    ) -> Result<Accepted> {
        if self.registry.len() >= self.config.max_connections {
            tracing::warn!(
                "rejecting {}: {} connections already registered",
                peer,
                self.registry.len()
            );
            return Ok(Accepted::Rejected);
        }

        if self.config.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!("could not set nodelay for {}: {}", peer, e);
            }
        }

        if !hooks.on_connect(&mut stream)? {
            tracing::info!("connect hook rejected {}", peer);
            return Ok(Accepted::Rejected);
        }

        if let Err(e) = stream.set_nonblocking(true) {
            tracing::warn!("dropping {}: could not make stream non-blocking: {}", peer, e);
            return Ok(Accepted::Rejected);
        }

        let id = self.registry.register(stream);
        tracing::info!("client {} registered from {}", id, peer);
        Ok(Accepted::Registered(id))
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// One read → flush → broadcast pass
    pub fn tick<H: ServerHooks + ?Sized>(&mut self, hooks: &mut H) {
        self.read_connections(hooks);
        self.flush_queue();
        self.broadcast();
    }

    /// Drain every live connection into the shared buffer, then purge
    ///
    /// Returns the number of bytes read.
    pub fn read_connections<H: ServerHooks + ?Sized>(&mut self, hooks: &mut H) -> usize {
        let Self {
            registry,
            shared,
            scratch,
            queue,
            ..
        } = self;

        let end_of_burst = NetworkBuffer::new();
        let mut total = 0;
        registry.for_each_live(|connection| {
            let id = connection.id();
            let read = shared.read_from(connection, scratch, |chunk| {
                hooks.on_received(id, chunk, queue);
            });
            if read > 0 {
                hooks.on_received(id, &end_of_burst, queue);
                total += read;
            }
            Ok(())
        });

        self.purge_dead();
        total
    }

    /// Route every queued message in FIFO order, then purge
    ///
    /// Returns the number of messages routed.
    pub fn flush_queue(&mut self) -> usize {
        let Self {
            registry,
            shared,
            queue,
            ..
        } = self;

        let mut routed = 0;
        for message in queue.drain() {
            let outcome = route(&message, registry, shared);
            tracing::trace!(
                "routed {} from client {}: {:?}",
                message.route().name(),
                message.sender(),
                outcome
            );
            routed += 1;
        }

        self.purge_dead();
        routed
    }

    /// Write the shared buffer to every live connection, purge, then clear it
    ///
    /// Returns the number of connections written to.
    pub fn broadcast(&mut self) -> usize {
        if self.shared.is_empty() {
            return 0;
        }
        tracing::debug!(
            "broadcasting {}b: {:?}",
            self.shared.len(),
            self.shared.to_text()
        );

        let Self {
            registry, shared, ..
        } = self;
        let recipients = registry.for_each_live(|connection| shared.write_to(connection));

        self.purge_dead();
        self.shared.clear();
        recipients
    }

    fn purge_dead(&mut self) {
        let purged = self.registry.purge();
        if !purged.is_empty() {
            tracing::info!("removed disconnected clients {:?}", purged);
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Bound address, once listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn shared_buffer(&self) -> &NetworkBuffer {
        &self.shared
    }

    /// Queue a message for the next flush
    pub fn enqueue(&mut self, message: Message) {
        self.queue.push(message);
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    /// Whether the listener is currently held
    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }
}
