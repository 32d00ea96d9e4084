//! Console input
//!
//! Line-oriented stdin producer for the binaries, plus the small command
//! language the server binary accepts.
//!
//! ## Server commands
//! - `/quit`                 stop the server
//! - `/list`                 print registered client ids
//! - `/all <text>`           broadcast to everyone
//! - `/except <ids> <text>`  write to everyone except `ids` (comma separated)
//! - `/to <ids> <text>`      write to each of `ids`
//!
//! Anything not starting with `/` is broadcast as-is.

use std::io::BufRead;
use std::net::TcpStream;
use std::thread;

use crossbeam::channel::{self, Receiver, TryRecvError};

use crate::buffer::NetworkBuffer;
use crate::error::{NetmuxError, Result};
use crate::network::ClientHooks;
use crate::registry::ClientId;
use crate::router::Message;

/// Stdin lines read on a background thread
pub struct ConsoleInput {
    lines: Receiver<String>,
}

impl ConsoleInput {
    /// Start reading stdin
    pub fn spawn() -> Self {
        let (tx, rx) = channel::unbounded();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self { lines: rx }
    }

    /// Wrap an existing line source
    pub fn from_receiver(lines: Receiver<String>) -> Self {
        Self { lines }
    }

    /// Next complete line, if one has arrived
    pub fn poll(&self) -> ConsolePoll {
        match self.lines.try_recv() {
            Ok(line) => ConsolePoll::Line(line),
            Err(TryRecvError::Empty) => ConsolePoll::Idle,
            Err(TryRecvError::Disconnected) => ConsolePoll::Closed,
        }
    }
}

/// Result of polling the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsolePoll {
    Line(String),

    /// Nothing typed yet
    Idle,

    /// Stdin hit EOF and every line has been taken
    Closed,
}

/// Client hooks that send stdin lines and print what comes back
///
/// Received chunks are accumulated and printed when the burst ends.
pub struct ConsoleClient {
    console: ConsoleInput,
    received: String,
    running: bool,
}

impl ConsoleClient {
    pub fn new(console: ConsoleInput) -> Self {
        Self {
            console,
            received: String::new(),
            running: true,
        }
    }
}

impl ClientHooks for ConsoleClient {
    fn on_connect(&mut self, stream: &TcpStream) {
        if let Ok(addr) = stream.local_addr() {
            println!("client {}", addr);
        }
    }

    fn on_received(&mut self, chunk: &NetworkBuffer) {
        if chunk.is_empty() {
            println!("RECEIVED: {}", self.received);
            self.received.clear();
            return;
        }
        self.received.push_str(&chunk.to_text());
    }

    fn data_to_write(&mut self) -> Option<NetworkBuffer> {
        match self.console.poll() {
            ConsolePoll::Line(line) if !line.is_empty() => Some(NetworkBuffer::from_text(&line)),
            ConsolePoll::Closed => {
                self.running = false;
                None
            }
            _ => None,
        }
    }

    fn keep_running(&mut self) -> bool {
        self.running
    }
}

/// A parsed server console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    Quit,
    List,
    All(String),
    Except(Vec<ClientId>, String),
    To(Vec<ClientId>, String),
}

impl ServerCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(ServerCommand::All(line.to_string()));
        };

        let (verb, args) = split_word(rest);
        match verb {
            "quit" | "exit" => Ok(ServerCommand::Quit),
            "list" => Ok(ServerCommand::List),
            "all" => Ok(ServerCommand::All(args.to_string())),
            "except" => {
                let (ids, text) = split_word(args);
                Ok(ServerCommand::Except(parse_ids(ids)?, text.to_string()))
            }
            "to" => {
                let (ids, text) = split_word(args);
                let ids = parse_ids(ids)?;
                if ids.is_empty() {
                    return Err(NetmuxError::InvalidMessage("/to needs at least one id".into()));
                }
                Ok(ServerCommand::To(ids, text.to_string()))
            }
            other => Err(NetmuxError::InvalidMessage(format!("unknown command /{}", other))),
        }
    }

    /// Message this command enqueues, if any
    pub fn to_message(&self, sender: ClientId) -> Result<Option<Message>> {
        let message = match self {
            ServerCommand::Quit | ServerCommand::List => return Ok(None),
            ServerCommand::All(text) => Message::broadcast(sender, text.clone()),
            ServerCommand::Except(ids, text) => {
                Message::broadcast_except(sender, ids.iter().copied(), text.clone())
            }
            ServerCommand::To(ids, text) => {
                Message::to_clients(sender, ids.iter().copied(), text.clone())?
            }
        };
        Ok(Some(message))
    }
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (text, ""),
    }
}

fn parse_ids(list: &str) -> Result<Vec<ClientId>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map(ClientId)
                .map_err(|_| NetmuxError::InvalidMessage(format!("bad client id {:?}", s)))
        })
        .collect()
}
