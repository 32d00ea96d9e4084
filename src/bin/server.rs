//! netmux Server Binary
//!
//! Runs the broadcast/echo server. If the port is already taken, falls back
//! to acting as a client of whoever holds it.

use std::net::TcpStream;
use std::io::Write;
use std::time::Duration;

use clap::Parser;
use netmux::config::DEFAULT_PORT;
use netmux::console::{ConsoleClient, ConsoleInput, ConsolePoll, ServerCommand};
use netmux::network::{Client, MessageQueue, Server, ServerHooks};
use netmux::{ClientId, Config, ConnectionRegistry, NetworkBuffer};
use tracing_subscriber::{fmt, EnvFilter};

/// netmux Server
#[derive(Parser, Debug)]
#[command(name = "netmux-server")]
#[command(about = "Single-threaded TCP broadcast/echo server")]
#[command(version)]
struct Args {
    /// Host to listen on
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum registered connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Sleep between idle ticks in milliseconds
    #[arg(long, default_value = "10")]
    idle_ms: u64,
}

/// Console-driven hooks: greeting on connect, commands from stdin
struct ConsoleServer {
    console: ConsoleInput,
    idle_sleep: Duration,
}

impl ServerHooks for ConsoleServer {
    fn on_connect(&mut self, stream: &mut TcpStream) -> netmux::Result<bool> {
        let greeting = format!("DateTime: {}", chrono::Local::now());
        stream.write_all(greeting.as_bytes())?;
        tracing::info!("sent greeting {:?}", greeting);
        Ok(true)
    }

    fn on_received(&mut self, id: ClientId, chunk: &NetworkBuffer, _queue: &mut MessageQueue) {
        if !chunk.is_empty() {
            tracing::debug!("client {}: {:?}", id, chunk.to_text());
        }
    }

    fn update(&mut self, registry: &ConnectionRegistry, queue: &mut MessageQueue) -> bool {
        match self.console.poll() {
            ConsolePoll::Line(line) if !line.trim().is_empty() => {
                match ServerCommand::parse(&line) {
                    Ok(ServerCommand::Quit) => return false,
                    Ok(ServerCommand::List) => {
                        println!("clients: {:?}", registry.ids());
                    }
                    Ok(command) => match command.to_message(ClientId::LOCAL) {
                        Ok(Some(message)) => queue.push(message),
                        Ok(None) => {}
                        Err(e) => eprintln!("{}", e),
                    },
                    Err(e) => eprintln!("{}", e),
                }
            }
            ConsolePoll::Line(_) => {}
            ConsolePoll::Idle => std::thread::sleep(self.idle_sleep),
            // Stdin gone (e.g. running detached): keep serving
            ConsolePoll::Closed => std::thread::sleep(self.idle_sleep),
        }
        true
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,netmux=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    tracing::info!("netmux server v{}", netmux::VERSION);

    let config = Config::builder()
        .listen_addr(&args.host)
        .port(args.port)
        .max_connections(args.max_connections)
        .idle_sleep_ms(args.idle_ms)
        .build();

    let console = ConsoleInput::spawn();
    let mut server = Server::new(config.clone());

    if let Err(e) = server.bind() {
        tracing::warn!("{}; connecting as a client instead", e);
        let mut hooks = ConsoleClient::new(console);
        run_client(&config, &mut hooks);
        return;
    }

    let mut hooks = ConsoleServer {
        console,
        idle_sleep: Duration::from_millis(config.idle_sleep_ms),
    };
    if !server.work(&mut hooks) {
        tracing::error!("server ended with an error");
        std::process::exit(1);
    }
    tracing::info!("finished {}:{}", config.listen_addr, config.port);
}

fn run_client(config: &Config, hooks: &mut ConsoleClient) {
    let mut client = match Client::connect(config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = client.work(hooks) {
        tracing::error!("client error: {}", e);
        std::process::exit(1);
    }
}
