//! netmux CLI Client
//!
//! Sends stdin lines to a netmux server and prints what it broadcasts back.

use clap::Parser;
use netmux::config::DEFAULT_PORT;
use netmux::console::{ConsoleClient, ConsoleInput};
use netmux::{Client, Config};
use tracing_subscriber::{fmt, EnvFilter};

/// netmux CLI
#[derive(Parser, Debug)]
#[command(name = "netmux-cli")]
#[command(about = "Line client for a netmux server")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,netmux=info"));
    fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = Config::builder()
        .listen_addr(&args.host)
        .port(args.port)
        .build();

    println!("connecting client to {}:{}", config.listen_addr, config.port);
    let mut client = match Client::connect(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let mut hooks = ConsoleClient::new(ConsoleInput::spawn());
    match client.work(&mut hooks) {
        Ok(stats) => println!(
            "done with client ({}b sent, {}b read)",
            stats.bytes_sent, stats.bytes_read
        ),
        Err(e) => {
            eprintln!("client error: {}", e);
            std::process::exit(1);
        }
    }
}
