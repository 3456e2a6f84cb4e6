// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tether-relay: WebSocket stanza relay for exercising tether clients.
//!
//! Every text frame a client sends is fanned out to all other connected
//! clients, and optionally echoed back to the sender. Nothing is stored.

mod server;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// tether-relay: WebSocket stanza relay
#[derive(Parser, Debug)]
#[command(name = "tether-relay")]
#[command(about = "WebSocket relay that fans text frames out to every connected client")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "127.0.0.1:7890")]
    bind: SocketAddr,

    /// Also send each frame back to its sender
    #[arg(long)]
    echo: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting tether-relay");
    info!("  Bind address: {}", args.bind);
    info!("  Echo: {}", if args.echo { "on" } else { "off" });

    let state = state::RelayState::new(args.echo);
    server::run(args.bind, state).await?;

    Ok(())
}
