// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tether - A resilient stanza connection client.
//!
//! This crate provides the [`ConnectionManager`](connection::ConnectionManager)
//! and the `tether` CLI built on it. The manager keeps a long-lived
//! connection to a chat server, reconnects with exponential backoff, queues
//! outbound stanzas while the link is down and reports health metrics.
//!
//! # Main Components
//!
//! - [`connection`] - The manager, its transport seam and the WebSocket transport
//! - [`config`] - Client configuration (server settings plus manager tuning)
//! - [`Error`] - Error types for all operations
//!
//! The runtime-free building blocks (queue, backoff, metrics) live in
//! `tether-core`.

mod cli;
mod commands;

pub mod config;
pub mod connection;
pub mod error;

pub use cli::{Cli, Command, ConfigCommand};
pub use commands::connect::ConnectArgs;
pub use config::{ClientConfig, RemoteConfig};
pub use error::{Error, Result};

/// Runs a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Connect {
            url,
            priority,
            ttl_ms,
            max_attempts,
        } => {
            let config = ClientConfig::load_or_default(config_path)?;
            let args = ConnectArgs {
                url,
                priority,
                ttl_ms,
                max_attempts,
            };
            commands::connect::run(config, args).await
        }
        Command::Config(cmd) => commands::config::run(cmd, config_path),
    }
}
