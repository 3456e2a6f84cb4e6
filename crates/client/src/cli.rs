// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const QUICKSTART_HELP: &str = "\
Get started:
  tether config show > ~/.config/tether/config.toml   Write a starter config
  tether connect ws://127.0.0.1:7890                  Connect and chat over stdin
  tether config check ./config.toml                   Validate a config file";

#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Resilient stanza connection client with reconnect and an outbound queue")]
#[command(version)]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Config file (default: <config dir>/tether/config.toml)
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a server, send stdin lines and print inbound stanzas
    #[command(after_help = "Examples:\n  \
        tether connect                          Use the configured server\n  \
        tether connect wss://chat.example.com   Override the server URL\n  \
        tether connect --priority 0             Send lines at the highest priority")]
    Connect {
        /// Server URL (overrides remote.url)
        url: Option<String>,

        /// Priority for sent lines; 0 is the highest
        #[arg(long, short)]
        priority: Option<u8>,

        /// Per-line time-to-live in milliseconds while queued
        #[arg(long, value_name = "MS")]
        ttl_ms: Option<u64>,

        /// Give up reconnecting after this many attempts
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
        max_attempts: Option<u32>,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML (passwords redacted)
    Show,

    /// Validate a config file
    Check {
        /// File to check (default: the effective config file)
        path: Option<PathBuf>,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
