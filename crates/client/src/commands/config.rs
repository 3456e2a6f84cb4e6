// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use crate::cli::ConfigCommand;
use crate::config::ClientConfig;
use crate::error::Result;

/// Execute a config subcommand.
pub fn run(cmd: ConfigCommand, config_path: Option<&Path>) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let config = ClientConfig::load_or_default(config_path)?;
            print!("{}", render(&config)?);
            Ok(())
        }
        ConfigCommand::Check { path } => {
            let path = path.as_deref().or(config_path);
            let config = ClientConfig::load_or_default(path)?;
            println!("{}", summarize(&config));
            Ok(())
        }
    }
}

/// TOML for `config show`, with secrets redacted.
pub(crate) fn render(config: &ClientConfig) -> Result<String> {
    config.redacted().to_toml_string()
}

/// One-line summary printed by `config check`.
pub(crate) fn summarize(config: &ClientConfig) -> String {
    let attempts = config
        .manager
        .reconnect
        .max_attempts
        .map_or_else(|| "unlimited".to_string(), |n| n.to_string());
    format!(
        "config ok: remote {}, reconnect attempts {}, queue max {} ({})",
        config.remote.url,
        attempts,
        config.manager.queue.max_size,
        config.manager.queue.drop_strategy
    )
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
