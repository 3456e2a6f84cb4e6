// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration management.
//!
//! Configuration is read from `--config <path>` or, when that is not given,
//! from `tether/config.toml` under the user config directory. It holds the
//! `[remote]` server settings next to the connection manager sections:
//!
//! ```toml
//! [remote]
//! url = "wss://chat.example.com/ws"
//! username = "alice"
//! heartbeat_interval_ms = 15000
//!
//! [reconnect]
//! max_attempts = 20
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tether_core::{Credentials, ManagerConfig};

use crate::error::{Error, Result};

const CONFIG_DIR_NAME: &str = "tether";
const CONFIG_FILE_NAME: &str = "config.toml";
const REDACTED: &str = "<redacted>";

/// Everything the `tether` client reads from its config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(flatten)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Server to connect to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// WebSocket URL (`ws://` or `wss://`).
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Heartbeat ping interval in milliseconds (default: 30000). 0 = disabled.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_url() -> String {
    "ws://127.0.0.1:7890".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            url: default_url(),
            username: None,
            password: None,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl RemoteConfig {
    pub fn heartbeat(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }
}

/// Default config file location, if the platform has a config directory.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

impl ClientConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(s).map_err(tether_core::Error::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::ConfigNotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` if given, otherwise the default file if it exists,
    /// otherwise the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.manager.validate()?;
        if self.remote.url.trim().is_empty() {
            return Err(Error::Config(tether_core::Error::InvalidConfig {
                field: "remote.url",
                reason: "must not be empty".to_string(),
            }));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::new(self.remote.url.clone());
        credentials.username = self.remote.username.clone();
        credentials.password = self.remote.password.clone();
        credentials
    }

    /// Copy that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.remote.password.is_some() {
            config.remote.password = Some(REDACTED.to_string());
        }
        config
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self).map_err(tether_core::Error::from)?)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
