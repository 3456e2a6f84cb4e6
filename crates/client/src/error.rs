// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the tether client.

use thiserror::Error;

use crate::connection::TransportError;

/// All errors surfaced by the connection manager and the CLI.
#[derive(Debug, Error)]
pub enum Error {
    #[error("connection manager has been disposed")]
    Disposed,

    #[error("no tokio runtime: {0}\n  hint: build the manager from inside a tokio runtime")]
    NoRuntime(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] tether_core::Error),

    #[error("config file not found: {0}\n  hint: run `tether config show > <path>` to create one")]
    ConfigNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for tether client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
