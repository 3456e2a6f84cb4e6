// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Opaque stanza envelopes and connection credentials.
//!
//! The connection layer never looks inside an envelope; it only needs to
//! serialize it for the wire and clone it for observers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One inbound or outbound message unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Envelope {
    /// Pre-serialized stanza text, sent as-is.
    Raw(String),
    /// Structured stanza, serialized as JSON on the wire.
    Element(serde_json::Value),
}

impl Envelope {
    pub fn raw(text: impl Into<String>) -> Self {
        Envelope::Raw(text.into())
    }

    pub fn element(value: serde_json::Value) -> Self {
        Envelope::Element(value)
    }

    /// Text representation written to the transport.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        match self {
            Envelope::Raw(text) => Ok(text.clone()),
            Envelope::Element(value) => serde_json::to_string(value),
        }
    }

    /// Approximate payload size in bytes, used for logging.
    pub fn len(&self) -> usize {
        match self {
            Envelope::Raw(text) => text.len(),
            Envelope::Element(value) => value.to_string().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where and as whom to connect.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Server URL, e.g. `wss://chat.example.com/ws`.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(url: impl Into<String>) -> Self {
        Credentials {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    pub fn with_login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

// Keep passwords out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
