// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `tether connect`: an interactive line client.
//!
//! Each non-empty stdin line is sent as a raw stanza. Inbound stanzas go to
//! stdout; state changes, errors and queue activity are logged to stderr.
//! On EOF or Ctrl-C the remaining queue gets a short grace period, the final
//! health metrics are printed as JSON to stderr and the manager is disposed.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tether_core::ConnectionState;

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ManagerBuilder, SendOptions, WebSocketTransport};
use crate::error::Result;

const DRAIN_GRACE: Duration = Duration::from_secs(2);
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Command-line overrides for `tether connect`.
#[derive(Debug, Clone, Default)]
pub struct ConnectArgs {
    pub url: Option<String>,
    pub priority: Option<u8>,
    pub ttl_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

impl ConnectArgs {
    /// Folds the overrides into a loaded config and revalidates it.
    pub(crate) fn apply(&self, mut config: ClientConfig) -> Result<ClientConfig> {
        if let Some(url) = &self.url {
            config.remote.url = url.clone();
        }
        if let Some(max_attempts) = self.max_attempts {
            config.manager.reconnect.max_attempts = Some(max_attempts);
        }
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn send_options(&self) -> SendOptions {
        SendOptions {
            priority: self.priority,
            ttl: self.ttl_ms.map(Duration::from_millis),
            max_attempts: None,
        }
    }
}

pub async fn run(config: ClientConfig, args: ConnectArgs) -> Result<()> {
    let config = args.apply(config)?;
    let options = args.send_options();

    let mut transport = WebSocketTransport::new();
    if let Some(interval) = config.remote.heartbeat() {
        transport = transport.with_heartbeat(interval);
    }
    let manager = ManagerBuilder::new(transport, config.credentials())
        .config(config.manager.clone())
        .build()?;

    let printer = spawn_printer(&manager);
    let loggers = spawn_loggers(&manager);

    info!(url = %config.remote.url, "connecting");
    let state = manager.connect().await?;
    if state != ConnectionState::Connected {
        warn!(%state, "initial connect did not succeed, lines will be queued");
    }

    let result = pump_stdin(&manager, options).await;

    drain(&manager).await;
    if let Ok(metrics) = manager.metrics().await {
        eprintln!("{}", serde_json::to_string_pretty(&metrics)?);
    }
    manager.dispose().await;

    let _ = printer.await;
    for logger in loggers {
        let _ = logger.await;
    }
    result
}

async fn pump_stdin(manager: &ConnectionManager, options: SendOptions) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => manager.send_raw(line, options)?,
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        }
    }
}

/// Gives queued lines a chance to go out while connected.
async fn drain(manager: &ConnectionManager) {
    let deadline = tokio::time::Instant::now() + DRAIN_GRACE;
    while manager.current_state() == ConnectionState::Connected
        && tokio::time::Instant::now() < deadline
    {
        match manager.outbound_queue_snapshot().await {
            Ok(pending) if !pending.is_empty() => tokio::time::sleep(DRAIN_POLL).await,
            _ => return,
        }
    }
}

fn spawn_printer(manager: &ConnectionManager) -> JoinHandle<()> {
    let mut inbound = manager.subscribe_inbound();
    tokio::spawn(async move {
        while let Some(envelope) = inbound.recv().await {
            match envelope.to_wire() {
                Ok(text) => println!("{text}"),
                Err(e) => warn!(error = %e, "unprintable inbound stanza"),
            }
        }
    })
}

fn spawn_loggers(manager: &ConnectionManager) -> Vec<JoinHandle<()>> {
    let mut states = manager.subscribe_state();
    let mut errors = manager.subscribe_errors();
    let mut queue = manager.subscribe_queue_events();
    vec![
        tokio::spawn(async move {
            while let Some(change) = states.recv().await {
                match change.attempt {
                    Some(attempt) => info!(
                        state = %change.state,
                        attempt,
                        reason = %change.reason,
                        "connection state changed"
                    ),
                    None => info!(
                        state = %change.state,
                        reason = %change.reason,
                        "connection state changed"
                    ),
                }
            }
        }),
        tokio::spawn(async move {
            while let Some(error) = errors.recv().await {
                warn!(kind = ?error.kind, "{}", error.message);
            }
        }),
        tokio::spawn(async move {
            while let Some(event) = queue.recv().await {
                debug!(id = %event.id(), kind = event.kind(), "queue event");
            }
        }),
    ]
}

#[cfg(test)]
#[path = "connect_tests.rs"]
mod tests;
