// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Handles client connections, fan-out and optional echo.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::state::RelayState;

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: RelayState) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: RelayState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (id, mut broadcast_rx) = state.join();
    info!(
        "Client {} connected from {} ({} connected)",
        id,
        peer_addr,
        state.connected()
    );

    let (mut ws_sink, mut ws_stream) = ws_stream.split();
    let result = async {
        loop {
            tokio::select! {
                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            debug!("Client {} sent {} bytes", id, text.len());
                            if state.echo() {
                                ws_sink.send(Message::Text(text.clone())).await?;
                            }
                            state.publish(id, text.as_str().to_string());
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("Client {} disconnected", id);
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            ws_sink.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(_)) => {
                            // Binary, Pong and raw frames are not relayed
                        }
                        Some(Err(e)) => {
                            warn!("WebSocket error from client {}: {}", id, e);
                            break;
                        }
                        None => {
                            info!("Client {} stream ended", id);
                            break;
                        }
                    }
                }

                frame = broadcast_rx.recv() => {
                    match frame {
                        Ok(frame) if frame.from == id => {}
                        Ok(frame) => {
                            if let Err(e) = ws_sink.send(Message::Text(frame.text.into())).await {
                                warn!("Failed to relay to client {}: {}", id, e);
                                break;
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!("Client {} lagged by {} frames", id, n);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }
        Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
    }
    .await;

    state.leave();
    info!("Connection closed: {} ({} connected)", peer_addr, state.connected());
    result
}
