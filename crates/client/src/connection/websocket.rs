// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport over tokio-tungstenite.
//!
//! Each connection runs two tasks. The writer drains an unbounded channel,
//! which is what lets [`Transport::send`] hand off synchronously, and sends
//! heartbeat pings. The reader turns text frames into inbound envelopes,
//! matches pongs to pings for round-trip times, and reports the end of the
//! connection as a status event.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tether_core::{Credentials, Envelope};

use super::transport::{
    EventSink, Transport, TransportError, TransportEvent, TransportResult, TransportStatus,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `disconnect` waits for the close frame to be written.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Nonce and send time of the ping awaiting its pong.
type PendingPing = Arc<Mutex<Option<(u64, Instant)>>>;

/// WebSocket implementation of [`Transport`].
#[derive(Default)]
pub struct WebSocketTransport {
    heartbeat: Option<Duration>,
    session: Option<Session>,
}

struct Session {
    outgoing: mpsc::UnboundedSender<Message>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends a ping every `interval` and reports round-trip times.
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = (!interval.is_zero()).then_some(interval);
        self
    }

    async fn close_session(&mut self, reason: String) {
        let Some(session) = self.session.take() else {
            return;
        };
        if session.connected.swap(false, Ordering::SeqCst) {
            debug!(%reason, "closing websocket");
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: reason.into(),
            };
            let _ = session.outgoing.send(Message::Close(Some(frame)));
            if tokio::time::timeout(CLOSE_GRACE, session.writer).await.is_err() {
                debug!("close frame not written in time");
            }
        }
        session.cancel.cancel();
        let _ = session.reader.await;
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.cancel.cancel();
        }
    }
}

fn classify_connect_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Http(response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            TransportError::AuthFailed(format!("server responded {}", response.status()))
        }
        tungstenite::Error::Url(e) => TransportError::Initiation(e.to_string()),
        other => TransportError::ConnectionFailed(other.to_string()),
    }
}

fn check_url(url: &str) -> TransportResult<()> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(())
    } else {
        Err(TransportError::Initiation(format!(
            "unsupported url '{url}', expected ws:// or wss://"
        )))
    }
}

impl Transport for WebSocketTransport {
    fn connect(
        &mut self,
        credentials: &Credentials,
        events: EventSink,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let url = credentials.url.clone();
        Box::pin(async move {
            self.close_session("reconnecting".to_string()).await;
            check_url(&url)?;

            let _ = events.send(TransportEvent::status(TransportStatus::Connecting, None));
            let (ws_stream, _) = match connect_async(url.as_str()).await {
                Ok(connected) => connected,
                Err(err) => {
                    let err = classify_connect_error(err);
                    let status = match err {
                        TransportError::AuthFailed(_) => TransportStatus::AuthFailure,
                        _ => TransportStatus::ConnectionFailure,
                    };
                    let _ = events.send(TransportEvent::status(status, Some(err.to_string())));
                    return Err(err);
                }
            };
            debug!(%url, "websocket connected");

            let (sink, stream) = ws_stream.split();
            let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
            let connected = Arc::new(AtomicBool::new(true));
            let cancel = CancellationToken::new();
            let pending: PendingPing = Arc::new(Mutex::new(None));

            let heartbeat = self
                .heartbeat
                .map(|period| tokio::time::interval_at(Instant::now() + period, period));
            let writer = tokio::spawn(write_loop(
                sink,
                outgoing_rx,
                heartbeat,
                Arc::clone(&pending),
                Arc::clone(&connected),
                cancel.clone(),
                events.clone(),
            ));
            let reader = tokio::spawn(read_loop(
                stream,
                pending,
                Arc::clone(&connected),
                cancel.clone(),
                events.clone(),
            ));

            self.session = Some(Session {
                outgoing,
                connected,
                cancel,
                writer,
                reader,
            });
            let _ = events.send(TransportEvent::status(TransportStatus::Connected, None));
            Ok(())
        })
    }

    fn disconnect(
        &mut self,
        reason: &str,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let reason = reason.to_string();
        Box::pin(async move {
            self.close_session(reason).await;
            Ok(())
        })
    }

    fn send(&mut self, envelope: &Envelope) -> TransportResult<()> {
        let session = self
            .session
            .as_ref()
            .filter(|session| session.connected.load(Ordering::SeqCst))
            .ok_or(TransportError::ConnectionClosed)?;
        let text = envelope
            .to_wire()
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        session
            .outgoing
            .send(Message::Text(text.into()))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.connected.load(Ordering::SeqCst))
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn lost(connected: &AtomicBool, events: &EventSink, status: TransportStatus, error: Option<String>) {
    if connected.swap(false, Ordering::SeqCst) {
        let _ = events.send(TransportEvent::status(status, error));
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    mut heartbeat: Option<Interval>,
    pending: PendingPing,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    events: EventSink,
) {
    let mut nonce: u64 = 0;
    loop {
        let message = tokio::select! {
            () = cancel.cancelled() => break,
            message = outgoing.recv() => match message {
                Some(message) => message,
                None => break,
            },
            () = tick(&mut heartbeat) => {
                nonce += 1;
                if let Ok(mut slot) = pending.lock() {
                    *slot = Some((nonce, Instant::now()));
                }
                Message::Ping(nonce.to_be_bytes().to_vec().into())
            }
        };

        let closing = matches!(message, Message::Close(_));
        if let Err(err) = sink.send(message).await {
            warn!(error = %err, "websocket write failed");
            lost(&connected, &events, TransportStatus::Error, Some(err.to_string()));
            break;
        }
        if closing {
            break;
        }
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    pending: PendingPing,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    events: EventSink,
) {
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            next = stream.next() => next,
        };
        match next {
            Some(Ok(Message::Text(text))) => {
                let _ = events.send(TransportEvent::Inbound(Envelope::raw(text.as_str())));
            }
            Some(Ok(Message::Pong(payload))) => {
                let Ok(bytes) = <[u8; 8]>::try_from(payload.as_ref()) else {
                    continue;
                };
                let nonce = u64::from_be_bytes(bytes);
                let sent = pending.lock().ok().and_then(|mut slot| {
                    let (expected, at) = (*slot)?;
                    (expected == nonce).then(|| {
                        *slot = None;
                        at
                    })
                });
                if let Some(at) = sent {
                    let _ = events.send(TransportEvent::RoundTrip(at.elapsed()));
                }
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame.map(|f| f.reason.as_str().to_string());
                debug!(?reason, "websocket closed by server");
                lost(&connected, &events, TransportStatus::Disconnected, reason);
                break;
            }
            // Pings are answered by tungstenite itself.
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                warn!(error = %err, "websocket read failed");
                lost(
                    &connected,
                    &events,
                    TransportStatus::ConnectionFailure,
                    Some(err.to_string()),
                );
                break;
            }
            None => {
                lost(&connected, &events, TransportStatus::Disconnected, None);
                break;
            }
        }
    }
    cancel.cancel();
}

#[cfg(test)]
#[path = "websocket_tests.rs"]
mod tests;
