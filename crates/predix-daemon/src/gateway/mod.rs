//! Real-time gateway
//!
//! Admits WebSocket connections after token verification, tracks their
//! lifecycle, and fans events out to them. A single `Arc<Gateway>` is built at
//! startup and handed to whatever needs to push events.

mod auth;
mod connection;

pub use auth::{Admission, Claims, HandshakeAuth, RejectReason, TokenVerifier};
pub use connection::{ConnectionContext, ConnectionId, ConnectionState};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch, RwLock};

/// Frames queued per connection before new ones are dropped
const OUTBOUND_BUFFER: usize = 256;

/// First frame on every admitted socket, carrying its connection id
pub const CONNECTED_EVENT: &str = "connected";

/// Wire frame pushed to clients
#[derive(Debug, Serialize)]
struct Frame<'a, T: Serialize> {
    event: &'a str,
    data: &'a T,
}

#[derive(Debug, Serialize)]
struct Connected {
    id: String,
}

struct ConnectionEntry {
    context: ConnectionContext,
    outbound: mpsc::Sender<String>,
}

/// Gateway state shared by the transport and every event publisher
pub struct Gateway {
    verifier: TokenVerifier,
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
    closing: watch::Sender<bool>,
}

impl Gateway {
    pub fn new(verifier: TokenVerifier) -> Self {
        let (closing, _) = watch::channel(false);
        Self {
            verifier,
            connections: RwLock::new(HashMap::new()),
            closing,
        }
    }

    /// Run the admission algorithm for one handshake
    pub fn admit(&self, auth_token: Option<&str>, authorization: Option<&str>) -> Admission {
        self.verifier.admit(auth_token, authorization)
    }

    /// Drive an admitted socket until either side closes it
    pub async fn serve(&self, socket: WebSocket, claims: Claims) {
        let mut closing = self.closing.subscribe();
        if *closing.borrow_and_update() {
            return;
        }

        let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
        let id = self.register(ConnectionContext::connecting(claims), tx).await;
        tracing::info!(connection_id = %id, "Socket connected: {}", id);

        let (mut sink, mut stream) = socket.split();

        let greeting = encode(CONNECTED_EVENT, &Connected { id: id.to_string() });
        let greeted = match greeting {
            Some(frame) => sink.send(Message::Text(frame)).await.is_ok(),
            None => true,
        };

        if greeted {
            loop {
                tokio::select! {
                    outbound = rx.recv() => match outbound {
                        Some(frame) => {
                            if sink.send(Message::Text(frame)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    inbound = stream.next() => match inbound {
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        // Application messages are not inspected
                        Some(Ok(_)) => {}
                    },
                    _ = closing.changed() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }

        self.unregister(&id).await;
        tracing::info!(connection_id = %id, "Socket disconnected: {}", id);
    }

    /// Push an event to every admitted connection. Returns how many accepted it.
    pub async fn emit<T: Serialize>(&self, event: &str, data: &T) -> usize {
        let Some(frame) = encode(event, data) else {
            return 0;
        };

        let connections = self.connections.read().await;
        connections
            .iter()
            .filter(|(id, entry)| deliver(id, entry, frame.clone()))
            .count()
    }

    /// Push an event to one connection
    pub async fn emit_to<T: Serialize>(&self, id: &ConnectionId, event: &str, data: &T) -> bool {
        let Some(frame) = encode(event, data) else {
            return false;
        };

        let connections = self.connections.read().await;
        connections
            .get(id)
            .map(|entry| deliver(id, entry, frame))
            .unwrap_or(false)
    }

    /// Snapshot of a live connection
    pub async fn connection(&self, id: &ConnectionId) -> Option<ConnectionContext> {
        let connections = self.connections.read().await;
        connections.get(id).map(|entry| entry.context.clone())
    }

    /// Snapshots of every live connection
    pub async fn connections(&self) -> Vec<ConnectionContext> {
        let connections = self.connections.read().await;
        connections
            .values()
            .map(|entry| entry.context.clone())
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Ask every live socket to close
    pub fn close_all(&self) {
        self.closing.send_replace(true);
    }

    async fn register(
        &self,
        mut context: ConnectionContext,
        outbound: mpsc::Sender<String>,
    ) -> ConnectionId {
        context.admit();
        let id = context.id;
        let mut connections = self.connections.write().await;
        connections.insert(id, ConnectionEntry { context, outbound });
        id
    }

    async fn unregister(&self, id: &ConnectionId) -> Option<ConnectionContext> {
        let mut connections = self.connections.write().await;
        connections.remove(id).map(|entry| {
            let mut context = entry.context;
            context.close();
            context
        })
    }
}

fn encode<T: Serialize>(event: &str, data: &T) -> Option<String> {
    match serde_json::to_string(&Frame { event, data }) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(event = event, error = %e, "Failed to encode gateway event");
            None
        }
    }
}

fn deliver(id: &ConnectionId, entry: &ConnectionEntry, frame: String) -> bool {
    match entry.outbound.try_send(frame) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(connection_id = %id, "Outbound buffer full, dropping event");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}
