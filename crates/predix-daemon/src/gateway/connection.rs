//! Per-connection context

use super::auth::Claims;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of an admitted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Admitted,
    Closed,
}

/// Everything the gateway knows about one connection
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionContext {
    pub id: ConnectionId,
    pub claims: Claims,
    pub state: ConnectionState,
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

impl ConnectionContext {
    pub fn connecting(claims: Claims) -> Self {
        Self {
            id: ConnectionId::generate(),
            claims,
            state: ConnectionState::Connecting,
            connected_at: chrono::Utc::now(),
        }
    }

    pub(crate) fn admit(&mut self) {
        self.state = ConnectionState::Admitted;
    }

    pub(crate) fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }
}
