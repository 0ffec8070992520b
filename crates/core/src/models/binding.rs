//! Connection identity and binding

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier minted by the transport for each accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The record tying a live connection to its seat in a room.
///
/// Written once at join, removed once at disconnect. Bindings are never
/// overwritten while the connection lives.
#[derive(Debug, Clone)]
pub struct Binding {
    pub connection_id: ConnectionId,
    pub identity: String,
    pub room_id: Uuid,
    /// The token that admitted this connection.
    pub token_id: String,
    pub bound_at: DateTime<Utc>,
}
