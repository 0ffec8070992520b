//! Rejection taxonomy for the coordination engine
//!
//! Every variant is an expected, recoverable outcome. A rejection is
//! reported to the connection that triggered it and processing continues;
//! nothing here tears down a connection or the process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an inbound event was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Token unknown, past its time-to-live, or already consumed.
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,

    /// The room already holds its two members.
    #[error("room is full")]
    RoomFull,

    /// The other member already uses this display name.
    #[error("name already taken")]
    NameTaken,

    /// Event from a connection that never joined a room.
    #[error("not in a room")]
    NotInRoom,

    /// Message sends exceeded the per-connection ceiling.
    #[error("rate limited")]
    RateLimited,

    /// Payload failed structural validation.
    #[error("malformed payload")]
    MalformedPayload,

    /// The connection is already bound to a room. A connection joins at
    /// most once; bindings are never overwritten.
    #[error("already joined")]
    AlreadyJoined,
}

impl Rejection {
    /// Stable wire code for this rejection, identical to its serde form.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::InvalidOrExpiredToken => "invalid_or_expired_token",
            Rejection::RoomFull => "room_full",
            Rejection::NameTaken => "name_taken",
            Rejection::NotInRoom => "not_in_room",
            Rejection::RateLimited => "rate_limited",
            Rejection::MalformedPayload => "malformed_payload",
            Rejection::AlreadyJoined => "already_joined",
        }
    }
}
