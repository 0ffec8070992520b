//! Invitation token model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single-use invitation gating entry into one room.
///
/// A token admits joins while it is inside its time-to-live and not yet
/// consumed. It is consumed the instant its room reaches capacity and that
/// is irreversible, so a link can never be replayed into a full or
/// previously full room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Opaque capability key, carried in the invite link.
    pub id: String,
    /// Display name of the inviter, fixed at issuance.
    pub owner_identity: String,
    pub created_at: DateTime<Utc>,
    /// Set when the bound room reaches capacity. Never cleared.
    pub consumed: bool,
    /// The room this token lazily created on first join, if any yet.
    pub room_id: Option<Uuid>,
}

impl Token {
    pub fn issue(owner_identity: String, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_token_id(),
            owner_identity,
            created_at: now,
            consumed: false,
            room_id: None,
        }
    }

    /// Expiry is purely time-based: consumption does not extend or shorten it.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at >= ttl
    }

    pub fn is_valid(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        !self.consumed && !self.is_expired(ttl, now)
    }

    /// Bind a room to this token, keeping the existing binding if one was
    /// already made by an earlier join. Returns the room id in effect.
    pub fn bind_room(&mut self, room_id: Uuid) -> Uuid {
        *self.room_id.get_or_insert(room_id)
    }

    /// Mark the token used up. There is no way back.
    pub fn consume(&mut self) {
        self.consumed = true;
    }
}

/// Generate an opaque token id: UUIDv4 hex with the dashes stripped.
pub fn generate_token_id() -> String {
    Uuid::new_v4().to_string().replace('-', "")
}
