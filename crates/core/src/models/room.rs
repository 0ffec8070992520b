//! Room and participant models

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::Rejection;
use crate::event::{EventSender, ServerEvent};
use crate::invariants;

use super::{ConnectionId, Message};

/// Maximum concurrent members in a room.
pub const ROOM_CAPACITY: usize = 2;

/// A joined identity bound to one live connection.
#[derive(Debug, Clone)]
pub struct Participant {
    pub identity: String,
    pub connection_id: ConnectionId,
    /// Outbound handle to the member's connection. Held for fan-out only;
    /// the connection registry owns connection lifetime.
    pub tx: EventSender,
    pub joined_at: DateTime<Utc>,
}

/// An ephemeral two-party messaging context.
///
/// Members and the log live only in memory. When the last member leaves,
/// the room is deleted and the log is gone with it.
#[derive(Debug)]
pub struct Room {
    pub id: Uuid,
    pub members: Vec<Participant>,
    pub log: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            members: Vec::with_capacity(ROOM_CAPACITY),
            log: Vec::new(),
            created_at: now,
        }
    }

    /// Admit a participant, refusing over-capacity and duplicate identities.
    pub fn try_add_member(&mut self, participant: Participant) -> Result<(), Rejection> {
        if self.members.len() >= ROOM_CAPACITY {
            return Err(Rejection::RoomFull);
        }
        if self.has_identity(&participant.identity) {
            return Err(Rejection::NameTaken);
        }
        self.members.push(participant);
        invariants::assert_room_invariants(self);
        Ok(())
    }

    /// Remove the member bound to `connection_id`, if present.
    pub fn remove_member(&mut self, connection_id: ConnectionId) -> Option<Participant> {
        let idx = self
            .members
            .iter()
            .position(|p| p.connection_id == connection_id)?;
        Some(self.members.remove(idx))
    }

    /// Append to the log, clamping the timestamp so log order never shows
    /// time moving backwards. Returns the message as recorded.
    pub fn append(&mut self, mut message: Message) -> Message {
        if let Some(last) = self.log.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }
        self.log.push(message.clone());
        invariants::assert_room_invariants(self);
        message
    }

    /// Fan an event out to every member. A member whose channel is gone is
    /// skipped; the others still receive the event.
    pub fn broadcast(&self, event: &ServerEvent) {
        for member in &self.members {
            if member.tx.send(event.clone()).is_err() {
                debug!(room = %self.id, identity = %member.identity, "Dropped event for closed channel");
            }
        }
    }

    /// Fan an event out to every member except `except`.
    pub fn broadcast_except(&self, event: &ServerEvent, except: ConnectionId) {
        for member in &self.members {
            if member.connection_id == except {
                continue;
            }
            if member.tx.send(event.clone()).is_err() {
                debug!(room = %self.id, identity = %member.identity, "Dropped event for closed channel");
            }
        }
    }

    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|p| p.identity.clone()).collect()
    }

    pub fn has_identity(&self, identity: &str) -> bool {
        self.members.iter().any(|p| p.identity == identity)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= ROOM_CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
