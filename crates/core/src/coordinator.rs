//! Session coordinator: every inbound event becomes one state transition
//!
//! The coordinator consults the token registry, room store, and connection
//! registry, applies the transition, and fans the results out to affected
//! connections. Transitions are synchronous critical sections; fan-out uses
//! the members' unbounded handles from inside the room lock, so the order
//! events enter a room's log is exactly the order every member receives
//! them.
//!
//! Lock order across stores is token before room. The connection registry
//! clones bindings out instead of holding guards, so it never participates
//! in a cycle.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Rejection;
use crate::event::{EventSender, SendPayload, ServerEvent};
use crate::identity::sanitize_identity;
use crate::limiter::RateLimiter;
use crate::models::{Binding, ConnectionId, Message, Participant, Token, ROOM_CAPACITY};
use crate::store::{ConnectionRegistry, RoomStore, TokenRegistry};

/// The coordination engine behind one server process.
///
/// Stores are passed in at construction so every dependency is explicit;
/// the coordinator owns them for the life of the process.
pub struct Coordinator {
    tokens: TokenRegistry,
    rooms: RoomStore,
    connections: ConnectionRegistry,
}

impl Coordinator {
    pub fn new(tokens: TokenRegistry, rooms: RoomStore, connections: ConnectionRegistry) -> Self {
        Self {
            tokens,
            rooms,
            connections,
        }
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Issue a fresh invitation token owned by `owner_identity`. The caller
    /// (an issuing endpoint, a CLI) applies its own request limiting; the
    /// engine only sanitizes the owner name.
    pub fn issue(&self, owner_identity: &str) -> Result<Token, Rejection> {
        let owner = sanitize_identity(owner_identity).ok_or(Rejection::MalformedPayload)?;
        Ok(self.tokens.issue(&owner, Utc::now()))
    }

    /// Read-only token check for a landing page. Advisory only: the
    /// authoritative check runs again inside `join`.
    pub fn peek(&self, token_id: &str) -> bool {
        self.tokens.validate(token_id, Utc::now())
    }

    /// Redeem a token and seat the connection in the token's room, creating
    /// the room on first redemption.
    ///
    /// On acceptance the joiner receives a `Joined` snapshot taken before
    /// the join notice, the other member receives `MemberJoined`, and the
    /// notice itself then reaches everyone as an ordinary `Message`. The
    /// token is consumed the instant the room reaches capacity; replaying a
    /// consumed link is refused as `RoomFull` while the room holds both
    /// members, and as `InvalidOrExpiredToken` after that. On any
    /// rejection, nothing is mutated.
    pub fn join(
        &self,
        connection_id: ConnectionId,
        handle: EventSender,
        token_id: &str,
        identity: &str,
    ) -> Result<(), Rejection> {
        if self.connections.is_bound(connection_id) {
            return Err(Rejection::AlreadyJoined);
        }
        let identity = sanitize_identity(identity).ok_or(Rejection::MalformedPayload)?;
        let now = Utc::now();

        // The token entry lock spans validation, room binding, and the
        // membership change. A concurrent join on the same token, or the
        // sweep, waits here instead of racing.
        let admitted = self.tokens.with_live(token_id, now, |token| {
            if token.consumed {
                // A consumed link never readmits. While the room actually
                // holds both members the refusal is RoomFull; once a seat
                // frees up again the link is simply dead.
                let full = token
                    .room_id
                    .and_then(|room_id| self.rooms.with_room(room_id, |room| room.is_full()))
                    .unwrap_or(false);
                return Err(if full {
                    Rejection::RoomFull
                } else {
                    Rejection::InvalidOrExpiredToken
                });
            }
            let room_id = token.bind_room(Uuid::new_v4());
            let members_now = self.rooms.with_room_or_create(room_id, now, |room| {
                room.try_add_member(Participant {
                    identity: identity.clone(),
                    connection_id,
                    tx: handle.clone(),
                    joined_at: now,
                })?;

                if !self.connections.bind(Binding {
                    connection_id,
                    identity: identity.clone(),
                    room_id: room.id,
                    token_id: token.id.clone(),
                    bound_at: now,
                }) {
                    warn!(connection = %connection_id, "Connection bound mid-join, keeping original");
                }

                let snapshot = ServerEvent::Joined {
                    room_id: room.id,
                    identity: identity.clone(),
                    members: room.member_names(),
                    log: room.log.clone(),
                };
                if handle.send(snapshot).is_err() {
                    debug!(connection = %connection_id, "Joiner channel closed before snapshot");
                }
                room.broadcast_except(
                    &ServerEvent::MemberJoined {
                        members: room.member_names(),
                    },
                    connection_id,
                );

                let notice = room.append(Message::system(
                    format!("{} joined the chat", identity),
                    now,
                ));
                room.broadcast(&ServerEvent::Message(notice));

                info!(room = %room.id, identity = %identity, connection = %connection_id, "Participant joined");
                Ok(room.members.len())
            })?;

            if members_now == ROOM_CAPACITY {
                token.consume();
                debug!(token = %token.id, "Token consumed at capacity");
            }
            Ok(())
        });

        match admitted {
            Ok(inner) => inner,
            Err(rejection) => Err(rejection),
        }
    }

    /// Ingest a message from a bound connection and deliver it to the whole
    /// room, sender included.
    pub fn message(
        &self,
        connection_id: ConnectionId,
        payload: SendPayload,
        limiter: &mut RateLimiter,
    ) -> Result<(), Rejection> {
        let Binding {
            identity, room_id, ..
        } = self
            .connections
            .resolve(connection_id)
            .ok_or(Rejection::NotInRoom)?;

        if !limiter.check(Instant::now()) {
            debug!(connection = %connection_id, "Send rate limited");
            return Err(Rejection::RateLimited);
        }
        let body = payload.validate()?;

        let message = Message::user(identity, body, Utc::now());
        let appended = self.rooms.with_room(room_id, |room| {
            let recorded = room.append(message);
            room.broadcast(&ServerEvent::Message(recorded));
        });
        if appended.is_none() {
            // Room torn down after the binding was read; the disconnect
            // path owns the cleanup.
            debug!(connection = %connection_id, room = %room_id, "Send dropped, room is gone");
        }
        Ok(())
    }

    /// Relay a typing indicator to the other member. Never logged, never
    /// persisted.
    pub fn typing(&self, connection_id: ConnectionId, typing: bool) -> Result<(), Rejection> {
        let Binding {
            identity, room_id, ..
        } = self
            .connections
            .resolve(connection_id)
            .ok_or(Rejection::NotInRoom)?;

        let event = ServerEvent::Typing { identity, typing };
        self.rooms
            .with_room(room_id, |room| room.broadcast_except(&event, connection_id));
        Ok(())
    }

    /// Tear down everything the connection held. Safe to call for
    /// connections that never joined; always infallible.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let Some(binding) = self.connections.unbind(connection_id) else {
            debug!(connection = %connection_id, "Disconnect before join");
            return;
        };
        let now = Utc::now();

        let removed = self.rooms.with_room_reap(binding.room_id, |room| {
            if room.remove_member(connection_id).is_none() {
                warn!(room = %room.id, connection = %connection_id, "Binding pointed at a room without the member");
                return;
            }
            if !room.is_empty() {
                room.broadcast(&ServerEvent::MemberLeft {
                    members: room.member_names(),
                });
                let notice = room.append(Message::system(
                    format!("{} left the chat", binding.identity),
                    now,
                ));
                room.broadcast(&ServerEvent::Message(notice));
            }
        });
        if removed.is_none() {
            debug!(room = %binding.room_id, "Room already gone at disconnect");
        }

        info!(room = %binding.room_id, identity = %binding.identity, connection = %connection_id, "Participant left");
    }

    /// Remove expired tokens and reap rooms they leave unreachable and
    /// empty. Driven by the transport's periodic task; `now` is injected so
    /// tests can advance time. Returns how many tokens were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let removed = self.tokens.sweep(now);
        let mut reaped = 0usize;
        for (_, room_id) in &removed {
            if let Some(room_id) = room_id {
                if self.rooms.remove_if_empty(*room_id) {
                    reaped += 1;
                }
            }
        }
        if !removed.is_empty() {
            info!(tokens = removed.len(), rooms = reaped, "Swept expired invitation tokens");
        }
        removed.len()
    }
}
