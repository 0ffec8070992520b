//! Alcove Core Library
//!
//! The session-lifecycle and room-coordination engine behind alcove's
//! ephemeral two-party rooms: single-use invitation tokens, room membership
//! and ordered message logs, connection-identity bindings, and per-connection
//! send-rate limiting. Everything lives in process memory and vanishes with
//! the process; transport belongs to `alcove-net`, which drives the
//! [`Coordinator`] and never reaches around it.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod identity;
pub mod invariants;
pub mod limiter;
pub mod models;
pub mod store;

pub use config::{ConfigError, ServerConfig};
pub use coordinator::Coordinator;
pub use error::Rejection;
pub use event::{ClientEvent, EventReceiver, EventSender, SendPayload, ServerEvent};
pub use identity::{sanitize_identity, MAX_IDENTITY_CHARS};
pub use limiter::RateLimiter;
pub use models::*;
pub use store::{ConnectionRegistry, RoomStore, TokenRegistry};
