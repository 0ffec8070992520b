//! Alcove Network Library
//!
//! TCP transport for the alcove coordination engine.
//!
//! # Architecture
//!
//! - **Server**: owns the engine; one reader loop and one writer task per
//!   accepted connection, plus a periodic token sweep
//! - **Client**: library client for embedders and end-to-end tests
//! - **Frames**: length-prefixed JSON carrying the engine's event types
//!
//! # Usage
//!
//! ```ignore
//! // Start a server and mint an invite
//! let server = Server::start(ServerConfig::default()).await?;
//! let (token, invite) = server.issue_invite("alice")?;
//!
//! // A guest follows the link
//! let mut client = Client::connect_invite(&invite).await?;
//! client.join(&invite.token, "bob")?;
//!
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         ServerEvent::Message(msg) => { /* render */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod invite;
pub mod server;

pub use client::{Client, ConnectionState};
pub use error::{Error, Result};
pub use invite::InviteUrl;
pub use server::Server;

pub use alcove_core::{ClientEvent, Rejection, SendPayload, ServerConfig, ServerEvent};

/// Default port for alcove servers
pub const DEFAULT_PORT: u16 = 5000;
