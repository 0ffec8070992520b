//! In-memory stores backing the coordination engine
//!
//! Everything here is process-scoped and volatile. Each store guards its
//! entries with per-key locks; the lock ordering across stores is token
//! before room, and connection locks are never held across another store's
//! call.

mod connections;
mod rooms;
mod tokens;

pub use connections::ConnectionRegistry;
pub use rooms::RoomStore;
pub use tokens::TokenRegistry;
