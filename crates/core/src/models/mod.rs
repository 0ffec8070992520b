//! Data models for alcove

mod binding;
mod message;
mod room;
mod token;

pub use binding::*;
pub use message::*;
pub use room::*;
pub use token::*;
