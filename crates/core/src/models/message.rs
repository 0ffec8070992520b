//! Message model for room logs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Engine-generated join/leave notice.
    System,
    /// Sent by a participant.
    User,
}

/// Client-supplied initialization vector and salt accompanying ciphertext.
///
/// The engine never reads or derives anything from these; both round-trip
/// verbatim so the receiving client can decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub iv: Vec<u8>,
    pub salt: Vec<u8>,
}

/// Validated body of a user message: text, an image, or both, optionally
/// wrapped in an encryption envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBody {
    pub text: Option<String>,
    pub image: Option<String>,
    pub envelope: Option<Envelope>,
}

/// One entry in a room's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub kind: MessageKind,
    /// Sending identity. `None` for system messages.
    pub sender: Option<String>,
    pub text: Option<String>,
    /// A `data:image/...;base64,` URL, or opaque ciphertext when enveloped.
    pub image: Option<String>,
    /// Present exactly when `text`/`image` carry ciphertext.
    pub envelope: Option<Envelope>,
    /// Assigned at ingestion. Non-decreasing within a room's log.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn system(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MessageKind::System,
            sender: None,
            text: Some(text.into()),
            image: None,
            envelope: None,
            timestamp,
        }
    }

    pub fn user(sender: String, body: MessageBody, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MessageKind::User,
            sender: Some(sender),
            text: body.text,
            image: body.image,
            envelope: body.envelope,
            timestamp,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.envelope.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_has_no_sender() {
        let msg = Message::system("alice joined the chat", Utc::now());
        assert_eq!(msg.kind, MessageKind::System);
        assert!(msg.sender.is_none());
        assert_eq!(msg.text.as_deref(), Some("alice joined the chat"));
        assert!(!msg.is_encrypted());
    }

    #[test]
    fn test_user_message_carries_body() {
        let body = MessageBody {
            text: Some("hello".to_string()),
            image: None,
            envelope: None,
        };
        let msg = Message::user("bob".to_string(), body, Utc::now());
        assert_eq!(msg.kind, MessageKind::User);
        assert_eq!(msg.sender.as_deref(), Some("bob"));
        assert_eq!(msg.text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_enveloped_message_is_encrypted() {
        let body = MessageBody {
            text: Some("3b2a...".to_string()),
            image: None,
            envelope: Some(Envelope {
                iv: vec![0u8; 12],
                salt: vec![1u8; 16],
            }),
        };
        let msg = Message::user("bob".to_string(), body, Utc::now());
        assert!(msg.is_encrypted());
    }
}
