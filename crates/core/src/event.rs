//! Events crossing the engine boundary
//!
//! `ClientEvent` is what a connection sends in, `ServerEvent` is what the
//! engine fans out. Both are plain serde types; the wire encoding around
//! them belongs to the transport crate.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Rejection;
use crate::models::{Envelope, Message, MessageBody};

/// Outbound handle for one connection. Sends never block, so fan-out can
/// run inside a store critical section without stalling it.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Events a connection sends to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Redeem an invitation token under a display name.
    Join { token: String, identity: String },
    /// Post a message to the sender's room.
    Send(SendPayload),
    /// Typing indicator, start or stop.
    Typing { typing: bool },
    /// Transport keepalive. Answered with `Pong` by the connection handler
    /// and never forwarded to the coordinator.
    Ping,
}

/// Body of a `Send` event, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<Vec<u8>>,
}

impl SendPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn image(data_url: impl Into<String>) -> Self {
        Self {
            image: Some(data_url.into()),
            ..Self::default()
        }
    }

    pub fn encrypted(
        text: Option<String>,
        image: Option<String>,
        iv: Vec<u8>,
        salt: Vec<u8>,
    ) -> Self {
        Self {
            text,
            image,
            encrypted: true,
            iv: Some(iv),
            salt: Some(salt),
        }
    }

    /// Structural validation, nothing more. Ciphertext is never examined:
    /// when `encrypted` is set, text and image pass through opaque and only
    /// the envelope pieces are required. Plaintext images must be inline
    /// `data:image/...;base64,` URLs with a decodable body.
    pub fn validate(self) -> Result<MessageBody, Rejection> {
        let text = self.text.filter(|t| !t.is_empty());
        let image = self.image.filter(|i| !i.is_empty());
        if text.is_none() && image.is_none() {
            return Err(Rejection::MalformedPayload);
        }

        if self.encrypted {
            let iv = self
                .iv
                .filter(|v| !v.is_empty())
                .ok_or(Rejection::MalformedPayload)?;
            let salt = self
                .salt
                .filter(|v| !v.is_empty())
                .ok_or(Rejection::MalformedPayload)?;
            return Ok(MessageBody {
                text,
                image,
                envelope: Some(Envelope { iv, salt }),
            });
        }

        if self.iv.is_some() || self.salt.is_some() {
            return Err(Rejection::MalformedPayload);
        }
        if let Some(ref image) = image {
            if !is_image_data_url(image) {
                return Err(Rejection::MalformedPayload);
            }
        }
        Ok(MessageBody {
            text,
            image,
            envelope: None,
        })
    }
}

/// `data:image/<subtype>;base64,<body>` with a non-empty, decodable body.
fn is_image_data_url(s: &str) -> bool {
    let Some(rest) = s.strip_prefix("data:image/") else {
        return false;
    };
    let Some((subtype, body)) = rest.split_once(";base64,") else {
        return false;
    };
    !subtype.is_empty() && !body.is_empty() && BASE64.decode(body).is_ok()
}

/// Events the engine fans out to connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Join accepted. Sent only to the joiner; the log snapshot is taken
    /// before the join notice, which then arrives as a normal `Message`.
    Joined {
        room_id: Uuid,
        identity: String,
        members: Vec<String>,
        log: Vec<Message>,
    },
    /// Someone else joined the recipient's room.
    MemberJoined { members: Vec<String> },
    /// Someone else left the recipient's room.
    MemberLeft { members: Vec<String> },
    /// A log entry, user or system, delivered in log order.
    Message(Message),
    /// Another member's typing indicator.
    Typing { identity: String, typing: bool },
    /// The recipient's own event was refused.
    Rejected { reason: Rejection },
    /// Reply to `ClientEvent::Ping`.
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    #[test]
    fn test_text_payload_validates() {
        let body = SendPayload::text("hello").validate().unwrap();
        assert_eq!(body.text.as_deref(), Some("hello"));
        assert!(body.image.is_none());
        assert!(body.envelope.is_none());
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert_eq!(
            SendPayload::default().validate(),
            Err(Rejection::MalformedPayload)
        );
        assert_eq!(
            SendPayload::text("").validate(),
            Err(Rejection::MalformedPayload)
        );
    }

    #[test]
    fn test_image_data_url_validates() {
        let body = SendPayload::image(PIXEL).validate().unwrap();
        assert!(body.image.is_some());
    }

    #[test]
    fn test_non_image_url_rejected() {
        for bad in [
            "data:text/plain;base64,aGVsbG8=",
            "data:image/;base64,aGVsbG8=",
            "data:image/png;base64,",
            "data:image/png;base64,not!!base64",
            "https://example.com/cat.png",
        ] {
            assert_eq!(
                SendPayload::image(bad).validate(),
                Err(Rejection::MalformedPayload),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_encrypted_requires_envelope_pieces() {
        let mut payload = SendPayload::text("3b2a9c");
        payload.encrypted = true;
        assert_eq!(payload.clone().validate(), Err(Rejection::MalformedPayload));

        payload.iv = Some(vec![0u8; 12]);
        assert_eq!(payload.clone().validate(), Err(Rejection::MalformedPayload));

        payload.salt = Some(vec![1u8; 16]);
        let body = payload.validate().unwrap();
        assert!(body.envelope.is_some());
    }

    #[test]
    fn test_ciphertext_image_is_not_inspected() {
        let payload = SendPayload::encrypted(
            None,
            Some("9f8e7d6c".to_string()),
            vec![0u8; 12],
            vec![1u8; 16],
        );
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_stray_envelope_pieces_rejected() {
        let mut payload = SendPayload::text("hello");
        payload.iv = Some(vec![0u8; 12]);
        assert_eq!(payload.validate(), Err(Rejection::MalformedPayload));
    }

    #[test]
    fn test_client_event_wire_shape() {
        let event = ClientEvent::Join {
            token: "abc123".to_string(),
            identity: "alice".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"join\""));

        let back: ClientEvent = serde_json::from_str(&json).unwrap();
        match back {
            ClientEvent::Join { token, identity } => {
                assert_eq!(token, "abc123");
                assert_eq!(identity, "alice");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_send_event_flattens_payload() {
        let event = ClientEvent::Send(SendPayload::text("hi"));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"send\""));
        assert!(json.contains("\"text\":\"hi\""));
    }

    #[test]
    fn test_rejected_event_carries_stable_code() {
        let event = ServerEvent::Rejected {
            reason: Rejection::RoomFull,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"reason\":\"room_full\""));
    }
}
