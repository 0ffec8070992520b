//! TCP client for the alcove protocol
//!
//! A thin library handle used by embedding applications and the end-to-end
//! tests. Events stream out of [`Client::next_event`] in exactly the order
//! the server emitted them for this connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use alcove_core::{ClientEvent, SendPayload, ServerEvent};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::invite::InviteUrl;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Client handle for one connection to an alcove server
pub struct Client {
    state: Arc<RwLock<ClientState>>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
    cmd_tx: mpsc::UnboundedSender<ClientCommand>,
}

struct ClientState {
    connection: ConnectionState,
    room_id: Option<Uuid>,
    identity: Option<String>,
    members: Vec<String>,
}

enum ClientCommand {
    Send(ClientEvent),
    Disconnect,
}

impl Client {
    /// Connect to a server. Joining a room is a separate step; see
    /// [`Client::join`].
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to server");

        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(stream);

        let state = Arc::new(RwLock::new(ClientState {
            connection: ConnectionState::Connected,
            room_id: None,
            identity: None,
            members: Vec::new(),
        }));

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        // Spawn connection handler
        tokio::spawn(connection_task(
            reader,
            writer,
            state.clone(),
            event_tx,
            cmd_rx,
        ));

        Ok(Client {
            state,
            event_rx,
            cmd_tx,
        })
    }

    /// Connect to the server an invite link points at
    pub async fn connect_invite(invite: &InviteUrl) -> Result<Self> {
        Self::connect(invite.socket_addr()).await
    }

    /// Redeem an invitation token under a display name. The outcome arrives
    /// as a `Joined` or `Rejected` event.
    pub fn join(&self, token: &str, identity: &str) -> Result<()> {
        self.send_event(ClientEvent::Join {
            token: token.to_string(),
            identity: identity.to_string(),
        })
    }

    /// Send a message payload
    pub fn send(&self, payload: SendPayload) -> Result<()> {
        self.send_event(ClientEvent::Send(payload))
    }

    /// Send a plain text message
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(SendPayload::text(text))
    }

    /// Send an inline image as a `data:image/...;base64,` URL
    pub fn send_image(&self, data_url: impl Into<String>) -> Result<()> {
        self.send(SendPayload::image(data_url))
    }

    /// Send an opaque encrypted payload; iv and salt travel with it verbatim
    pub fn send_encrypted(
        &self,
        text: Option<String>,
        image: Option<String>,
        iv: Vec<u8>,
        salt: Vec<u8>,
    ) -> Result<()> {
        self.send(SendPayload::encrypted(text, image, iv, salt))
    }

    /// Send a typing indicator
    pub fn typing(&self, typing: bool) -> Result<()> {
        self.send_event(ClientEvent::Typing { typing })
    }

    /// Send a keepalive ping
    pub fn ping(&self) -> Result<()> {
        self.send_event(ClientEvent::Ping)
    }

    fn send_event(&self, event: ClientEvent) -> Result<()> {
        self.cmd_tx
            .send(ClientCommand::Send(event))
            .map_err(|_| Error::NotConnected)
    }

    /// Get the next server event; `None` once the connection is gone
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.event_rx.recv().await
    }

    /// Disconnect from the server
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect);
    }

    /// Get current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    /// Room joined on this connection, if any
    pub async fn room_id(&self) -> Option<Uuid> {
        self.state.read().await.room_id
    }

    /// Identity this connection joined under, as the server sanitized it
    pub async fn identity(&self) -> Option<String> {
        self.state.read().await.identity.clone()
    }

    /// Get current member list
    pub async fn members(&self) -> Vec<String> {
        self.state.read().await.members.clone()
    }
}

/// Main connection task
async fn connection_task(
    mut reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    state: Arc<RwLock<ClientState>>,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientCommand>,
) {
    loop {
        tokio::select! {
            // Incoming event from server
            result = read_frame::<_, ServerEvent>(&mut reader) => {
                match result {
                    Ok(event) => {
                        track_event(&event, &state).await;
                        if event_tx.send(event).is_err() {
                            debug!("Client handle dropped");
                            break;
                        }
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!("Server closed connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Read error");
                        break;
                    }
                }
            }

            // Outgoing command
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(event)) => {
                        if let Err(e) = write_frame(&mut writer, &event).await {
                            warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Some(ClientCommand::Disconnect) | None => {
                        debug!("Disconnect requested");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup
    {
        let mut s = state.write().await;
        s.connection = ConnectionState::Disconnected;
    }
    info!("Disconnected from server");
}

/// Mirror room membership into the client state before forwarding
async fn track_event(event: &ServerEvent, state: &Arc<RwLock<ClientState>>) {
    match event {
        ServerEvent::Joined {
            room_id,
            identity,
            members,
            ..
        } => {
            let mut s = state.write().await;
            s.room_id = Some(*room_id);
            s.identity = Some(identity.clone());
            s.members = members.clone();
        }
        ServerEvent::MemberJoined { members } | ServerEvent::MemberLeft { members } => {
            state.write().await.members = members.clone();
        }
        ServerEvent::Pong => {
            debug!("Received pong");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Server;
    use alcove_core::{Rejection, ServerConfig};

    async fn start_server() -> Server {
        let config = ServerConfig {
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        Server::start(config).await.unwrap()
    }

    async fn expect_joined(client: &mut Client) -> Vec<String> {
        match client.next_event().await {
            Some(ServerEvent::Joined { members, .. }) => members,
            other => panic!("expected Joined, got {other:?}"),
        }
    }

    async fn expect_message_text(client: &mut Client) -> String {
        match client.next_event().await {
            Some(ServerEvent::Message(m)) => m.text.expect("message without text"),
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_join_over_invite_link() {
        let server = start_server().await;
        let (_token, invite) = server.issue_invite("alice").unwrap();

        let mut alice = Client::connect_invite(&invite).await.unwrap();
        alice.join(&invite.token, "alice").unwrap();

        assert_eq!(expect_joined(&mut alice).await, vec!["alice".to_string()]);
        assert_eq!(expect_message_text(&mut alice).await, "alice joined the chat");
        assert_eq!(alice.members().await, vec!["alice".to_string()]);
        assert_eq!(alice.identity().await.as_deref(), Some("alice"));
        assert!(alice.room_id().await.is_some());

        server.shutdown();
    }

    #[tokio::test]
    async fn test_two_party_conversation() {
        let server = start_server().await;
        let (token, invite) = server.issue_invite("alice").unwrap();

        let mut alice = Client::connect_invite(&invite).await.unwrap();
        alice.join(&token.id, "alice").unwrap();
        expect_joined(&mut alice).await;
        expect_message_text(&mut alice).await; // own join notice

        let mut bob = Client::connect(server.addr()).await.unwrap();
        bob.join(&token.id, "bob").unwrap();
        let members = expect_joined(&mut bob).await;
        assert_eq!(members, vec!["alice".to_string(), "bob".to_string()]);
        expect_message_text(&mut bob).await; // bob's join notice

        // Alice sees Bob arrive, then the same notice
        match alice.next_event().await {
            Some(ServerEvent::MemberJoined { members }) => assert_eq!(members.len(), 2),
            other => panic!("expected MemberJoined, got {other:?}"),
        }
        assert_eq!(expect_message_text(&mut alice).await, "bob joined the chat");

        // A message reaches both, sender included
        alice.send_text("hello bob").unwrap();
        assert_eq!(expect_message_text(&mut bob).await, "hello bob");
        assert_eq!(expect_message_text(&mut alice).await, "hello bob");

        // Typing reaches only the other member
        bob.typing(true).unwrap();
        match alice.next_event().await {
            Some(ServerEvent::Typing { identity, typing }) => {
                assert_eq!(identity, "bob");
                assert!(typing);
            }
            other => panic!("expected Typing, got {other:?}"),
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_encrypted_and_image_payloads_relay() {
        const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

        let server = start_server().await;
        let (token, _invite) = server.issue_invite("alice").unwrap();

        let mut alice = Client::connect(server.addr()).await.unwrap();
        alice.join(&token.id, "alice").unwrap();
        expect_joined(&mut alice).await;
        expect_message_text(&mut alice).await;

        let mut bob = Client::connect(server.addr()).await.unwrap();
        bob.join(&token.id, "bob").unwrap();
        expect_joined(&mut bob).await;
        expect_message_text(&mut bob).await;
        alice.next_event().await; // MemberJoined
        expect_message_text(&mut alice).await;

        // Ciphertext and its envelope pass through the server untouched
        let iv = vec![7u8; 12];
        let salt = vec![9u8; 16];
        alice
            .send_encrypted(Some("6b3f9a".to_string()), None, iv.clone(), salt.clone())
            .unwrap();
        match bob.next_event().await {
            Some(ServerEvent::Message(m)) => {
                assert!(m.is_encrypted());
                assert_eq!(m.text.as_deref(), Some("6b3f9a"));
                let env = m.envelope.expect("encrypted message without envelope");
                assert_eq!(env.iv, iv);
                assert_eq!(env.salt, salt);
            }
            other => panic!("expected Message, got {other:?}"),
        }
        alice.next_event().await; // own echo

        bob.send_image(PIXEL).unwrap();
        match alice.next_event().await {
            Some(ServerEvent::Message(m)) => {
                assert_eq!(m.image.as_deref(), Some(PIXEL));
                assert!(!m.is_encrypted());
            }
            other => panic!("expected Message, got {other:?}"),
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_rejection_reaches_client() {
        let server = start_server().await;

        let mut client = Client::connect(server.addr()).await.unwrap();
        client.join("00000000000000000000000000000000", "alice").unwrap();

        match client.next_event().await {
            Some(ServerEvent::Rejected { reason }) => {
                assert_eq!(reason, Rejection::InvalidOrExpiredToken);
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        // the connection survives the rejection
        client.ping().unwrap();
        assert!(matches!(client.next_event().await, Some(ServerEvent::Pong)));

        server.shutdown();
    }

    #[tokio::test]
    async fn test_third_client_finds_room_full() {
        let server = start_server().await;
        let (token, _invite) = server.issue_invite("alice").unwrap();

        let mut alice = Client::connect(server.addr()).await.unwrap();
        alice.join(&token.id, "alice").unwrap();
        expect_joined(&mut alice).await;

        let mut bob = Client::connect(server.addr()).await.unwrap();
        bob.join(&token.id, "bob").unwrap();
        expect_joined(&mut bob).await;

        let mut carol = Client::connect(server.addr()).await.unwrap();
        carol.join(&token.id, "carol").unwrap();
        match carol.next_event().await {
            Some(ServerEvent::Rejected { reason }) => {
                assert_eq!(reason, Rejection::RoomFull);
            }
            other => panic!("expected Rejected, got {other:?}"),
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_disconnect_notifies_peer() {
        let server = start_server().await;
        let (token, _invite) = server.issue_invite("alice").unwrap();

        let mut alice = Client::connect(server.addr()).await.unwrap();
        alice.join(&token.id, "alice").unwrap();
        expect_joined(&mut alice).await;
        expect_message_text(&mut alice).await;

        let mut bob = Client::connect(server.addr()).await.unwrap();
        bob.join(&token.id, "bob").unwrap();
        expect_joined(&mut bob).await;
        expect_message_text(&mut bob).await;
        let _ = alice.next_event().await; // MemberJoined
        expect_message_text(&mut alice).await;

        bob.disconnect();

        match alice.next_event().await {
            Some(ServerEvent::MemberLeft { members }) => {
                assert_eq!(members, vec!["alice".to_string()]);
            }
            other => panic!("expected MemberLeft, got {other:?}"),
        }
        assert_eq!(expect_message_text(&mut alice).await, "bob left the chat");
        assert_eq!(alice.members().await, vec!["alice".to_string()]);

        server.shutdown();
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let server = start_server().await;
        let mut client = Client::connect(server.addr()).await.unwrap();

        client.ping().unwrap();
        assert!(matches!(client.next_event().await, Some(ServerEvent::Pong)));
        assert_eq!(client.connection_state().await, ConnectionState::Connected);

        server.shutdown();
    }
}
