//! TCP server hosting the coordination engine
//!
//! One reader loop and one writer task per accepted connection. The reader
//! decodes frames and hands events to the coordinator synchronously; the
//! writer drains the connection's outbound queue. A periodic task sweeps
//! expired invitation tokens.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use chrono::Utc;
use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use alcove_core::{
    ClientEvent, ConnectionId, ConnectionRegistry, Coordinator, EventReceiver, EventSender,
    RateLimiter, Rejection, RoomStore, ServerConfig, ServerEvent, Token, TokenRegistry,
};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::invite::InviteUrl;

/// Server handle
pub struct Server {
    addr: SocketAddr,
    config: ServerConfig,
    coordinator: Arc<Coordinator>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the listener and start serving
    pub async fn start(config: ServerConfig) -> Result<Self> {
        let ip: IpAddr = config.bind_addr.parse().map_err(|_| {
            Error::Protocol(format!("Invalid bind address '{}'", config.bind_addr))
        })?;
        let listener = TcpListener::bind(SocketAddr::new(ip, config.port)).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let coordinator = Arc::new(Coordinator::new(
            TokenRegistry::new(config.token_ttl()),
            RoomStore::new(),
            ConnectionRegistry::new(),
        ));

        let (shutdown_tx, _) = broadcast::channel(1);

        // Spawn accept loop
        tokio::spawn(accept_loop(
            listener,
            coordinator.clone(),
            config.send_rate_limit,
            shutdown_tx.subscribe(),
        ));

        // Spawn token sweeper
        tokio::spawn(sweep_task(
            coordinator.clone(),
            config.sweep_interval(),
            shutdown_tx.subscribe(),
        ));

        Ok(Server {
            addr: bound_addr,
            config,
            coordinator,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The engine behind this server, for embedders and tests
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Issue an invitation token and the shareable link for it
    ///
    /// Meant to back whatever issuing surface the embedding application
    /// exposes (an HTTP endpoint, a CLI); request limiting on issuance
    /// belongs to that surface, not the engine.
    pub fn issue_invite(&self, owner_identity: &str) -> Result<(Token, InviteUrl)> {
        let token = self.coordinator.issue(owner_identity)?;
        let invite = InviteUrl::from_addr(self.addr, token.id.clone());
        Ok((token, invite))
    }

    /// Advisory token check for a landing page
    pub fn peek_token(&self, token_id: &str) -> bool {
        self.coordinator.peek(token_id)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
    rate_limit: usize,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let coordinator = coordinator.clone();
                        tokio::spawn(handle_connection(stream, addr, coordinator, rate_limit));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    coordinator: Arc<Coordinator>,
    rate_limit: usize,
) {
    let connection_id = ConnectionId::new();
    let (mut reader, writer) = tokio::io::split(stream);

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let writer_handle = tokio::spawn(writer_task(writer, rx));

    info!(addr = %addr, connection = %connection_id, "Connection open");

    // Lazily created on the first send
    let mut limiter: Option<RateLimiter> = None;

    // Read loop: one event at a time, so a connection's events apply in the
    // order it sent them.
    loop {
        match read_frame::<_, ClientEvent>(&mut reader).await {
            Ok(event) => {
                handle_event(
                    event,
                    connection_id,
                    &tx,
                    &coordinator,
                    &mut limiter,
                    rate_limit,
                );
            }
            Err(Error::Json(e)) => {
                debug!(connection = %connection_id, error = %e, "Undecodable event");
                let _ = tx.send(ServerEvent::Rejected {
                    reason: Rejection::MalformedPayload,
                });
            }
            Err(Error::ConnectionClosed) => {
                debug!(connection = %connection_id, "Connection closed");
                break;
            }
            Err(e) => {
                warn!(connection = %connection_id, error = %e, "Read error");
                break;
            }
        }
    }

    // Cleanup
    writer_handle.abort();
    coordinator.disconnect(connection_id);

    info!(connection = %connection_id, "Connection gone");
}

/// Apply one decoded event. Rejections go back to the sender; everything
/// else has already been fanned out by the coordinator.
fn handle_event(
    event: ClientEvent,
    connection_id: ConnectionId,
    tx: &EventSender,
    coordinator: &Coordinator,
    limiter: &mut Option<RateLimiter>,
    rate_limit: usize,
) {
    let outcome = match event {
        ClientEvent::Join { token, identity } => {
            coordinator.join(connection_id, tx.clone(), &token, &identity)
        }
        ClientEvent::Send(payload) => {
            let limiter = limiter.get_or_insert_with(|| RateLimiter::new(rate_limit));
            coordinator.message(connection_id, payload, limiter)
        }
        ClientEvent::Typing { typing } => coordinator.typing(connection_id, typing),
        ClientEvent::Ping => {
            let _ = tx.send(ServerEvent::Pong);
            Ok(())
        }
    };

    if let Err(reason) = outcome {
        debug!(connection = %connection_id, reason = %reason, "Event rejected");
        let _ = tx.send(ServerEvent::Rejected { reason });
    }
}

/// Writer task - drains the connection's outbound queue
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &event).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Periodic token sweep
async fn sweep_task(
    coordinator: Arc<Coordinator>,
    interval: std::time::Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                coordinator.sweep(Utc::now());
            }
            _ = shutdown_rx.recv() => {
                debug!("Sweep task shutting down");
                break;
            }
        }
    }
}
