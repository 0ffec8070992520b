//! Invite URL generation and parsing
//!
//! Invite format: alcove://<host>:<port>/<token>

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Parsed invite link
///
/// The token inside the link is the whole capability: whoever holds it can
/// take the room's remaining seat until the token expires or is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteUrl {
    pub host: IpAddr,
    pub port: u16,
    pub token: String,
}

impl InviteUrl {
    /// Create a new invite URL
    pub fn new(host: IpAddr, port: u16, token: String) -> Self {
        Self { host, port, token }
    }

    /// Create from a socket address
    pub fn from_addr(addr: SocketAddr, token: String) -> Self {
        Self {
            host: addr.ip(),
            port: addr.port(),
            token,
        }
    }

    /// Get the socket address for connection
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Format as URL string
    pub fn to_url(&self) -> String {
        match self.host {
            IpAddr::V4(_) => format!("alcove://{}:{}/{}", self.host, self.port, self.token),
            IpAddr::V6(v6) => format!("alcove://[{}]:{}/{}", v6, self.port, self.token),
        }
    }

    /// Parse from URL string
    pub fn parse(s: &str) -> Result<Self> {
        // Strip protocol prefix
        let s = s.strip_prefix("alcove://").ok_or_else(|| {
            Error::Protocol("Invalid invite URL: missing alcove:// prefix".into())
        })?;

        // Split into parts: host:port/token
        let (host_port, token) = s.split_once('/').ok_or_else(|| {
            Error::Protocol("Invalid invite URL: expected host:port/token".into())
        })?;

        let addr: SocketAddr = host_port.parse().map_err(|_| {
            Error::Protocol(format!("Invalid invite URL: bad address '{}'", host_port))
        })?;

        if token.is_empty() {
            return Err(Error::Protocol("Invalid invite URL: empty token".into()));
        }

        Ok(Self {
            host: addr.ip(),
            port: addr.port(),
            token: token.to_string(),
        })
    }
}

impl std::fmt::Display for InviteUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_url())
    }
}

impl FromStr for InviteUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
