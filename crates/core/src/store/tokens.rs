//! Token registry: issuance, validation, and the expiry sweep

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Rejection;
use crate::models::Token;

/// All live invitation tokens, keyed by token id.
///
/// The registry is the synchronization point for the join race: `with_live`
/// holds the token's exclusive entry lock for the whole closure, and the
/// sweep removes entries under that same lock. Two joins on one token, or a
/// join and a sweep, therefore serialize instead of both observing a
/// not-yet-consumed token.
pub struct TokenRegistry {
    ttl: Duration,
    tokens: DashMap<String, Token>,
}

impl TokenRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token owned by `owner_identity`.
    pub fn issue(&self, owner_identity: &str, now: DateTime<Utc>) -> Token {
        let token = Token::issue(owner_identity.to_string(), now);
        self.tokens.insert(token.id.clone(), token.clone());
        info!(token = %token.id, owner = %token.owner_identity, "Issued invitation token");
        token
    }

    /// Read-only validity check, suitable for a landing page. Callers that
    /// are about to join must not rely on it; `with_live` re-checks under
    /// the entry lock.
    pub fn validate(&self, token_id: &str, now: DateTime<Utc>) -> bool {
        self.tokens
            .get(token_id)
            .map(|t| t.is_valid(self.ttl, now))
            .unwrap_or(false)
    }

    /// Run `f` with exclusive access to the token, provided it exists and
    /// is inside its time-to-live at `now`. The entry lock spans the check
    /// and the closure, so everything `f` does is atomic with respect to
    /// other joins on this token and to the sweep. Consumption is the
    /// caller's concern: a consumed token still resolves here, and the
    /// caller picks the refusal it reports.
    pub fn with_live<R>(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Token) -> R,
    ) -> Result<R, Rejection> {
        match self.tokens.get_mut(token_id) {
            Some(mut entry) if !entry.value().is_expired(self.ttl, now) => {
                Ok(f(entry.value_mut()))
            }
            _ => Err(Rejection::InvalidOrExpiredToken),
        }
    }

    /// Remove every token past its time-to-live, consumed or not. Returns
    /// the removed `(token_id, room_id)` pairs so the caller can reap rooms
    /// that are now unreachable.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<(String, Option<Uuid>)> {
        let expired: Vec<String> = self
            .tokens
            .iter()
            .filter(|entry| entry.value().is_expired(self.ttl, now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            // remove_if re-checks under the entry lock; a join holding the
            // token finishes before the removal proceeds.
            if let Some((id, token)) = self
                .tokens
                .remove_if(&id, |_, token| token.is_expired(self.ttl, now))
            {
                debug!(token = %id, "Swept expired token");
                removed.push((id, token.room_id));
            }
        }
        removed
    }

    /// Owned copy of a token, for introspection.
    pub fn get(&self, token_id: &str) -> Option<Token> {
        self.tokens.get(token_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
