//! Per-connection send-rate limiting

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Width of the counting window.
pub const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Sliding-window counter for one connection's message sends.
///
/// Owned by the connection's handler task and touched by nothing else, so
/// it needs no synchronization. The state disappears with the task, which
/// is exactly the lifetime the limit is scoped to.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    sends: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            sends: VecDeque::with_capacity(limit),
        }
    }

    /// Record a send attempt at `now`. Returns whether the send is admitted.
    ///
    /// Only admitted sends occupy window slots, so a client that keeps
    /// hammering while limited recovers as soon as the window rolls over.
    pub fn check(&mut self, now: Instant) -> bool {
        while let Some(&oldest) = self.sends.front() {
            if now.duration_since(oldest) >= RATE_WINDOW {
                self.sends.pop_front();
            } else {
                break;
            }
        }
        if self.sends.len() < self.limit {
            self.sends.push_back(now);
            true
        } else {
            false
        }
    }
}
