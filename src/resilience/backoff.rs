//! Exponential backoff.

use std::time::Duration;

/// Calculate the delay inserted after the failed attempt `attempt` (0-based).
///
/// The delay is `base * 2^attempt`, saturating, and clamped to `max` when set.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Option<Duration>) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    let delay = base.saturating_mul(factor);
    match max {
        Some(cap) => delay.min(cap),
        None => delay,
    }
}

/// Maps a failed attempt index to the delay before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^attempt`, optionally capped.
    Exponential { base: Duration, max: Option<Duration> },
    /// Retry immediately.
    Immediate,
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Exponential { base, max } => calculate_backoff(attempt, base, max),
            Backoff::Immediate => Duration::ZERO,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            base: Duration::from_secs(1),
            max: None,
        }
    }
}
