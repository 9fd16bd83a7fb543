//! Fixed-delay, bounded-attempt backoff policy for the pool feed.

use backoff::backoff::Backoff;
use std::time::Duration;

/// Retries a fixed number of times with a constant delay between attempts.
///
/// `max_attempts` counts the first call, so `max_attempts = 3` allows two retries.
#[derive(Debug, Clone)]
pub struct FixedAttempts {
    delay: Duration,
    max_attempts: u32,
    retries: u32,
}

impl FixedAttempts {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: max_attempts.max(1),
            retries: 0,
        }
    }
}

impl Backoff for FixedAttempts {
    fn reset(&mut self) {
        self.retries = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries + 1 >= self.max_attempts {
            return None;
        }
        self.retries += 1;
        Some(self.delay)
    }
}
