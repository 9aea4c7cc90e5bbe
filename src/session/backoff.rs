//! Reconnect backoff generator: doubling delay starting at a
//! base of 1000ms, capped at 16x the base, with uniform jitter in
//! `[-500, 500]` ms applied after the cap.

use std::time::Duration;

use rand::Rng;

const BASE_MS: u64 = 1000;
const MAX_MULTIPLIER: u32 = 16;
const JITTER_MS: i64 = 500;

/// Produces successive reconnect delays, doubling each time up to a cap,
/// then holding steady (with fresh jitter) at the cap.
pub struct Backoff {
    attempt: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    #[must_use]
    pub fn new() -> Self {
        Self { attempt: 0 }
    }

    /// Reset to the initial delay, e.g. after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Compute the next delay and advance internal state.
    pub fn next_delay(&mut self) -> Duration {
        let multiplier = 1u64 << self.attempt.min(MAX_MULTIPLIER.trailing_zeros());
        self.attempt = self.attempt.saturating_add(1);
        let base = BASE_MS.saturating_mul(multiplier.min(u64::from(MAX_MULTIPLIER)));

        let jitter = rand::thread_rng().gen_range(-JITTER_MS..=JITTER_MS);
        let millis = (base as i64 + jitter).max(0) as u64;
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let mut backoff = Backoff::new();
        for expected_base in [1000u64, 2000, 4000, 8000, 16000, 16000, 16000] {
            let delay = backoff.next_delay().as_millis() as i64;
            let expected = expected_base as i64;
            assert!(
                (delay - expected).abs() <= JITTER_MS,
                "delay {delay} not within jitter of {expected}"
            );
        }
    }

    #[test]
    fn reset_returns_to_base() {
        let mut backoff = Backoff::new();
        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();
        let delay = backoff.next_delay().as_millis() as i64;
        assert!((delay - 1000).abs() <= JITTER_MS);
    }
}
