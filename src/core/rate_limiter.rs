//! Per-thread rate limiter (spec §4.3): paces a stream of fixed-size block
//! transfers to a target bytes-per-second ceiling.

use std::thread;
use std::time::{Duration, Instant};

use crate::constants::MIN_RATE_LIMITER_SLEEP_MICROS;

/// Mutable pacing state owned by the calling thread (producer or main
/// consumer); each side keeps its own, matching spec §4.3's "accumulated
/// bytes, last checkpoint" carried by the caller.
pub struct RateLimiterState {
    accumulated: i64,
    last_checkpoint: Instant,
}

impl RateLimiterState {
    pub fn new() -> Self {
        Self { accumulated: 0, last_checkpoint: Instant::now() }
    }
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new()
    }
}

/// Token-bucket-like limiter: a zero limit means "no limit".
pub struct RateLimiter {
    limit_bytes_per_sec: u64,
}

impl RateLimiter {
    pub fn new(limit_bytes_per_sec: u64) -> Self {
        Self { limit_bytes_per_sec }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit_bytes_per_sec == 0
    }

    /// Called once per block. Adds `block_size` to the running total and
    /// sleeps for the precise deficit if the observed rate exceeds the
    /// configured limit, unless the required sleep is shorter than one
    /// clock tick, in which case the debt is carried to the next call
    /// (spec §4.3).
    pub fn enforce(&self, block_size: usize, state: &mut RateLimiterState) {
        if self.is_unlimited() {
            return;
        }
        state.accumulated += block_size as i64;
        let now = Instant::now();

        // A monotonic clock never regresses on the platforms flowbuf
        // targets, but `checked_duration_since` preserves the spec's
        // documented behavior for a wall clock that jumps backward: treat
        // the sleep as zero and reset the checkpoint (spec §9, Open
        // Question "rate limiter under clock regressions" -- preserved
        // as-is, not "fixed" with a drift buffer).
        let elapsed = match now.checked_duration_since(state.last_checkpoint) {
            Some(d) => d,
            None => {
                state.last_checkpoint = now;
                state.accumulated = 0;
                return;
            }
        };

        if elapsed.is_zero() {
            return;
        }

        let allowed_bytes = (self.limit_bytes_per_sec as f64) * elapsed.as_secs_f64();
        let overshoot = state.accumulated as f64 - allowed_bytes;
        if overshoot <= 0.0 {
            return;
        }

        let deficit_secs = overshoot / self.limit_bytes_per_sec as f64;
        let deficit = Duration::from_secs_f64(deficit_secs.max(0.0));

        if deficit < Duration::from_micros(MIN_RATE_LIMITER_SLEEP_MICROS) {
            // Too small to act on this round; let it accumulate.
            return;
        }

        thread::sleep(deficit);
        state.last_checkpoint = Instant::now();
        state.accumulated = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_never_sleeps() {
        let limiter = RateLimiter::new(0);
        let mut state = RateLimiterState::new();
        let start = Instant::now();
        for _ in 0..1000 {
            limiter.enforce(4096, &mut state);
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn limited_throttles_total_time() {
        // 1 MiB/s limit, 256 KiB of data in 64 KiB blocks: expect >= 0.25s.
        let limiter = RateLimiter::new(1024 * 1024);
        let mut state = RateLimiterState::new();
        let start = Instant::now();
        for _ in 0..4 {
            limiter.enforce(64 * 1024, &mut state);
        }
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
