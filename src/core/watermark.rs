//! Low/high watermark gate (spec §4.2): batches wakeups between the
//! producer and the main consumer so neither thrashes on every single
//! block when the peer is far from keeping pace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::core::ring::Ring;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct WatermarkGate {
    /// Low watermark in (0,1]: producer resumes filling once the ring's
    /// fill ratio drops below this.
    start_read: f64,
    /// High watermark in [0,1): main consumer resumes draining once the
    /// ring's fill ratio reaches this (or the producer is done).
    start_write: f64,
    low_mutex: Mutex<()>,
    low_cond: Condvar,
    high_mutex: Mutex<()>,
    high_cond: Condvar,
}

impl WatermarkGate {
    pub fn new(start_read: f64, start_write: f64) -> Self {
        Self {
            start_read,
            start_write,
            low_mutex: Mutex::new(()),
            low_cond: Condvar::new(),
            high_mutex: Mutex::new(()),
            high_cond: Condvar::new(),
        }
    }

    fn fill_ratio(&self, ring: &Ring) -> f64 {
        ring.filled_count() as f64 / ring.num_blocks() as f64
    }

    /// Producer side: block while the ring is too full to accept more
    /// (`filled == N-1`, the point at which the next fill would make the
    /// ring appear completely full to a racing consumer).
    pub fn wait_for_room(&self, ring: &Ring, terminate: &AtomicBool) {
        loop {
            if terminate.load(Ordering::Acquire) {
                return;
            }
            if ring.filled_count() < ring.num_blocks() - 1 {
                return;
            }
            let mut guard = self.low_mutex.lock();
            if ring.filled_count() < ring.num_blocks() - 1 || terminate.load(Ordering::Acquire) {
                return;
            }
            self.low_cond.wait_for(&mut guard, POLL_INTERVAL);
        }
    }

    /// Main consumer side: block at startup, and whenever the ring is
    /// empty, until the fill ratio reaches `start_write` or the producer
    /// has signaled completion (`producer_done`).
    pub fn wait_for_data(&self, ring: &Ring, terminate: &AtomicBool, producer_done: &dyn Fn() -> bool) {
        loop {
            if terminate.load(Ordering::Acquire) || producer_done() {
                return;
            }
            if self.fill_ratio(ring) >= self.start_write {
                return;
            }
            let mut guard = self.high_mutex.lock();
            if self.fill_ratio(ring) >= self.start_write
                || producer_done()
                || terminate.load(Ordering::Acquire)
            {
                return;
            }
            self.high_cond.wait_for(&mut guard, POLL_INTERVAL);
        }
    }

    /// Called after a consumer drains a block: wake the producer if the
    /// fill ratio has now dropped below `start_read` (spec §4.6 step 11).
    pub fn maybe_signal_low(&self, ring: &Ring) {
        if self.fill_ratio(ring) < self.start_read {
            self.low_cond.notify_all();
        }
    }

    /// Called after the producer fills a block: wake the main consumer if
    /// the fill ratio has reached `start_write`.
    pub fn maybe_signal_high(&self, ring: &Ring) {
        if self.fill_ratio(ring) >= self.start_write {
            self.high_cond.notify_all();
        }
    }

    /// Wake every waiter unconditionally, used on shutdown.
    pub fn wake_all(&self) {
        self.low_cond.notify_all();
        self.high_cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_ratio_gating() {
        let ring = Ring::new_heap(8, 10).unwrap();
        let gate = WatermarkGate::new(0.2, 0.8);
        let terminate = AtomicBool::new(false);
        // Empty ring: high watermark not reached, producer_done false -> would block,
        // but we use producer_done=true to make the call return immediately.
        gate.wait_for_data(&ring, &terminate, &|| true);
        assert_eq!(gate.fill_ratio(&ring), 0.0);
    }
}
