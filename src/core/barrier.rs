//! Fan-out barrier (spec §4.5): publishes one (pointer, size) pair per ring
//! block to every auxiliary consumer and advances only once all of them
//! have observed it.
//!
//! The original C implementation (`examples/original_source/mbuffer.c:341-378`,
//! `syncSenders`) folds the main consumer into the same rendezvous counter
//! that the auxiliary "sender" threads use, and blocks the calling thread --
//! including the output thread -- until every participant has arrived
//! before the round can advance. This spec instead has the main consumer
//! publish and leaves the exact arithmetic of the `active`/`num` reset an
//! implementation detail. We resolve that Open Question with a generation
//! counter: the main consumer bumps the generation; each auxiliary consumer
//! waits for a new generation, then decrements a per-round arrival counter;
//! the last arrival returns the block to the ring's free pool and wakes the
//! main consumer. Mirroring `syncSenders`'s blocking behavior, the main
//! consumer's publish call itself blocks until the *previous* round's
//! arrival counter has reached zero before overwriting `ptr`/`size` with the
//! next round -- otherwise a slow auxiliary could have its round silently
//! replaced before it observed it, skipping a block and leaking the ring
//! slot that round would have freed. This preserves the externally
//! observable contract (every auxiliary sees every block exactly once, in
//! order, before the slot is freed) without depending on the original's
//! `num + 1` bookkeeping, which only makes sense if the main consumer is
//! itself one of the rendezvousing senders -- true in the C source, not in
//! this spec.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::core::ring::Ring;

struct BarrierState {
    ptr: *const u8,
    size: isize,
    generation: u64,
    /// Auxiliary consumers still expected to arrive for the current
    /// generation.
    pending: usize,
    /// Number of auxiliary consumers still registered.
    num: usize,
}

// SAFETY: `ptr` only ever points into the `Ring`'s arena, which outlives
// every thread holding a reference to this barrier.
unsafe impl Send for BarrierState {}

/// Sentinel published during teardown: "no more blocks are coming".
pub const DONE_SIZE: isize = 0;
/// Sentinel published by leaving auxiliaries to force everyone else to
/// re-check `terminate` instead of waiting on a generation that will never
/// come.
pub const FORCED_QUIESCENCE_SIZE: isize = -1;

pub struct FanoutBarrier {
    state: Mutex<BarrierState>,
    cond: Condvar,
}

impl FanoutBarrier {
    pub fn new(num_aux: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState {
                ptr: std::ptr::null(),
                size: 0,
                generation: 0,
                pending: num_aux,
                num: num_aux,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn num_registered(&self) -> usize {
        self.state.lock().num
    }

    /// Main consumer: publish `(ptr, size)` for this block. Blocks until
    /// every auxiliary consumer has arrived for the *previous* round before
    /// overwriting it (see the module doc comment). Returns `false` without
    /// publishing if `terminate` fires while waiting, in which case the
    /// caller should stop rather than assume the block was handed off.
    pub fn publish(&self, ptr: *const u8, size: usize, terminate: &AtomicBool) -> bool {
        self.publish_raw(ptr, size as isize, terminate)
    }

    /// Publish the "producer is done" sentinel; every auxiliary consumer
    /// observing it exits cleanly.
    pub fn publish_done(&self, terminate: &AtomicBool) -> bool {
        self.publish_raw(std::ptr::null(), DONE_SIZE, terminate)
    }

    fn publish_raw(&self, ptr: *const u8, size: isize, terminate: &AtomicBool) -> bool {
        let mut state = self.state.lock();
        while state.pending > 0 {
            if terminate.load(Ordering::Acquire) {
                return false;
            }
            self.cond.wait_for(&mut state, std::time::Duration::from_millis(100));
        }
        state.ptr = ptr;
        state.size = size;
        state.generation += 1;
        state.pending = state.num;
        drop(state);
        self.cond.notify_all();
        true
    }

    /// Auxiliary consumer: wait for the next published block and return its
    /// `(ptr, size, is_last_arrival)`. `is_last_arrival` tells the caller it
    /// observed the final outstanding arrival for this generation, and is
    /// therefore responsible for returning the ring slot to the free pool
    /// (spec §4.5: "each pair is observed before the ring slot is returned
    /// to the free pool"). Returns `None` if `terminate` fires before a new
    /// generation is published.
    pub fn wait_next(
        &self,
        _ring: &Ring,
        last_seen: &mut u64,
        terminate: &AtomicBool,
    ) -> Option<(*const u8, isize, bool)> {
        let mut state = self.state.lock();
        loop {
            if state.generation != *last_seen {
                break;
            }
            if terminate.load(Ordering::Acquire) {
                return None;
            }
            self.cond.wait_for(&mut state, std::time::Duration::from_millis(100));
        }
        *last_seen = state.generation;
        let pair = (state.ptr, state.size);
        if state.pending > 0 {
            state.pending -= 1;
        }
        let is_last_arrival = state.pending == 0;
        drop(state);
        if is_last_arrival {
            // Wake a main consumer blocked in `publish_raw` waiting for
            // this round to drain before it can start the next one.
            self.cond.notify_all();
        }
        Some((pair.0, pair.1, is_last_arrival))
    }

    /// Auxiliary consumer leaving early due to an unrecoverable error:
    /// deregister so future rounds don't wait for it.
    pub fn deregister(&self) {
        let mut state = self.state.lock();
        if state.num > 0 {
            state.num -= 1;
        }
        if state.pending > state.num {
            state.pending = state.num;
        }
        let last_arrival = state.pending == 0;
        drop(state);
        if last_arrival {
            self.cond.notify_all();
        }
    }

    /// Wake every waiter unconditionally, used on shutdown.
    pub fn wake_all(&self) {
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Barrier as StdBarrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn all_auxiliaries_see_same_sequence() {
        let barrier = Arc::new(FanoutBarrier::new(3));
        let ring = Arc::new(Ring::new_heap(8, 5).unwrap());
        let terminate = Arc::new(AtomicBool::new(false));
        let start = Arc::new(StdBarrier::new(4));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let barrier = barrier.clone();
            let ring = ring.clone();
            let terminate = terminate.clone();
            let start = start.clone();
            handles.push(thread::spawn(move || {
                start.wait();
                let mut last_seen = 0u64;
                let mut seen = Vec::new();
                loop {
                    match barrier.wait_next(&ring, &mut last_seen, &terminate) {
                        Some((_ptr, size, _last)) if size > 0 => seen.push(size),
                        _ => break,
                    }
                }
                seen
            }));
        }

        start.wait();
        for i in 1..=5isize {
            assert!(barrier.publish(std::ptr::null(), i as usize, &terminate));
        }
        assert!(barrier.publish_done(&terminate));

        for h in handles {
            let seen = h.join().unwrap();
            assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        }
    }

    /// A single slow auxiliary must still observe every generation: the
    /// main consumer's `publish` has to block on the previous round's
    /// arrival rather than racing ahead and silently replacing it.
    #[test]
    fn publish_blocks_until_previous_round_is_drained() {
        let barrier = Arc::new(FanoutBarrier::new(1));
        let ring = Arc::new(Ring::new_heap(8, 5).unwrap());
        let terminate = Arc::new(AtomicBool::new(false));

        let aux_barrier = barrier.clone();
        let aux_ring = ring.clone();
        let aux_terminate = terminate.clone();
        let handle = thread::spawn(move || {
            let mut last_seen = 0u64;
            let mut seen = Vec::new();
            loop {
                thread::sleep(Duration::from_millis(20));
                match aux_barrier.wait_next(&aux_ring, &mut last_seen, &aux_terminate) {
                    Some((_ptr, size, _last)) if size > 0 => seen.push(size),
                    _ => break,
                }
            }
            seen
        });

        for i in 1..=5isize {
            assert!(barrier.publish(std::ptr::null(), i as usize, &terminate));
        }
        assert!(barrier.publish_done(&terminate));

        assert_eq!(handle.join().unwrap(), vec![1, 2, 3, 4, 5]);
    }
}
