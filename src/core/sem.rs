//! A counting semaphore built on `parking_lot::Mutex`/`Condvar`.
//!
//! The teacher crate's `BlockingWaitStrategy` reaches for the same pair of
//! primitives to park a consumer until new data is published; we use them
//! here for the ring's two counting resources (spec §4.1) instead of
//! `std::sync::Condvar` so a panic on one thread cannot poison the mutex and
//! take every other thread down with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A blocking counting semaphore whose waits can be interrupted by a shared
/// `terminate` flag, matching the cooperative-cancellation discipline of
/// spec §5 ("Cancellation").
pub struct CountingSemaphore {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl CountingSemaphore {
    /// Create a semaphore with `initial` permits available.
    pub fn new(initial: usize) -> Self {
        Self { count: Mutex::new(initial), condvar: Condvar::new() }
    }

    /// Acquire one permit, blocking until one is available or `terminate`
    /// becomes true. Returns `false` if it gave up because of termination.
    pub fn acquire_interruptible(&self, terminate: &AtomicBool) -> bool {
        let mut count = self.count.lock();
        loop {
            if *count > 0 {
                *count -= 1;
                return true;
            }
            if terminate.load(Ordering::Acquire) {
                return false;
            }
            self.condvar.wait_for(&mut count, Duration::from_millis(100));
        }
    }

    /// Release one permit and wake a single waiter.
    pub fn release(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.condvar.notify_one();
    }

    /// Current number of available permits.
    pub fn available(&self) -> usize {
        *self.count.lock()
    }

    /// Wake every waiter without changing the permit count; used during
    /// shutdown to let blocked threads observe `terminate`.
    pub fn wake_all(&self) {
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_blocks_until_release() {
        let sem = Arc::new(CountingSemaphore::new(0));
        let terminate = Arc::new(AtomicBool::new(false));
        let sem2 = sem.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            sem2.release();
        });
        let terminate2 = terminate.clone();
        assert!(sem.acquire_interruptible(&terminate2));
        handle.join().unwrap();
    }

    #[test]
    fn acquire_interrupted_by_terminate() {
        let sem = Arc::new(CountingSemaphore::new(0));
        let terminate = Arc::new(AtomicBool::new(false));
        let t2 = terminate.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            t2.store(true, Ordering::Release);
        });
        assert!(!sem.acquire_interruptible(&terminate));
        handle.join().unwrap();
    }
}
