//! Process-wide counters and flags shared across all threads (spec §3
//! "Counters and flags (process-wide)").

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, Ordering};

/// Watchdog state machine (spec §4.10).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Off = 0,
    Armed = 1,
    Raised = 2,
}

impl From<u8> for WatchdogState {
    fn from(v: u8) -> Self {
        match v {
            1 => WatchdogState::Armed,
            2 => WatchdogState::Raised,
            _ => WatchdogState::Off,
        }
    }
}

/// Sentinel for `finish_index` meaning "the producer has not finished yet".
pub const NO_FINISH_INDEX: i64 = -1;

pub struct Counters {
    pub blocks_read: AtomicU64,
    pub blocks_written: AtomicU64,
    pub empty_count: AtomicU64,
    pub full_count: AtomicU64,
    pub bytes_read: AtomicU64,
    /// -1 while running, otherwise the index of the producer's last block.
    pub finish_index: AtomicI64,
    /// Bytes valid in the block at `finish_index` (may be 0).
    pub rest_bytes: AtomicU64,
    pub terminate: AtomicBool,
    pub watchdog_state: AtomicU8,
    /// Set when any `error`-level event has occurred, used for the exit
    /// code policy in spec §6/§7.
    pub had_error: AtomicBool,
}

impl Counters {
    pub fn new() -> Self {
        Self {
            blocks_read: AtomicU64::new(0),
            blocks_written: AtomicU64::new(0),
            empty_count: AtomicU64::new(0),
            full_count: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            finish_index: AtomicI64::new(NO_FINISH_INDEX),
            rest_bytes: AtomicU64::new(0),
            terminate: AtomicBool::new(false),
            watchdog_state: AtomicU8::new(WatchdogState::Off as u8),
            had_error: AtomicBool::new(false),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    pub fn request_terminate(&self) {
        self.terminate.store(true, Ordering::Release);
    }

    pub fn mark_error(&self) {
        self.had_error.store(true, Ordering::Relaxed);
    }

    pub fn had_error(&self) -> bool {
        self.had_error.load(Ordering::Relaxed)
    }

    pub fn watchdog_state(&self) -> WatchdogState {
        WatchdogState::from(self.watchdog_state.load(Ordering::Acquire))
    }

    pub fn set_watchdog_state(&self, state: WatchdogState) {
        self.watchdog_state.store(state as u8, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finish_index.load(Ordering::Acquire) != NO_FINISH_INDEX
    }

    pub fn set_finish(&self, index: usize, rest_bytes: usize) {
        self.rest_bytes.store(rest_bytes as u64, Ordering::Release);
        self.finish_index.store(index as i64, Ordering::Release);
    }

    pub fn finish_index(&self) -> Option<usize> {
        let v = self.finish_index.load(Ordering::Acquire);
        if v == NO_FINISH_INDEX {
            None
        } else {
            Some(v as usize)
        }
    }

    pub fn rest_bytes(&self) -> usize {
        self.rest_bytes.load(Ordering::Acquire) as usize
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}
