//! Stall watchdog (spec §4.10): samples `blocks_read`/`blocks_written` at
//! `timeout`-second intervals and escalates SIGINT, then SIGKILL, on
//! sustained lack of progress.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{error, warn};

use crate::core::counters::WatchdogState;
use crate::core::Core;

pub fn run_watchdog(core: Arc<Core>, timeout: Duration) {
    core.counters.set_watchdog_state(WatchdogState::Armed);

    let mut last_read = core.counters.blocks_read.load(Ordering::Relaxed);
    let mut last_written = core.counters.blocks_written.load(Ordering::Relaxed);
    let pid = Pid::from_raw(std::process::id() as i32);

    loop {
        thread::sleep(timeout);
        if core.counters.is_terminated() {
            return;
        }

        let read = core.counters.blocks_read.load(Ordering::Relaxed);
        let written = core.counters.blocks_written.load(Ordering::Relaxed);
        // The producer having finished disables the "input stalled" branch;
        // draining is allowed to take as long as it needs (spec §4.10).
        let input_stalled = !core.counters.is_finished() && read == last_read;
        let output_stalled = written == last_written;
        let stalled = input_stalled && output_stalled;

        last_read = read;
        last_written = written;

        if !stalled {
            core.counters.set_watchdog_state(WatchdogState::Armed);
            continue;
        }

        match core.counters.watchdog_state() {
            WatchdogState::Armed => {
                warn!("no progress for {:?}, sending SIGINT", timeout);
                core.counters.set_watchdog_state(WatchdogState::Raised);
                core.counters.mark_error();
                let _ = signal::kill(pid, Signal::SIGINT);
            }
            WatchdogState::Raised => {
                error!("still no progress after SIGINT, sending SIGKILL");
                let _ = signal::kill(pid, Signal::SIGKILL);
            }
            WatchdogState::Off => {}
        }
    }
}
