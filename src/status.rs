//! Periodic status line (spec §4.11): instantaneous/aggregate throughput,
//! buffer fill percent, and percent-complete when the input size is known.

use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::info;

use crate::core::Core;

/// Shared with the logger on platforms without `PIPE_BUF`-sized write
/// atomicity, so status lines and log lines never interleave mid-line
/// (spec §4.11, §5 "Status line I/O").
pub static TERMINAL_LOCK: Mutex<()> = Mutex::new(());

pub fn run_status_reporter(
    core: Arc<Core>,
    interval: Duration,
    input_size: Option<u64>,
    to_log: bool,
) {
    let start = Instant::now();
    let mut last_sample = start;
    let mut last_read = core.counters.blocks_read.load(Ordering::Relaxed);
    let mut last_written = core.counters.blocks_written.load(Ordering::Relaxed);

    loop {
        thread::sleep(interval);
        if core.counters.is_terminated() && core.counters.is_finished() {
            break;
        }

        let now = Instant::now();
        let dt = now.duration_since(last_sample).as_secs_f64().max(1e-9);
        let read = core.counters.blocks_read.load(Ordering::Relaxed);
        let written = core.counters.blocks_written.load(Ordering::Relaxed);
        let bytes_read = core.counters.bytes_read.load(Ordering::Relaxed);
        let block_size = core.ring.block_size() as u64;

        let inst_read_rate = (read - last_read) as f64 * block_size as f64 / dt;
        let inst_write_rate = (written - last_written) as f64 * block_size as f64 / dt;
        let avg_rate = bytes_read as f64 / start.elapsed().as_secs_f64().max(1e-9);
        let fill_pct = 100.0 * core.ring.filled_count() as f64 / core.ring.num_blocks() as f64;

        let mut line = format!(
            "in @ {}/s, out @ {}/s, {:.1}% buffer",
            human_rate(inst_read_rate),
            human_rate(inst_write_rate),
            fill_pct
        );
        if let Some(total) = input_size {
            line.push_str(&format!(", {:.1}% done", 100.0 * bytes_read as f64 / total as f64));
        }
        line.push_str(&format!(" (avg {}/s)", human_rate(avg_rate)));

        {
            let _guard = TERMINAL_LOCK.lock();
            eprint!("\r{line}");
            let _ = std::io::stderr().flush();
        }
        if to_log {
            info!("{line}");
        }

        last_sample = now;
        last_read = read;
        last_written = written;

        if core.counters.is_terminated() {
            break;
        }
    }
    let _guard = TERMINAL_LOCK.lock();
    eprintln!();
}

fn human_rate(bytes_per_sec: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes_per_sec.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1}{}", UNITS[unit])
}
