//! Producer loop (spec §4.4): reads one block at a time into the ring,
//! drives the input-side volume-change protocol, and detects EOF.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read};
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::InputSource;
use crate::core::rate_limiter::{RateLimiter, RateLimiterState};
use crate::core::Core;
use crate::destinations::write_adapter::WriteAdapter;
use crate::error::{FlowbufError, Result};
use crate::volume::{self, AutoloadConfig, VolumeOutcome, VolumeSide};

enum Input {
    Stdin(io::Stdin),
    File(File),
    Network(TcpStream),
}

impl Input {
    fn open(source: &InputSource) -> Result<Self> {
        match source {
            InputSource::Stdin => Ok(Input::Stdin(io::stdin())),
            InputSource::File(path) => {
                let file = OpenOptions::new()
                    .read(true)
                    .open(path)
                    .map_err(|e| FlowbufError::destination("input", format!("open {}: {e}", path.display())))?;
                Ok(Input::File(file))
            }
            InputSource::Network { host, port } => {
                let addr = format!("{}:{}", host.clone().unwrap_or_else(|| "0.0.0.0".to_string()), port);
                let listener = TcpListener::bind(&addr)
                    .map_err(|e| FlowbufError::destination("input", format!("bind {addr}: {e}")))?;
                let (stream, _) = listener
                    .accept()
                    .map_err(|e| FlowbufError::destination("input", format!("accept on {addr}: {e}")))?;
                Ok(Input::Network(stream))
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Input::Stdin(s) => s.lock().read(buf),
            Input::File(f) => f.read(buf),
            Input::Network(s) => s.read(buf),
        }
    }

    fn raw_fd(&self) -> Option<i32> {
        match self {
            Input::Stdin(s) => Some(s.as_raw_fd()),
            Input::File(f) => Some(f.as_raw_fd()),
            Input::Network(s) => Some(s.as_raw_fd()),
        }
    }
}

/// Read exactly `buf.len()` bytes unless EOF is hit first, retrying on
/// `EINTR` and, once, on `EINVAL` after disabling direct I/O (spec §4.4,
/// §7 kind 2). Returns the number of bytes actually read.
fn read_block(input: &mut Input, adapter: &WriteAdapter, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    let mut einval_retried = false;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.raw_os_error() == Some(libc::EINVAL) && !einval_retried => {
                einval_retried = true;
                if let Some(fd) = input.raw_fd() {
                    adapter.disable_direct_io_fd(fd);
                }
            }
            // ENOMEM on read is the device-block-size-mismatch indicator
            // (spec §4.4); the staging-buffer fallback it names applies to
            // devices with a fixed native block size larger than ours,
            // which this crate does not target, so the error is simply
            // surfaced as a read failure here.
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

pub fn run_producer(core: Arc<Core>) {
    let mut input = match Input::open(&core.config.input) {
        Ok(i) => i,
        Err(e) => {
            warn!(error = %e, "producer failed to open input");
            core.counters.mark_error();
            core.counters.request_terminate();
            core.counters.set_finish(0, 0);
            core.ring.publish_filled(0);
            return;
        }
    };

    let adapter = WriteAdapter::new(core.config.direct_io);
    let limiter = RateLimiter::new(core.config.read_rate_bps);
    let mut limiter_state = RateLimiterState::new();
    let mut remaining_volumes = core.config.input_volumes;
    let mut autoload = AutoloadConfig {
        cmd: core.config.autoload_cmd.clone(),
        autoload_time: core.config.autoload_time,
        no_prompt: core.config.no_prompt,
    };

    let block_size = core.ring.block_size();

    'outer: loop {
        if core.counters.is_terminated() {
            return;
        }

        let Some(index) = core.ring.acquire_free_slot(&core.counters.terminate) else {
            return;
        };

        // `filled` tracks bytes already landed in this slot across volume
        // boundaries: a mid-block volume change resumes reading into the
        // same slot at this offset instead of discarding the partial block
        // and starting over, mirroring `examples/original_source/
        // input.c:276-322`'s do/while, which keeps `num` bytes and resumes
        // the read against the reopened fd.
        let mut filled = 0usize;

        loop {
            let n = {
                let block = unsafe { core.ring.block_mut(index) };
                match read_block(&mut input, &adapter, &mut block[filled..]) {
                    Ok(n) => n,
                    Err(e) => {
                        warn!(error = %e, "producer read failed");
                        core.counters.mark_error();
                        core.counters.set_finish(index, filled);
                        core.ring.publish_filled(index);
                        core.counters.request_terminate();
                        core.ring.wake_all();
                        core.gate.wake_all();
                        return;
                    }
                }
            };
            filled += n;
            core.counters.bytes_read.fetch_add(n as u64, Ordering::Relaxed);

            if filled == block_size {
                core.counters.blocks_read.fetch_add(1, Ordering::Relaxed);
                core.ring.publish_filled(index);
                core.gate.maybe_signal_high(&core.ring);
                limiter.enforce(filled, &mut limiter_state);
                core.gate.wait_for_room(&core.ring, &core.counters.terminate);
                continue 'outer;
            }

            // Short read: either true EOF, or (for multi-volume input) the
            // end of the current volume.
            if remaining_volumes != 1 {
                match volume::change_volume(VolumeSide::Input, "input", &autoload) {
                    Ok(VolumeOutcome::Declined) => {
                        // A clean "n" answer at the prompt ends input the
                        // same way true EOF does (spec §4.9) -- not an
                        // error, so no `mark_error` here.
                        break;
                    }
                    Ok(VolumeOutcome::Ready) => {
                        if remaining_volumes > 1 {
                            remaining_volumes -= 1;
                        }
                        match Input::open(&core.config.input) {
                            Ok(fresh) => {
                                input = fresh;
                                continue;
                            }
                            Err(e) => {
                                warn!(error = %e, "failed to reopen input after volume change");
                                core.counters.mark_error();
                            }
                        }
                    }
                    Err(e) => {
                        if autoload.cmd.is_some() {
                            warn!(error = %e, "autoload command failed, disabling autoloader");
                            autoload.cmd = None;
                            continue;
                        }
                        warn!(error = %e, "input volume change failed");
                        core.counters.mark_error();
                    }
                }
            }

            break;
        }

        info!(block_index = index, rest_bytes = filled, "producer reached end of input");
        core.counters.blocks_read.fetch_add(1, Ordering::Relaxed);
        core.counters.set_finish(index, filled);
        core.ring.publish_filled(index);
        core.gate.maybe_signal_high(&core.ring);
        return;
    }
}
