//! Main consumer (spec §4.6): writes blocks to the primary destination,
//! handles tape-aware `ENOSPC` sequencing and the output-side volume
//! change, and paces itself via the write-rate limiter.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{info, warn};

use crate::constants::TAPE_ENOSPC_TRUE_EOM_COUNT;
use crate::core::rate_limiter::{RateLimiter, RateLimiterState};
use crate::core::Core;
use crate::destinations::{Destination, OutputOpenSpec};
use crate::volume::{self, AutoloadConfig, VolumeSide};

pub fn run_main_consumer(core: Arc<Core>, mut destination: Destination, open_spec: OutputOpenSpec) {
    let limiter = RateLimiter::new(core.config.write_rate_bps);
    let mut limiter_state = RateLimiterState::new();
    let mut autoload = AutoloadConfig {
        cmd: core.config.autoload_cmd.clone(),
        autoload_time: core.config.autoload_time,
        no_prompt: core.config.no_prompt,
    };

    let num_aux = core.barrier.num_registered();
    let mut bytes_since_volume: u64 = 0;
    let mut consecutive_enospc: u32 = 0;
    let mut main_output_ok = true;
    let mut open_spec = open_spec;

    if core.config.start_write > 0.0 {
        core.gate.wait_for_data(&core.ring, &core.counters.terminate, &|| core.counters.is_finished());
    }

    loop {
        if core.counters.is_terminated() {
            break;
        }

        if core.ring.filled_count() == 0 && !core.counters.is_finished() {
            core.gate.wait_for_data(&core.ring, &core.counters.terminate, &|| core.counters.is_finished());
            core.counters.empty_count.fetch_add(1, Ordering::Relaxed);
        }

        let Some(index) = core.ring.acquire_filled_slot(&core.counters.terminate) else {
            break;
        };

        let is_finish_slot = core.counters.finish_index() == Some(index);
        if is_finish_slot && core.ring.filled_count() == 0 && core.counters.rest_bytes() == 0 {
            core.barrier.publish_done(&core.counters.terminate);
            break;
        }

        let len = if is_finish_slot { core.counters.rest_bytes() } else { core.ring.block_size() };
        let ptr = core.ring.block_ptr(index);

        if !core.barrier.publish(ptr, len, &core.counters.terminate) {
            // Shut down while a previous round's auxiliary was still
            // draining; the block above was never handed off.
            break;
        }

        if core.config.output_volume_size > 0
            && bytes_since_volume + len as u64 >= core.config.output_volume_size
        {
            match destination
                .sync()
                .and_then(|_| volume::change_volume(VolumeSide::Output, &destination.name, &autoload))
            {
                Ok(_) => {
                    if let Err(e) = destination.reopen(&open_spec) {
                        warn!(error = %e, "failed to reopen primary output after volume change");
                        main_output_ok = false;
                    } else {
                        bytes_since_volume = 0;
                    }
                }
                Err(e) => {
                    if autoload.cmd.is_some() {
                        warn!(error = %e, "output autoload command failed, disabling autoloader");
                        autoload.cmd = None;
                    } else {
                        warn!(error = %e, "output volume change failed");
                        core.counters.mark_error();
                        main_output_ok = false;
                    }
                }
            }
        }

        if main_output_ok && len > 0 {
            let chunk = unsafe { std::slice::from_raw_parts(ptr, len) };
            match destination.write_chunk_io(chunk) {
                Ok(()) => {
                    consecutive_enospc = 0;
                    bytes_since_volume += len as u64;
                    core.counters.blocks_written.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if e.raw_os_error() == Some(libc::ENOSPC) => {
                    if core.config.tape_aware && destination.is_tape_aware_candidate() {
                        consecutive_enospc += 1;
                        if consecutive_enospc < TAPE_ENOSPC_TRUE_EOM_COUNT {
                            warn!("near end of tape media, continuing");
                        } else {
                            info!("end of tape media reached, requesting a volume change");
                            match volume::change_volume(VolumeSide::Output, &destination.name, &autoload) {
                                Ok(_) => match destination.reopen(&open_spec) {
                                    Ok(()) => {
                                        consecutive_enospc = 0;
                                        bytes_since_volume = 0;
                                        if destination.write_chunk_io(chunk).is_err() {
                                            core.counters.mark_error();
                                            main_output_ok = false;
                                        } else {
                                            core.counters.blocks_written.fetch_add(1, Ordering::Relaxed);
                                        }
                                    }
                                    Err(e) => {
                                        warn!(error = %e, "failed to reopen output after tape change");
                                        core.counters.mark_error();
                                        main_output_ok = false;
                                    }
                                },
                                Err(e) => {
                                    warn!(error = %e, "tape volume change failed");
                                    core.counters.mark_error();
                                    main_output_ok = false;
                                }
                            }
                        }
                    } else {
                        warn!("output device out of space");
                        core.counters.mark_error();
                        main_output_ok = false;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "primary output write failed");
                    core.counters.mark_error();
                    main_output_ok = false;
                }
            }
        }

        if !main_output_ok && core.config.errors_fatal {
            core.counters.request_terminate();
            core.wake_everyone();
        }

        if !main_output_ok && num_aux == 0 {
            core.ring.release_free(index);
            core.ring.wake_all();
            break;
        }

        if num_aux == 0 {
            core.ring.release_free(index);
        }

        if !main_output_ok && core.config.errors_fatal {
            break;
        }

        if core.config.write_rate_bps > 0 {
            limiter.enforce(len, &mut limiter_state);
        }
        if core.config.pause_micros > 0 {
            std::thread::sleep(std::time::Duration::from_micros(core.config.pause_micros));
        }

        core.gate.maybe_signal_low(&core.ring);

        if is_finish_slot && core.ring.filled_count() == 0 {
            core.barrier.publish_done(&core.counters.terminate);
            break;
        }
    }

    destination.finalize();
    if !main_output_ok {
        destination.record_error("write failed");
    }
}
