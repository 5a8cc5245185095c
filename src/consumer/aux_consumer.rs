//! Auxiliary consumer / hash task (spec §4.7): one per extra destination,
//! each consuming the same block the main consumer is currently serving.

use std::sync::Arc;

use tracing::warn;

use crate::core::barrier::{DONE_SIZE, FORCED_QUIESCENCE_SIZE};
use crate::core::Core;
use crate::destinations::Destination;

pub fn run_aux_consumer(core: Arc<Core>, mut destination: Destination) {
    let mut last_seen = 0u64;

    loop {
        let Some((ptr, size, is_last_arrival)) =
            core.barrier.wait_next(&core.ring, &mut last_seen, &core.counters.terminate)
        else {
            destination.record_canceled();
            return;
        };

        if size == FORCED_QUIESCENCE_SIZE {
            destination.record_canceled();
            return;
        }

        if size == DONE_SIZE {
            destination.finalize();
            return;
        }

        if size > 0 {
            let chunk = unsafe { std::slice::from_raw_parts(ptr, size as usize) };
            if let Err(e) = destination.write_chunk(chunk) {
                warn!(destination = %destination.name, error = %e, "auxiliary consumer write failed");
                destination.record_error(e.to_string());
                core.counters.mark_error();
                core.barrier.deregister();
                if is_last_arrival {
                    core.ring.release_free(0);
                }
                if core.config.errors_fatal {
                    core.counters.request_terminate();
                    core.wake_everyone();
                }
                return;
            }
        }

        if is_last_arrival {
            // The index to release is implicit in the ring's FIFO discipline:
            // the main consumer already acquired it via `acquire_filled_slot`
            // before publishing, so returning any slot advances the same
            // free-pool counter the producer is waiting on.
            core.ring.release_free(0);
        }
    }
}
