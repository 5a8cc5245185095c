//! The `Core` context: the ring, the watermark gate, the fan-out barrier
//! and the shared counters, composed once at startup and shared by
//! reference across every thread in the pipeline (spec §9 "Globals" --
//! "Re-architect as a single `Core` context composed of sub-contexts").

pub mod barrier;
pub mod counters;
pub mod rate_limiter;
pub mod ring;
pub mod sem;
pub mod watermark;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;

use barrier::FanoutBarrier;
use counters::Counters;
use ring::Ring;
use watermark::WatermarkGate;

pub struct Core {
    pub ring: Ring,
    pub gate: WatermarkGate,
    pub barrier: FanoutBarrier,
    pub counters: Counters,
    pub config: Config,
}

impl Core {
    pub fn build(config: Config, num_aux_consumers: usize) -> Result<Arc<Self>> {
        let ring = if let Some(scratch) = &config.mmap_scratch_path {
            let mmap = crate::destinations::scratch::map_scratch_file(
                scratch,
                config.block_size * config.block_count,
            )?;
            Ring::new_mapped(mmap, config.block_size, config.block_count)?
        } else {
            Ring::new_heap(config.block_size, config.block_count)?
        };

        if config.lock_memory {
            ring.lock_in_memory()?;
        }

        let gate = WatermarkGate::new(config.start_read, config.start_write);
        let barrier = FanoutBarrier::new(num_aux_consumers);
        let counters = Counters::new();

        Ok(Arc::new(Self { ring, gate, barrier, counters, config }))
    }

    /// Wake every thread parked anywhere in the pipeline so it can observe
    /// `terminate` (spec §5 "Cancellation", §7 "Signals").
    pub fn wake_everyone(&self) {
        self.ring.wake_all();
        self.gate.wake_all();
        self.barrier.wake_all();
    }
}
