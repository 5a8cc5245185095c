//! Tuning constants and defaults for the flowbuf pipeline.

/// Default block size in bytes when `-s` is not given (matches common tape
/// block sizes well and is a multiple of most filesystem page sizes).
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Minimum number of blocks the ring may be configured with (spec §8: N >= 5).
pub const MIN_BLOCK_COUNT: usize = 5;

/// Default number of blocks in the ring when `-b`/`-m` are not given.
pub const DEFAULT_BLOCK_COUNT: usize = MIN_BLOCK_COUNT;

/// Default low watermark (fraction of the ring, in (0,1]).
pub const DEFAULT_START_READ: f64 = 0.0;

/// Default high watermark (fraction of the ring, in [0,1)).
pub const DEFAULT_START_WRITE: f64 = 0.0;

/// Default status line refresh interval.
pub const DEFAULT_STATUS_INTERVAL_SECS: f64 = 0.5;

/// Smallest sleep the rate limiter will actually perform; shorter deficits
/// are accumulated and charged against the next block instead (spec §4.3).
pub const MIN_RATE_LIMITER_SLEEP_MICROS: u64 = 1_000;

/// Bound applied to `-m PERCENT` sizing so one pipeline cannot claim the
/// whole machine (spec §6 "Size parsing").
pub const MAX_MEMORY_PERCENT: f64 = 90.0;

/// Minimum accepted explicit byte size (`128b`/`128B` suffix, spec §6).
pub const MIN_EXPLICIT_BYTES: u64 = 128;

/// Consecutive `ENOSPC` events that constitute true end-of-media on a tape
/// device, as opposed to the first one which is treated as an early warning
/// (spec §4.6 step 8, the tape end-of-media heuristic).
pub const TAPE_ENOSPC_TRUE_EOM_COUNT: u32 = 2;
