//! Command line surface (spec §6 "External interfaces"), parsed with
//! `clap`'s derive API (grounded in `darmie-KaaL`'s `kaal-compose` and
//! `sel4-compose` CLI tools).

use std::path::PathBuf;

use clap::Parser;

/// A decoupling buffer between one input and one or more outputs.
#[derive(Parser, Debug, Clone)]
#[command(name = "flowbuf", version, about)]
pub struct Cli {
    /// Block size, e.g. `64k`, `1M` (default 64k).
    #[arg(short = 's', long = "block-size", value_name = "BYTES")]
    pub block_size: Option<String>,

    /// Number of blocks in the ring (default 5, minimum 5).
    #[arg(short = 'b', long = "num-blocks", value_name = "N")]
    pub num_blocks: Option<usize>,

    /// Total buffer memory, e.g. `100M` or `50%`; pins the third of
    /// block-size/num-blocks/total-memory when two are given.
    #[arg(short = 'm', long = "memory", value_name = "SIZE|PERCENT")]
    pub memory: Option<String>,

    /// Input file path (default: standard input).
    #[arg(short = 'i', long = "input", value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Network input address, `[HOST:]PORT`.
    #[arg(short = 'I', long = "input-net", value_name = "[HOST:]PORT")]
    pub input_net: Option<String>,

    /// Output file or device path (repeatable).
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Vec<PathBuf>,

    /// Network output address `HOST:PORT` (repeatable).
    #[arg(short = 'O', long = "output-net", value_name = "HOST:PORT")]
    pub output_net: Vec<String>,

    /// Open subsequent `-o` outputs in append mode.
    #[arg(long = "append")]
    pub append: bool,

    /// Truncate existing `-o` outputs before writing.
    #[arg(long = "truncate")]
    pub truncate: bool,

    /// Overwrite an existing output even without `--truncate`.
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Open outputs with synchronous (O_SYNC-like) writes.
    #[arg(short = 'c', long = "sync")]
    pub sync_writes: bool,

    /// Number of input volumes; 0 means "ask interactively" (default 1).
    #[arg(short = 'n', long = "volumes", value_name = "N")]
    pub input_volumes: Option<u32>,

    /// Output volume size; triggers a volume change once reached.
    #[arg(short = 'D', long = "output-volume-size", value_name = "SIZE")]
    pub output_volume_size: Option<String>,

    /// Seconds to sleep after running the autoload command.
    #[arg(short = 'a', long = "autoload-time", value_name = "SEC")]
    pub autoload_time: Option<u64>,

    /// Shell command run to advance to the next volume.
    #[arg(short = 'A', long = "autoload-cmd", value_name = "CMD")]
    pub autoload_cmd: Option<String>,

    /// Enable the tape end-of-media ENOSPC heuristic.
    #[arg(long = "tapeaware")]
    pub tape_aware: bool,

    /// Input rate limit in bytes/sec.
    #[arg(short = 'r', long = "read-rate", value_name = "BPS")]
    pub read_rate: Option<String>,

    /// Output rate limit in bytes/sec.
    #[arg(short = 'R', long = "write-rate", value_name = "BPS")]
    pub write_rate: Option<String>,

    /// Fixed per-block pause, in microseconds.
    #[arg(short = 'u', long = "pause", value_name = "MICROS")]
    pub pause_micros: Option<u64>,

    /// Low watermark, percent of the ring (0,100].
    #[arg(short = 'p', long = "low-watermark", value_name = "PERCENT")]
    pub low_watermark_pct: Option<f64>,

    /// High watermark, percent of the ring [0,100).
    #[arg(short = 'P', long = "high-watermark", value_name = "PERCENT")]
    pub high_watermark_pct: Option<f64>,

    /// Log verbosity: silent/fatal/error/warning/info/debug/io.
    #[arg(short = 'v', long = "verbosity", value_name = "LEVEL")]
    pub verbosity: Option<String>,

    /// Reduce status output by one step.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Suppress status output entirely.
    #[arg(short = 'Q', long = "very-quiet")]
    pub very_quiet: bool,

    /// Mirror log output to this file.
    #[arg(short = 'l', long = "log", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Watchdog stall timeout, in seconds (disabled by default).
    #[arg(short = 'W', long = "watchdog", value_name = "SEC")]
    pub watchdog_secs: Option<u64>,

    /// Write the process id to this file.
    #[arg(long = "pid", value_name = "FILE")]
    pub pid_file: Option<PathBuf>,

    /// Lock the ring's memory with mlock.
    #[arg(short = 'L', long = "lock")]
    pub lock_memory: bool,

    /// Back the ring with a memory-mapped scratch file instead of the heap.
    #[arg(short = 't', long = "mmap")]
    pub mmap_scratch: bool,

    /// Explicit path for the `-t` scratch file.
    #[arg(short = 'T', long = "mmap-file", value_name = "FILE")]
    pub mmap_scratch_path: Option<PathBuf>,

    /// Shorthand for `--hash md5`.
    #[arg(short = 'H', long = "md5")]
    pub md5: bool,

    /// Add a hash consumer by algorithm name (repeatable); `list` enumerates
    /// the available algorithms and exits.
    #[arg(long = "hash", value_name = "NAME")]
    pub hash: Vec<String>,

    /// Force IPv4-or-IPv6-agnostic address resolution.
    #[arg(short = '0', long = "any-family")]
    pub family_any: bool,

    /// Force IPv4 for network endpoints.
    #[arg(short = '4', long = "ipv4")]
    pub family_v4: bool,

    /// Force IPv6 for network endpoints.
    #[arg(short = '6', long = "ipv6")]
    pub family_v6: bool,

    /// Hint O_DIRECT on the input and primary output (original_source
    /// `settings.c`; see SPEC_FULL.md §6).
    #[arg(short = 'd', long = "direct")]
    pub direct: bool,

    /// Escalate any error-level event to immediate process exit.
    #[arg(short = 'e', long = "errors-fatal")]
    pub errors_fatal: bool,

    /// Disable the interactive multi-volume prompt; fail fast instead.
    #[arg(short = 'x', long = "no-prompt")]
    pub no_prompt: bool,

    /// Status line refresh interval, in seconds.
    #[arg(long = "status-interval", value_name = "SEC")]
    pub status_interval: Option<f64>,
}
