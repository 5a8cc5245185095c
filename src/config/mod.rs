//! Resolved configuration: the merge of built-in defaults, rc files and CLI
//! flags (spec.md §6, SPEC_FULL.md §5 "Configuration").

pub mod cli;
pub mod rcfile;
pub mod size;

use std::path::PathBuf;

use sysinfo::System;
use tracing::Level;

use crate::constants::{
    DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SIZE, DEFAULT_START_READ, DEFAULT_START_WRITE,
    DEFAULT_STATUS_INTERVAL_SECS, MIN_BLOCK_COUNT,
};
use crate::destinations::hash::DigestAlgorithm;
use crate::destinations::OutputOpenSpec;
use crate::error::{FlowbufError, Result};
use cli::Cli;
use size::ParsedSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Any,
    V4,
    V6,
}

/// Where the producer reads from.
#[derive(Debug, Clone)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
    Network { host: Option<String>, port: u16 },
}

/// Every non-hash output the producer's bytes fan out to, plus every hash
/// destination (spec §3 "Destination descriptor", ordered list).
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub open: OutputOpenSpec,
}

#[derive(Debug, Clone)]
pub enum NetworkOutputSpec {
    Address(String),
}

/// Fully resolved settings driving one `flowbuf` run.
#[derive(Debug, Clone)]
pub struct Config {
    pub block_size: usize,
    pub block_count: usize,

    pub input: InputSource,
    pub outputs: Vec<OutputSpec>,
    pub network_outputs: Vec<NetworkOutputSpec>,
    pub hash_outputs: Vec<DigestAlgorithm>,

    pub input_volumes: u32,
    pub output_volume_size: u64,
    pub autoload_time: u64,
    pub autoload_cmd: Option<String>,
    pub tape_aware: bool,
    pub no_prompt: bool,

    pub read_rate_bps: u64,
    pub write_rate_bps: u64,
    pub pause_micros: u64,
    pub start_read: f64,
    pub start_write: f64,

    pub verbosity: Level,
    pub quiet: bool,
    pub very_quiet: bool,
    pub log_file: Option<PathBuf>,
    pub watchdog_secs: Option<u64>,
    pub pid_file: Option<PathBuf>,

    pub lock_memory: bool,
    pub mmap_scratch_path: Option<PathBuf>,

    pub address_family: AddressFamily,
    pub direct_io: bool,
    pub errors_fatal: bool,
    pub status_interval: f64,
}

fn physical_memory_bytes() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory()
}

fn resolve_size(raw: &str) -> Result<u64> {
    match size::parse_size(raw)? {
        ParsedSize::Bytes(b) => Ok(b),
        ParsedSize::Percent(p) => Ok((physical_memory_bytes() as f64 * p / 100.0) as u64),
    }
}

fn resolve_rate(raw: &Option<String>) -> Result<u64> {
    match raw {
        None => Ok(0),
        Some(s) => resolve_size(s),
    }
}

fn parse_level(raw: &str) -> Result<Level> {
    match raw.to_ascii_lowercase().as_str() {
        "silent" | "fatal" => Ok(Level::ERROR),
        "error" => Ok(Level::ERROR),
        "warning" | "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "io" => Ok(Level::TRACE),
        other => Err(FlowbufError::config(format!("unknown verbosity level '{other}'"))),
    }
}

/// Parse a `[HOST:]PORT` argument for `-I`.
fn parse_input_net(raw: &str) -> Result<(Option<String>, u16)> {
    match raw.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| FlowbufError::config(format!("invalid port in '{raw}'")))?;
            Ok((Some(host.to_string()), port))
        }
        None => {
            let port: u16 =
                raw.parse().map_err(|_| FlowbufError::config(format!("invalid port '{raw}'")))?;
            Ok((None, port))
        }
    }
}

impl Config {
    /// Merge built-in defaults, rc-file settings and CLI flags into one
    /// resolved configuration; CLI always wins, rc files win over defaults
    /// (spec.md §6 "Config files").
    pub fn from_cli(cli: Cli, rc: &rcfile::RcSettings) -> Result<Self> {
        if cli.hash.iter().any(|h| h.eq_ignore_ascii_case("list")) {
            println!("{}", DigestAlgorithm::available().join(", "));
            std::process::exit(0);
        }

        let block_size_raw = cli.block_size.clone().or_else(|| rc.get("block-size").map(str::to_string));
        let num_blocks = cli.num_blocks.or_else(|| rc.get("num-blocks").and_then(|v| v.parse().ok()));
        let memory_raw = cli.memory.clone().or_else(|| rc.get("memory").map(str::to_string));

        let (block_size, block_count) =
            resolve_buffer_sizing(block_size_raw.as_deref(), num_blocks, memory_raw.as_deref())?;

        let input = match (&cli.input, &cli.input_net) {
            (Some(_), Some(_)) => {
                return Err(FlowbufError::config("-i and -I are mutually exclusive"));
            }
            (Some(path), None) => InputSource::File(path.clone()),
            (None, Some(net)) => {
                let (host, port) = parse_input_net(net)?;
                InputSource::Network { host, port }
            }
            (None, None) => InputSource::Stdin,
        };

        let mut outputs = Vec::new();
        for path in &cli.output {
            outputs.push(OutputSpec {
                open: OutputOpenSpec {
                    path: path.clone(),
                    append: cli.append,
                    truncate: cli.truncate,
                    force: cli.force,
                    sync_writes: cli.sync_writes,
                    direct: cli.direct,
                },
            });
        }

        let network_outputs =
            cli.output_net.iter().cloned().map(NetworkOutputSpec::Address).collect();

        let mut hash_outputs = Vec::new();
        if cli.md5 {
            hash_outputs.push(DigestAlgorithm::Md5);
        }
        for name in &cli.hash {
            hash_outputs.push(DigestAlgorithm::parse(name)?);
        }

        // `outputs[0]` is always the primary destination the main consumer
        // writes to (spec §3: "the head is the main consumer"); hash
        // destinations and `-O` network outputs are always auxiliary, so a
        // run that only specifies those still needs a primary -- default
        // it to stdout.
        if outputs.is_empty() {
            outputs.push(OutputSpec {
                open: OutputOpenSpec {
                    path: PathBuf::from("-"),
                    append: false,
                    truncate: false,
                    force: false,
                    sync_writes: false,
                    direct: false,
                },
            });
        }

        let verbosity_raw =
            cli.verbosity.clone().or_else(|| rc.get("verbosity").map(str::to_string));
        let verbosity = match verbosity_raw {
            Some(v) => parse_level(&v)?,
            None => Level::INFO,
        };

        let start_read = cli
            .low_watermark_pct
            .or_else(|| rc.get("low-watermark").and_then(|v| v.parse().ok()))
            .map(|p: f64| p / 100.0)
            .unwrap_or(DEFAULT_START_READ);
        let start_write = cli
            .high_watermark_pct
            .or_else(|| rc.get("high-watermark").and_then(|v| v.parse().ok()))
            .map(|p: f64| p / 100.0)
            .unwrap_or(DEFAULT_START_WRITE);

        if !(0.0..=1.0).contains(&start_read) {
            return Err(FlowbufError::config("-p must be between 0 and 100"));
        }
        if !(0.0..1.0).contains(&start_write) {
            return Err(FlowbufError::config("-P must be between 0 and 100, exclusive of 100"));
        }

        let address_family = match (cli.family_any, cli.family_v4, cli.family_v6) {
            (true, _, _) => AddressFamily::Any,
            (_, true, false) => AddressFamily::V4,
            (_, false, true) => AddressFamily::V6,
            _ => AddressFamily::Any,
        };

        let mmap_scratch_path = if cli.mmap_scratch || cli.mmap_scratch_path.is_some() {
            Some(cli.mmap_scratch_path.clone().unwrap_or_else(default_scratch_path))
        } else {
            None
        };

        Ok(Self {
            block_size,
            block_count,
            input,
            outputs,
            network_outputs,
            hash_outputs,
            input_volumes: cli_input_volumes(&cli),
            output_volume_size: match &cli.output_volume_size {
                Some(s) => resolve_size(s)?,
                None => 0,
            },
            autoload_time: cli.autoload_time.or_else(|| rc.get("autoload-time").and_then(|v| v.parse().ok())).unwrap_or(0),
            autoload_cmd: cli.autoload_cmd.clone().or_else(|| rc.get("autoload-cmd").map(str::to_string)),
            tape_aware: cli.tape_aware || rc.get("tapeaware").is_some(),
            no_prompt: cli.no_prompt,
            read_rate_bps: resolve_rate(&cli.read_rate.clone().or_else(|| rc.get("read-rate").map(str::to_string)))?,
            write_rate_bps: resolve_rate(&cli.write_rate.clone().or_else(|| rc.get("write-rate").map(str::to_string)))?,
            pause_micros: cli.pause_micros.or_else(|| rc.get("pause").and_then(|v| v.parse().ok())).unwrap_or(0),
            start_read,
            start_write,
            verbosity,
            quiet: cli.quiet,
            very_quiet: cli.very_quiet,
            log_file: cli.log_file.clone(),
            watchdog_secs: cli.watchdog_secs.or_else(|| rc.get("watchdog").and_then(|v| v.parse().ok())),
            pid_file: cli.pid_file.clone(),
            lock_memory: cli.lock_memory,
            mmap_scratch_path,
            address_family,
            direct_io: cli.direct,
            errors_fatal: cli.errors_fatal,
            status_interval: cli.status_interval.or_else(|| rc.get("status-interval").and_then(|v| v.parse().ok())).unwrap_or(DEFAULT_STATUS_INTERVAL_SECS),
        })
    }
}

fn cli_input_volumes(cli: &Cli) -> u32 {
    cli.input_volumes.unwrap_or(1)
}

fn default_scratch_path() -> PathBuf {
    std::env::temp_dir().join(format!("flowbuf-scratch-{}.bin", std::process::id()))
}

fn resolve_buffer_sizing(
    block_size_raw: Option<&str>,
    block_count: Option<usize>,
    memory_raw: Option<&str>,
) -> Result<(usize, usize)> {
    let block_size = match block_size_raw {
        Some(raw) => resolve_size(raw)? as usize,
        None => DEFAULT_BLOCK_SIZE,
    };

    match (block_count, memory_raw) {
        (Some(n), _) => Ok((block_size, n.max(MIN_BLOCK_COUNT))),
        (None, Some(mem_raw)) => {
            let total = resolve_size(mem_raw)? as usize;
            let n = (total / block_size).max(MIN_BLOCK_COUNT);
            Ok((block_size, n))
        }
        (None, None) => Ok((block_size, DEFAULT_BLOCK_COUNT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sizing_pins_count_from_memory() {
        let (bs, n) = resolve_buffer_sizing(Some("1k"), None, Some("10k")).unwrap();
        assert_eq!(bs, 1024);
        assert_eq!(n, 10);
    }

    #[test]
    fn buffer_sizing_enforces_minimum_count() {
        let (_, n) = resolve_buffer_sizing(Some("4k"), None, None).unwrap();
        assert!(n >= MIN_BLOCK_COUNT);
    }

    #[test]
    fn input_net_parses_host_and_port() {
        assert_eq!(parse_input_net("9000").unwrap(), (None, 9000));
        assert_eq!(
            parse_input_net("example.com:9000").unwrap(),
            (Some("example.com".to_string()), 9000)
        );
    }
}
