//! CLI entry point: parse configuration, build the `Core` context, spawn
//! every pipeline thread, and report the post-mortem summary (spec §6, §7).

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;

use flowbuf::config::cli::Cli;
use flowbuf::config::{rcfile, Config, NetworkOutputSpec};
use flowbuf::consumer::{aux_consumer::run_aux_consumer, main_consumer::run_main_consumer};
use flowbuf::core::Core;
use flowbuf::destinations::{Destination, OutputOpenSpec};
use flowbuf::producer::run_producer;
use flowbuf::status::run_status_reporter;
use flowbuf::watchdog::run_watchdog;
use flowbuf::{log, signals};

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("flowbuf: {e:?}");
            std::process::exit(1);
        }
    }
}

fn known_input_size(config: &Config) -> Option<u64> {
    match &config.input {
        flowbuf::config::InputSource::File(path) => std::fs::metadata(path).ok().map(|m| m.len()),
        _ => None,
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let rc = rcfile::load("flowbuf", None);
    let config = Config::from_cli(cli, &rc).context("resolving configuration")?;
    let _log_guard = log::init(config.verbosity, config.log_file.as_deref());

    if let Some(pid_path) = &config.pid_file {
        let mut f = std::fs::File::create(pid_path)
            .with_context(|| format!("creating pid file {}", pid_path.display()))?;
        writeln!(f, "{}", std::process::id())
            .with_context(|| format!("writing pid file {}", pid_path.display()))?;
    }

    let (main_open, aux_opens): (OutputOpenSpec, Vec<OutputOpenSpec>) = {
        let mut opens = config.outputs.iter().map(|o| o.open.clone());
        let first = opens.next().expect("Config::from_cli always produces at least one output");
        (first, opens.collect())
    };

    let main_destination = if main_open.path.to_str() == Some("-") {
        Destination::stdout("stdout")
    } else {
        Destination::open_file(main_open.path.display().to_string(), &main_open)
            .with_context(|| format!("opening primary destination {}", main_open.path.display()))?
    };

    let mut aux_destinations = Vec::new();
    for open in &aux_opens {
        aux_destinations.push(
            Destination::open_file(open.path.display().to_string(), open)
                .with_context(|| format!("opening destination {}", open.path.display()))?,
        );
    }
    for net in &config.network_outputs {
        let NetworkOutputSpec::Address(addr) = net;
        aux_destinations.push(
            Destination::open_socket(addr.clone(), addr)
                .with_context(|| format!("connecting to network destination {addr}"))?,
        );
    }
    for algo in &config.hash_outputs {
        aux_destinations.push(Destination::hash(algo.name(), *algo));
    }

    let input_size = known_input_size(&config);
    let num_aux = aux_destinations.len();
    let core = Core::build(config, num_aux).context("building pipeline core")?;
    signals::install(core.clone()).context("installing signal handler")?;

    let started = Instant::now();
    let mut handles = Vec::new();

    {
        let core = core.clone();
        handles.push(std::thread::spawn(move || run_producer(core)));
    }
    {
        let core = core.clone();
        handles.push(std::thread::spawn(move || run_main_consumer(core, main_destination, main_open)));
    }
    for destination in aux_destinations {
        let core = core.clone();
        handles.push(std::thread::spawn(move || run_aux_consumer(core, destination)));
    }
    if !core.config.very_quiet && !core.config.quiet {
        let core = core.clone();
        let interval = Duration::from_secs_f64(core.config.status_interval.max(0.05));
        let to_log = core.config.log_file.is_some();
        handles.push(std::thread::spawn(move || {
            run_status_reporter(core, interval, input_size, to_log)
        }));
    }
    if let Some(secs) = core.config.watchdog_secs {
        let core = core.clone();
        handles.push(std::thread::spawn(move || run_watchdog(core, Duration::from_secs(secs))));
    }

    for handle in handles {
        let _ = handle.join();
    }

    let elapsed = started.elapsed();
    let bytes = core.counters.bytes_read.load(std::sync::atomic::Ordering::Relaxed);
    println!(
        "transferred {bytes} bytes in {:.2}s ({:.2} MiB/s), empty={} full={}",
        elapsed.as_secs_f64(),
        bytes as f64 / elapsed.as_secs_f64().max(1e-9) / (1024.0 * 1024.0),
        core.counters.empty_count.load(std::sync::atomic::Ordering::Relaxed),
        core.counters.full_count.load(std::sync::atomic::Ordering::Relaxed),
    );

    let had_error = core.counters.had_error();
    Ok(if had_error { 1 } else { 0 })
}
