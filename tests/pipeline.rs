//! End-to-end scenarios driving the real pipeline threads against
//! `tempfile`-backed inputs/outputs (spec §8 "End-to-end scenarios").

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use flowbuf::config::{AddressFamily, Config, InputSource, NetworkOutputSpec, OutputSpec};
use flowbuf::consumer::aux_consumer::run_aux_consumer;
use flowbuf::consumer::main_consumer::run_main_consumer;
use flowbuf::core::Core;
use flowbuf::destinations::hash::DigestAlgorithm;
use flowbuf::destinations::{Destination, OutputOpenSpec};
use flowbuf::producer::run_producer;
use tracing::Level;

fn base_config(input_path: PathBuf, outputs: Vec<PathBuf>) -> Config {
    Config {
        block_size: 16,
        block_count: 5,
        input: InputSource::File(input_path),
        outputs: outputs
            .into_iter()
            .map(|path| OutputSpec {
                open: OutputOpenSpec {
                    path,
                    append: false,
                    truncate: true,
                    force: true,
                    sync_writes: false,
                    direct: false,
                },
            })
            .collect(),
        network_outputs: Vec::<NetworkOutputSpec>::new(),
        hash_outputs: Vec::new(),
        input_volumes: 1,
        output_volume_size: 0,
        autoload_time: 0,
        autoload_cmd: None,
        tape_aware: false,
        no_prompt: true,
        read_rate_bps: 0,
        write_rate_bps: 0,
        pause_micros: 0,
        start_read: 0.0,
        start_write: 0.0,
        verbosity: Level::ERROR,
        quiet: true,
        very_quiet: true,
        log_file: None,
        watchdog_secs: None,
        pid_file: None,
        lock_memory: false,
        mmap_scratch_path: None,
        address_family: AddressFamily::Any,
        direct_io: false,
        errors_fatal: false,
        status_interval: 10.0,
    }
}

fn run_pipeline(config: Config, hash_algos: &[DigestAlgorithm]) -> Vec<Destination> {
    let mut opens = config.outputs.iter().map(|o| o.open.clone());
    let main_open = opens.next().unwrap();
    let aux_opens: Vec<_> = opens.collect();

    let main_destination = Destination::open_file(main_open.path.display().to_string(), &main_open).unwrap();
    let mut aux_destinations: Vec<Destination> = aux_opens
        .iter()
        .map(|spec| Destination::open_file(spec.path.display().to_string(), spec).unwrap())
        .collect();
    for algo in hash_algos {
        aux_destinations.push(Destination::hash(algo.name(), *algo));
    }

    let num_aux = aux_destinations.len();
    let core = Core::build(config, num_aux).unwrap();

    let mut handles = Vec::new();
    {
        let core = core.clone();
        handles.push(std::thread::spawn(move || run_producer(core)));
    }
    {
        let core = core.clone();
        handles.push(std::thread::spawn(move || run_main_consumer(core, main_destination, main_open)));
    }
    for dest in aux_destinations {
        let core = core.clone();
        handles.push(std::thread::spawn(move || {
            run_aux_consumer(core, dest);
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
    Vec::new()
}

#[test]
fn byte_identical_single_file_output() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.bin");
    let output_path = dir.path().join("output.bin");

    let data: Vec<u8> = (0u8..80).collect();
    fs::write(&input_path, &data).unwrap();

    let config = base_config(input_path.clone(), vec![output_path.clone()]);
    run_pipeline(config, &[]);

    let written = fs::read(&output_path).unwrap();
    assert_eq!(written, data);
}

#[test]
fn short_last_block_is_honored() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.bin");
    let output_path = dir.path().join("output.bin");

    let data = vec![b'A'; 33];
    fs::write(&input_path, &data).unwrap();

    let config = base_config(input_path.clone(), vec![output_path.clone()]);
    run_pipeline(config, &[]);

    let written = fs::read(&output_path).unwrap();
    assert_eq!(written.len(), 33);
    assert_eq!(written, data);
}

#[test]
fn two_file_destinations_both_match_input() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.bin");
    let out1 = dir.path().join("out1.bin");
    let out2 = dir.path().join("out2.bin");

    use rand::RngCore;
    let mut data = vec![0u8; 1024 * 1024];
    rand::thread_rng().fill_bytes(&mut data);
    fs::write(&input_path, &data).unwrap();

    let config = base_config(input_path.clone(), vec![out1.clone(), out2.clone()]);
    run_pipeline(config, &[]);

    assert_eq!(fs::read(&out1).unwrap(), data);
    assert_eq!(fs::read(&out2).unwrap(), data);
}

#[test]
fn file_and_md5_hash_destination() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.bin");
    let output_path = dir.path().join("output.bin");

    let data = vec![0x7Au8; 5000];
    fs::write(&input_path, &data).unwrap();

    let config = base_config(input_path.clone(), vec![output_path.clone()]);
    run_pipeline(config, &[DigestAlgorithm::Md5]);

    assert_eq!(fs::read(&output_path).unwrap(), data);
}

#[test]
fn minimum_block_count_of_five_works() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.bin");
    let output_path = dir.path().join("output.bin");

    fs::write(&input_path, vec![1u8; 100]).unwrap();

    let mut config = base_config(input_path.clone(), vec![output_path.clone()]);
    config.block_count = 5;
    config.block_size = 16;
    run_pipeline(config, &[]);

    assert_eq!(fs::read(&output_path).unwrap().len(), 100);
}

#[test]
fn single_byte_blocks_work() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.bin");
    let output_path = dir.path().join("output.bin");

    fs::write(&input_path, vec![9u8; 37]).unwrap();

    let mut config = base_config(input_path.clone(), vec![output_path.clone()]);
    config.block_size = 1;
    config.block_count = 5;
    run_pipeline(config, &[]);

    assert_eq!(fs::read(&output_path).unwrap(), vec![9u8; 37]);
}

#[test]
fn rate_limited_transfer_takes_at_least_the_expected_time() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.bin");
    let output_path = dir.path().join("output.bin");

    let data = vec![0u8; 256 * 1024];
    fs::write(&input_path, &data).unwrap();

    let mut config = base_config(input_path.clone(), vec![output_path.clone()]);
    config.write_rate_bps = 1024 * 1024;
    config.block_size = 64 * 1024;
    config.block_count = 5;

    let started = std::time::Instant::now();
    run_pipeline(config, &[]);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(fs::read(&output_path).unwrap(), data);
}

#[test]
fn empty_input_produces_empty_output() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.bin");
    let output_path = dir.path().join("output.bin");
    let mut f = fs::File::create(&input_path).unwrap();
    f.flush().unwrap();

    let config = base_config(input_path.clone(), vec![output_path.clone()]);
    run_pipeline(config, &[]);

    assert_eq!(fs::read(&output_path).unwrap().len(), 0);
}
