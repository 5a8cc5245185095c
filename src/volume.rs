//! Shared input/output volume-change protocol (spec §4.8, §4.9): run an
//! autoloader command, or prompt interactively, between media segments.

use std::io::{self, IsTerminal, Write};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::{FlowbufError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeSide {
    Input,
    Output,
}

impl VolumeSide {
    fn label(self) -> &'static str {
        match self {
            VolumeSide::Input => "input",
            VolumeSide::Output => "output",
        }
    }
}

pub struct AutoloadConfig {
    pub cmd: Option<String>,
    pub autoload_time: u64,
    pub no_prompt: bool,
}

/// Outcome of a completed volume-change protocol call. `Declined` is only
/// possible on the input side, when the user answers the interactive
/// prompt with "n" -- that is a clean end of input (spec §4.9), not a
/// failure, so it is kept out of the `Err` path entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeOutcome {
    Ready,
    Declined,
}

/// Run the volume-change protocol for `side`, returning once the next
/// volume is ready to be (re)opened by the caller, or `Declined` if the
/// user ended input at the prompt.
///
/// On autoloader command failure the caller is expected to disable the
/// autoloader for subsequent volumes (spec §4.8: "On autoloader command
/// failure, disable the autoloader and report the failure upward") --
/// this function reports that failure via `Err` and leaves disabling the
/// autoloader to the caller, since only the caller holds the mutable
/// config state the next call would consult.
pub fn change_volume(
    side: VolumeSide,
    destination_name: &str,
    autoload: &AutoloadConfig,
) -> Result<VolumeOutcome> {
    let started = Instant::now();

    if let Some(cmd) = &autoload.cmd {
        run_autoload_command(cmd)?;
        thread::sleep(Duration::from_secs(autoload.autoload_time));
    } else if !autoload.no_prompt && io::stdin().is_terminal() {
        if !prompt_enter(side, destination_name)? {
            info!(side = side.label(), "input ended by user at volume prompt");
            return Ok(VolumeOutcome::Declined);
        }
    } else {
        return Err(FlowbufError::volume(format!(
            "{} volume change needed for '{destination_name}' but no terminal and no autoloader are configured",
            side.label()
        )));
    }

    let elapsed = started.elapsed();
    info!(side = side.label(), seconds = elapsed.as_secs_f64(), "volume change complete");
    Ok(VolumeOutcome::Ready)
}

fn run_autoload_command(cmd: &str) -> Result<()> {
    let status = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .status()
        .map_err(|e| FlowbufError::volume(format!("failed to run autoload command: {e}")))?;
    if !status.success() {
        return Err(FlowbufError::volume(format!("autoload command exited with {status}")));
    }
    Ok(())
}

/// Prompt interactively and report whether the caller should proceed.
/// Returns `Ok(false)` only for an input-side "n" answer.
fn prompt_enter(side: VolumeSide, destination_name: &str) -> Result<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "insert next {} volume for '{destination_name}' and press ENTER ", side.label())
        .ok();
    stderr.flush().ok();
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .map_err(|e| FlowbufError::volume(format!("failed to read volume prompt: {e}")))?;
    if side == VolumeSide::Input && line.trim().eq_ignore_ascii_case("n") {
        return Ok(false);
    }
    Ok(true)
}
