//! Logging setup: `tracing` + `tracing-subscriber`, with an optional
//! `tracing-appender` file layer for `-l FILE` (SPEC_FULL.md §5 "Ambient
//! stack / Logging").

use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;

/// Must be kept alive for the lifetime of the process; dropping it stops
/// the non-blocking file writer from flushing.
pub struct LogGuard(#[allow(dead_code)] Option<WorkerGuard>);

pub fn init(level: Level, log_file: Option<&Path>) -> LogGuard {
    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr.with_max_level(level));

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
            let filename = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("flowbuf.log"));
            let file_appender = tracing_appender::rolling::never(dir, filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(non_blocking.with_max_level(level));
            tracing_subscriber::registry().with(terminal_layer).with(file_layer).init();
            LogGuard(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(terminal_layer).init();
            LogGuard(None)
        }
    }
}
