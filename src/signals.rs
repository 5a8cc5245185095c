//! SIGINT/SIGHUP wiring (spec §5 "Signal handling"; grounded on
//! `kaos-driver/src/main.rs`'s `ctrlc::set_handler`).

use std::sync::Arc;

use tracing::warn;

use crate::core::Core;
use crate::error::{FlowbufError, Result};

pub fn install(core: Arc<Core>) -> Result<()> {
    ctrlc::set_handler(move || {
        warn!("received interrupt, shutting down");
        core.counters.mark_error();
        core.counters.request_terminate();
        core.wake_everyone();
    })
    .map_err(|e| FlowbufError::unexpected(format!("failed to install signal handler: {e}")))
}
