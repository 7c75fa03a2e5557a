use std::thread;
use std::time::Instant;

use tracing::{debug, info};

use citest_core::{format_runtime, Deadline};
use citest_runtime::ContainerHandle;

use super::{TagContext, STARTUP_TEST};
use crate::error::CiError;

/// Poll the container log until a startup marker shows up.
///
/// `Ok(true)` when a marker was seen, `Ok(false)` when the window closed
/// first. A runtime error ends the watch immediately.
pub fn watch_startup(ctx: &TagContext, container: &ContainerHandle) -> Result<bool, CiError> {
    let started = Instant::now();
    let timing = &ctx.config.timing;
    let deadline = Deadline::after(timing.startup_timeout());
    let markers = &ctx.config.container.startup_markers;

    loop {
        let logs = ctx
            .runtime
            .logs(container)
            .map_err(|e| ctx.fail(STARTUP_TEST, format!("Error reading container logs: {e}"), started))?;
        if let Some(marker) = markers.iter().find(|m| logs.contains(m.as_str())) {
            info!(tag = %ctx.tag, %marker, "container started");
            ctx.pass(STARTUP_TEST, started);
            return Ok(true);
        }
        if deadline.expired() {
            let message = format!("Startup marker not found within {}", format_runtime(timing.startup_timeout()));
            ctx.fail(STARTUP_TEST, message, started);
            return Ok(false);
        }
        debug!(tag = %ctx.tag, "waiting for startup marker");
        thread::sleep(timing.poll_interval().min(deadline.remaining()));
    }
}
