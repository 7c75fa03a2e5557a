use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use citest_browser::{BrowserSession, SessionOptions};
use citest_core::{ConsoleEntry, Deadline};
use citest_runtime::ContainerHandle;

use super::{TagContext, SCREENSHOT_TEST};
use crate::error::CiError;

/// Result of one screenshot attempt window. Console output is kept even when
/// the capture failed.
#[derive(Debug)]
pub struct Screenshot {
    pub console: Option<Vec<ConsoleEntry>>,
    pub outcome: Result<String, CiError>,
}

pub fn capture_screenshot(ctx: &TagContext, container: &ContainerHandle) -> Screenshot {
    let started = Instant::now();
    let cfg = &ctx.config;
    let deadline = Deadline::after(cfg.timing.screenshot_timeout());

    let ip = match ctx.runtime.inspect(container) {
        Ok(attrs) => attrs.ip_address.filter(|ip| !ip.is_empty()),
        Err(e) => {
            let err = ctx.fail(SCREENSHOT_TEST, format!("Failed to inspect container: {e}"), started);
            return Screenshot { console: None, outcome: Err(err) };
        }
    };
    let Some(ip) = ip else {
        let err = ctx.fail(SCREENSHOT_TEST, "Container has no IP address", started);
        return Screenshot { console: None, outcome: Err(err) };
    };

    let options = SessionOptions {
        display: ctx.display.clone(),
        settle_delay: cfg.timing.settle_delay(),
        ..SessionOptions::default()
    };
    let mut session = match ctx.browser.new_session(&options) {
        Ok(s) => s,
        Err(e) => {
            let err = ctx.fail(SCREENSHOT_TEST, format!("Failed to start browser: {e}"), started);
            return Screenshot { console: None, outcome: Err(err) };
        }
    };

    let outcome = attempt_until_deadline(ctx, session.as_mut(), &ip, deadline, started);
    let console = session.console_logs();
    if let Err(e) = session.quit() {
        warn!(tag = %ctx.tag, "failed to close browser session: {e}");
    }
    Screenshot { console: Some(console), outcome }
}

fn attempt_until_deadline(
    ctx: &TagContext,
    session: &mut dyn BrowserSession,
    ip: &str,
    deadline: Deadline,
    started: Instant,
) -> Result<String, CiError> {
    let timing = &ctx.config.timing;
    let web = &ctx.config.web;
    let endpoint = web.endpoint(ip);
    let probe_url = web.probe_url(ip);
    let file = format!("{}.png", ctx.tag);
    let path = ctx.artifacts.path_for(&file);
    let mut last_error = String::from("no attempt made");

    while !deadline.expired() {
        let attempt = ctx
            .probe
            .probe(&probe_url)
            .and_then(|_| session.navigate(&endpoint))
            .and_then(|_| session.screenshot(&path));
        match attempt {
            Ok(()) if path.is_file() => {
                info!(tag = %ctx.tag, %file, "screenshot captured");
                ctx.pass(SCREENSHOT_TEST, started);
                return Ok(file);
            }
            Ok(()) => last_error = format!("{} was not written", path.display()),
            Err(e) => last_error = e.to_string(),
        }
        debug!(tag = %ctx.tag, "screenshot attempt failed: {last_error}");
        thread::sleep(timing.retry_interval().min(deadline.remaining()));
    }
    Err(ctx.fail(SCREENSHOT_TEST, format!("Unable to take screenshot: {last_error}"), started))
}
