use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use citest_core::{format_runtime, Deadline};
use citest_runtime::{ContainerHandle, ContainerRuntime, LaunchSpec};

use super::{TagContext, SBOM_TEST};
use crate::error::CiError;

/// Force-removes the scanner container when dropped.
struct ScannerGuard<'a> {
    runtime: &'a dyn ContainerRuntime,
    handle: ContainerHandle,
}

impl Drop for ScannerGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.remove(&self.handle, true) {
            warn!(container = %self.handle.id, "failed to remove scanner container: {e}");
        }
    }
}

/// The package table starts at the line holding `marker`.
pub fn extract_package_table<'a>(logs: &'a str, marker: &str) -> Option<&'a str> {
    let at = logs.find(marker)?;
    let line_start = logs[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
    Some(&logs[line_start..])
}

/// Run the scanner against the tag's image and return its package table.
pub fn collect_sbom(ctx: &TagContext) -> Result<String, CiError> {
    let started = Instant::now();
    let cfg = &ctx.config;
    let deadline = Deadline::after(cfg.timing.sbom_timeout());

    let mut spec = LaunchSpec::new(cfg.scanner.image.as_str());
    spec.volumes = cfg.scanner.volumes.clone();
    spec.command = vec![ctx.image_ref()];
    let handle = ctx
        .runtime
        .start(&spec)
        .map_err(|e| ctx.fail(SBOM_TEST, format!("Failed to start scanner: {e}"), started))?;
    let scanner = ScannerGuard { runtime: ctx.runtime.as_ref(), handle };

    let table = loop {
        let logs = ctx
            .runtime
            .logs(&scanner.handle)
            .map_err(|e| ctx.fail(SBOM_TEST, format!("Error reading scanner output: {e}"), started))?;
        if let Some(table) = extract_package_table(&logs, &cfg.scanner.marker) {
            break table.to_string();
        }
        if deadline.expired() {
            let message = format!("SBOM not generated within {}", format_runtime(cfg.timing.sbom_timeout()));
            return Err(ctx.fail(SBOM_TEST, message, started));
        }
        debug!(tag = %ctx.tag, "waiting for scanner");
        thread::sleep(cfg.timing.poll_interval().min(deadline.remaining()));
    };
    drop(scanner);

    if let Err(e) = ctx.artifacts.write_ansi_html(&ctx.tag, "sbom", &table) {
        warn!(tag = %ctx.tag, "failed to write sbom page: {e:#}");
    }
    info!(tag = %ctx.tag, packages = table.lines().count().saturating_sub(1), "sbom created");
    ctx.pass(SBOM_TEST, started);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_starts_at_marker_line() {
        let logs = "loading\nNAME     VERSION  TYPE\nbusybox  1.36     apk\n";
        assert_eq!(extract_package_table(logs, "VERSION"), Some("NAME     VERSION  TYPE\nbusybox  1.36     apk\n"));
        assert_eq!(extract_package_table("VERSION x", "VERSION"), Some("VERSION x"));
        assert_eq!(extract_package_table("cataloging...", "VERSION"), None);
    }
}
