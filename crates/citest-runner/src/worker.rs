use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use citest_core::{
    derive_warnings, format_runtime, screenshot_failure_is_fatal, BuildInfo, Deadline, TagReport, TestResult,
    ERROR_MARKER, NOT_APPLICABLE,
};
use citest_runtime::{ContainerHandle, LaunchSpec};

use crate::collectors::{
    capture_screenshot, collect_build_info, collect_sbom, watch_startup, TagContext, BUILD_INFO_TEST, SBOM_TEST,
};
use crate::error::CiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Starting,
    AwaitingStartup,
    CollectingEvidence,
    CapturingScreenshot,
    Finalized,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Starting => "starting",
            Stage::AwaitingStartup => "awaiting_startup",
            Stage::CollectingEvidence => "collecting_evidence",
            Stage::CapturingScreenshot => "capturing_screenshot",
            Stage::Finalized => "finalized",
        }
    }
}

enum Evidence {
    BuildInfo(Result<BuildInfo, CiError>),
    Sbom(Result<String, CiError>),
}

/// Drives one tag from container launch to its finalized report.
pub struct TagWorker {
    ctx: TagContext,
}

impl TagWorker {
    pub fn new(ctx: TagContext) -> Self {
        Self { ctx }
    }

    fn enter(&self, stage: Stage) {
        debug!(tag = %self.ctx.tag, stage = stage.as_str(), "stage");
    }

    /// Test the tag. Only a launch failure (or a second finalize) is an error;
    /// every other outcome ends up in the aggregate as a report.
    pub fn run(&self) -> Result<(), CiError> {
        let started = Instant::now();
        let ctx = &self.ctx;
        let mut report = TagReport::empty(ctx.tag.clone());

        self.enter(Stage::Starting);
        let cfg = &ctx.config;
        let spec = LaunchSpec {
            env: cfg.container.env.clone(),
            volumes: cfg.container.volumes.clone(),
            privileged: cfg.container.privileged,
            ..LaunchSpec::new(ctx.image_ref())
        };
        let container = ctx
            .runtime
            .start(&spec)
            .map_err(|source| CiError::Launch { tag: ctx.tag.clone(), source })?;
        info!(tag = %ctx.tag, container = %container.id, "container launched");

        let success = self.collect(&container, &mut report);
        self.finalize(&container, report, success, started)
    }

    fn collect(&self, container: &ContainerHandle, report: &mut TagReport) -> bool {
        let ctx = &self.ctx;

        self.enter(Stage::AwaitingStartup);
        match watch_startup(ctx, container) {
            Ok(true) => {}
            Ok(false) => {
                warn!(tag = %ctx.tag, "startup marker never appeared");
                return false;
            }
            Err(e) => {
                warn!(tag = %ctx.tag, "{e}");
                return false;
            }
        }

        self.enter(Stage::CollectingEvidence);
        let (build_info, sbom) = self.collect_evidence(container);
        let mut ok = true;
        match build_info {
            Ok(info) => report.build_info = info,
            Err(e) => {
                warn!(tag = %ctx.tag, "{e}");
                ok = false;
            }
        }
        match sbom {
            Ok(table) => report.sysinfo = table,
            Err(e) => {
                warn!(tag = %ctx.tag, "{e}");
                ok = false;
            }
        }
        if !ok {
            return false;
        }

        if !ctx.config.web.screenshot {
            return true;
        }
        self.enter(Stage::CapturingScreenshot);
        thread::sleep(ctx.config.timing.startup_delay());
        let shot = capture_screenshot(ctx, container);
        report.browser_console = shot.console;
        match shot.outcome {
            Ok(file) => {
                report.screenshot = Some(file);
                true
            }
            Err(e) if screenshot_failure_is_fatal(ctx.tag.platform()) => {
                warn!(tag = %ctx.tag, "{e}");
                false
            }
            Err(e) => {
                warn!(tag = %ctx.tag, "{e} (tolerated on {})", ctx.tag.platform());
                true
            }
        }
    }

    /// Build info and the package inventory, in parallel. Each sub-task gets
    /// `sbom_timeout + join_grace`; one that has not reported by then counts
    /// as failed.
    fn collect_evidence(&self, container: &ContainerHandle) -> (Result<BuildInfo, CiError>, Result<String, CiError>) {
        let ctx = &self.ctx;
        let (tx, rx) = mpsc::channel();
        let mut build_info = None;
        let mut sbom = None;

        let info_ctx = ctx.clone();
        let info_container = container.clone();
        let info_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-buildinfo", ctx.tag))
            .spawn(move || {
                let _ = info_tx.send(Evidence::BuildInfo(collect_build_info(&info_ctx, &info_container)));
            });
        if let Err(e) = spawned {
            build_info = Some(Err(self.fail_unjoined(BUILD_INFO_TEST, format!("could not start sub-task: {e}"))));
        }

        let sbom_ctx = ctx.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-sbom", ctx.tag))
            .spawn(move || {
                let _ = tx.send(Evidence::Sbom(collect_sbom(&sbom_ctx)));
            });
        if let Err(e) = spawned {
            sbom = Some(Err(self.fail_unjoined(SBOM_TEST, format!("could not start sub-task: {e}"))));
        }

        let deadline = Deadline::after(ctx.config.timing.evidence_join_timeout());
        while build_info.is_none() || sbom.is_none() {
            match rx.recv_timeout(deadline.remaining()) {
                Ok(Evidence::BuildInfo(r)) => build_info = Some(r),
                Ok(Evidence::Sbom(r)) => sbom = Some(r),
                Err(_) => break,
            }
        }

        let timeout = ctx.config.timing.evidence_join_timeout();
        let build_info = build_info.unwrap_or_else(|| Err(self.fail_unjoined(BUILD_INFO_TEST, join_timeout_message(timeout))));
        let sbom = sbom.unwrap_or_else(|| Err(self.fail_unjoined(SBOM_TEST, join_timeout_message(timeout))));
        (build_info, sbom)
    }

    fn fail_unjoined(&self, name: &'static str, message: String) -> CiError {
        let ctx = &self.ctx;
        ctx.aggregate.record_test(&ctx.tag, TestResult::fail(name, message.clone(), NOT_APPLICABLE));
        CiError::collector(name, &ctx.tag, message)
    }

    fn finalize(
        &self,
        container: &ContainerHandle,
        mut report: TagReport,
        success: bool,
        started: Instant,
    ) -> Result<(), CiError> {
        let ctx = &self.ctx;
        self.enter(Stage::Finalized);

        report.logs = match ctx.runtime.logs(container) {
            Ok(logs) => logs,
            Err(e) => {
                warn!(tag = %ctx.tag, "failed to read final container log: {e}");
                format!("{ERROR_MARKER}: {e}")
            }
        };
        match ctx.artifacts.write_ansi_html(&ctx.tag, "log", &report.logs) {
            Ok(name) => report.html_logs = Some(name),
            Err(e) => warn!(tag = %ctx.tag, "failed to write log page: {e:#}"),
        }

        if let Err(e) = ctx.runtime.remove(container, true) {
            let err = CiError::Cleanup { tag: ctx.tag.clone(), message: e.to_string() };
            warn!("{err}");
            report.cleanup_failures.push(err.to_string());
        }

        report.warnings = derive_warnings(report.platform, &report.sysinfo);
        report.build_url = format!("https://hub.docker.com/r/{}/tags?name={}", ctx.config.image, ctx.tag);
        report.tests = ctx.aggregate.tests_for(&ctx.tag);
        report.test_success = success;
        report.runtime = format_runtime(started.elapsed());

        info!(tag = %ctx.tag, success, runtime = %report.runtime, "tag finished");
        ctx.aggregate.finalize(report)
    }
}

fn join_timeout_message(timeout: Duration) -> String {
    format!("did not finish within {}", format_runtime(timeout))
}
