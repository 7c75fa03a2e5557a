use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use tracing::{error, info, info_span};

use citest_artifacts::ArtifactStore;
use citest_browser::{HeadlessBrowser, HttpProbe, VirtualDisplay};
use citest_core::{compute_verdict, format_runtime, RunId, RunReport, Tag};
use citest_runtime::ContainerRuntime;

use crate::aggregate::ResultAggregate;
use crate::collectors::TagContext;
use crate::config::RunConfig;
use crate::error::CiError;
use crate::worker::TagWorker;

/// External systems a run talks to.
#[derive(Clone)]
pub struct Capabilities {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub browser: Arc<dyn HeadlessBrowser>,
    pub probe: Arc<dyn HttpProbe>,
    pub display: Arc<dyn VirtualDisplay>,
}

pub struct Coordinator {
    config: Arc<RunConfig>,
    caps: Capabilities,
    artifacts: Arc<dyn ArtifactStore>,
}

impl Coordinator {
    pub fn new(config: RunConfig, caps: Capabilities, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { config: Arc::new(config), caps, artifacts }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Test every configured tag and build the run report.
    pub fn run(&self) -> Result<RunReport, CiError> {
        let cfg = &self.config;
        let version = self
            .caps
            .runtime
            .ping()
            .map_err(|e| CiError::Preflight(format!("container runtime unreachable: {e}")))?;
        info!(%version, image = %cfg.image, "container runtime ready");

        let lease = if cfg.web.screenshot {
            let lease = self
                .caps
                .display
                .acquire()
                .map_err(|e| CiError::Preflight(format!("virtual display: {e}")))?;
            Some(lease)
        } else {
            None
        };
        let display = lease.as_ref().and_then(|l| l.name().map(str::to_string));

        let tags = cfg.tag_list();
        let aggregate = Arc::new(ResultAggregate::new());
        let failures = Mutex::new(BTreeMap::new());
        let cursor = AtomicUsize::new(0);
        let pool = cfg.worker_concurrency.clamp(1, tags.len().max(1));

        info!(tags = tags.len(), workers = pool, "dispatching");
        let started = Instant::now();
        let spawned = thread::scope(|s| {
            let mut spawned = 0;
            for i in 0..pool {
                let res = thread::Builder::new()
                    .name(format!("citest-worker-{i}"))
                    .spawn_scoped(s, || self.drain(&tags, &cursor, &aggregate, &failures, display.as_deref()));
                match res {
                    Ok(_) => spawned += 1,
                    Err(e) => error!("failed to spawn worker {i}: {e}"),
                }
            }
            spawned
        });
        drop(lease);
        if spawned == 0 {
            return Err(CiError::Preflight("no worker thread could be started".into()));
        }
        let total_runtime = format_runtime(started.elapsed());

        let tags = aggregate.reports();
        let launch_failures = failures.into_inner().unwrap();
        let outcomes = tags
            .values()
            .map(|r| (r.platform, r.test_success))
            .chain(launch_failures.keys().map(|t: &Tag| (t.platform(), false)));
        let report_status = compute_verdict(outcomes, cfg.verdict_policy());
        info!(status = %report_status, runtime = %total_runtime, "run finished");

        Ok(RunReport {
            run_id: RunId::new(),
            image: cfg.image.clone(),
            meta_tag: cfg.meta_tag.clone(),
            release_tag: cfg.release_tag.clone(),
            report_status,
            total_runtime,
            screenshot_enabled: cfg.web.screenshot,
            tags,
            launch_failures,
        })
    }

    fn drain(
        &self,
        tags: &[Tag],
        cursor: &AtomicUsize,
        aggregate: &Arc<ResultAggregate>,
        failures: &Mutex<BTreeMap<Tag, String>>,
        display: Option<&str>,
    ) {
        loop {
            let Some(tag) = tags.get(cursor.fetch_add(1, Ordering::SeqCst)) else {
                break;
            };
            let _span = info_span!("tag", tag = %tag).entered();
            let worker = TagWorker::new(self.context_for(tag, aggregate, display));
            if let Err(e) = worker.run() {
                error!("{e}");
                failures.lock().unwrap().insert(tag.clone(), e.to_string());
            }
        }
    }

    fn context_for(&self, tag: &Tag, aggregate: &Arc<ResultAggregate>, display: Option<&str>) -> TagContext {
        TagContext {
            tag: tag.clone(),
            config: self.config.clone(),
            runtime: self.caps.runtime.clone(),
            browser: self.caps.browser.clone(),
            probe: self.caps.probe.clone(),
            artifacts: self.artifacts.clone(),
            aggregate: aggregate.clone(),
            display: display.map(str::to_string),
        }
    }
}
