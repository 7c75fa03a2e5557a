//! Evidence collectors. Each one is bounded by its own deadline, records a
//! single [`TestResult`] into the tag's bucket and never lets a runtime or
//! browser error escape as anything but [`CiError::Collector`].

pub mod build_info;
pub mod sbom;
pub mod screenshot;
pub mod startup;

use std::sync::Arc;
use std::time::Instant;

use citest_artifacts::ArtifactStore;
use citest_browser::{HeadlessBrowser, HttpProbe};
use citest_core::{format_runtime, Tag, TestResult};
use citest_runtime::ContainerRuntime;

use crate::aggregate::ResultAggregate;
use crate::config::RunConfig;
use crate::error::CiError;

pub use build_info::collect_build_info;
pub use sbom::collect_sbom;
pub use screenshot::{capture_screenshot, Screenshot};
pub use startup::watch_startup;

pub const STARTUP_TEST: &str = "Container startup";
pub const BUILD_INFO_TEST: &str = "Get build info";
pub const SBOM_TEST: &str = "Create SBOM";
pub const SCREENSHOT_TEST: &str = "Take screenshot";

/// What a collector needs to know about the tag it works on. Cheap to clone
/// so sub-tasks can own a copy.
#[derive(Clone)]
pub struct TagContext {
    pub tag: Tag,
    pub config: Arc<RunConfig>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub browser: Arc<dyn HeadlessBrowser>,
    pub probe: Arc<dyn HttpProbe>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub aggregate: Arc<ResultAggregate>,
    /// X display the browser should render on, when one was acquired.
    pub display: Option<String>,
}

impl TagContext {
    pub fn image_ref(&self) -> String {
        self.config.image_ref(&self.tag)
    }

    pub(crate) fn pass(&self, name: &str, started: Instant) {
        self.aggregate.record_test(&self.tag, TestResult::pass(name, format_runtime(started.elapsed())));
    }

    /// Record a FAIL for `name` and build the matching collector error.
    pub(crate) fn fail(&self, name: &'static str, message: impl Into<String>, started: Instant) -> CiError {
        let message = message.into();
        self.aggregate
            .record_test(&self.tag, TestResult::fail(name, message.clone(), format_runtime(started.elapsed())));
        CiError::collector(name, &self.tag, message)
    }
}
