use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ids::*, model::*, timing::NOT_APPLICABLE};

/// Marker stored in place of evidence that could not be collected.
pub const ERROR_MARKER: &str = "ERROR";

/// One platform/build variant of the image under test, e.g. `arm64v8-1.2.3-ls4`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn platform(&self) -> Platform {
        Platform::from_tag(&self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    pub message: String,
    pub runtime: String,
}

impl TestResult {
    pub fn new(name: impl Into<String>, status: TestStatus, message: impl Into<String>, runtime: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            name: name.into(),
            status,
            message: if message.is_empty() { NOT_APPLICABLE.to_string() } else { message },
            runtime: runtime.into(),
        }
    }

    pub fn pass(name: impl Into<String>, runtime: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Pass, NOT_APPLICABLE, runtime)
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>, runtime: impl Into<String>) -> Self {
        Self::new(name, TestStatus::Fail, message, runtime)
    }

    pub fn passed(&self) -> bool {
        self.status == TestStatus::Pass
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub created: String,
    pub size: String,
    pub maintainer: String,
    pub builder: String,
    pub tag: String,
    pub image: String,
}

impl BuildInfo {
    /// Uniform record used when build metadata cannot be read.
    pub fn error_marker() -> Self {
        let e = || ERROR_MARKER.to_string();
        Self {
            version: e(),
            created: e(),
            size: e(),
            maintainer: e(),
            builder: e(),
            tag: e(),
            image: e(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.version == ERROR_MARKER
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Warnings {
    pub dotnet: bool,
    pub uwsgi: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsoleEntry {
    pub level: String,
    pub message: String,
}

/// Finalized evidence and verdict for one tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TagReport {
    pub tag: Tag,
    pub platform: Platform,
    pub logs: String,
    /// Artifact name of the rendered container log.
    pub html_logs: Option<String>,
    pub sysinfo: String,
    pub browser_console: Option<Vec<ConsoleEntry>>,
    pub screenshot: Option<String>,
    pub warnings: Warnings,
    pub build_info: BuildInfo,
    pub tests: BTreeMap<String, TestResult>,
    pub test_success: bool,
    pub runtime: String,
    pub build_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleanup_failures: Vec<String>,
}

impl TagReport {
    /// Empty record created when a worker starts on `tag`.
    pub fn empty(tag: Tag) -> Self {
        Self {
            platform: tag.platform(),
            tag,
            logs: String::new(),
            html_logs: None,
            sysinfo: ERROR_MARKER.to_string(),
            browser_console: None,
            screenshot: None,
            warnings: Warnings::default(),
            build_info: BuildInfo::error_marker(),
            tests: BTreeMap::new(),
            test_success: false,
            runtime: NOT_APPLICABLE.to_string(),
            build_url: String::new(),
            cleanup_failures: vec![],
        }
    }
}

/// The frozen result aggregate handed to renderers and publishers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub image: String,
    pub meta_tag: String,
    pub release_tag: String,
    pub report_status: ReportStatus,
    pub total_runtime: String,
    pub screenshot_enabled: bool,
    pub tags: BTreeMap<Tag, TagReport>,
    #[serde(default)]
    pub launch_failures: BTreeMap<Tag, String>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.report_status == TestStatus::Pass
    }

    pub fn failed_tags(&self) -> Vec<&Tag> {
        self.tags
            .values()
            .filter(|r| !r.test_success)
            .map(|r| &r.tag)
            .chain(self.launch_failures.keys())
            .collect()
    }
}
