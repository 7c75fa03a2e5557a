use std::fmt;

use serde::{Deserialize, Serialize};

/// CPU architecture class a tag is built for.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Amd64,
    Arm64,
    Arm,
    Riscv64,
}

impl Platform {
    /// Derive the platform from a tag prefix. Unknown prefixes fall back to amd64.
    pub fn from_tag(tag: &str) -> Self {
        // arm64 must be checked before the bare arm prefix
        if tag.starts_with("amd64") {
            Platform::Amd64
        } else if tag.starts_with("arm64v8") || tag.starts_with("arm64") {
            Platform::Arm64
        } else if tag.starts_with("arm32v7") || tag.starts_with("arm") {
            Platform::Arm
        } else if tag.starts_with("riscv64") {
            Platform::Riscv64
        } else {
            Platform::Amd64
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Amd64 => "amd64",
            Platform::Arm64 => "arm64",
            Platform::Arm => "arm",
            Platform::Riscv64 => "riscv64",
        }
    }

    /// The platform the release gate trusts; everything else runs emulated.
    pub fn is_native(&self) -> bool {
        matches!(self, Platform::Amd64)
    }

    pub fn is_arm(&self) -> bool {
        matches!(self, Platform::Arm | Platform::Arm64)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Pass,
    Fail,
}

impl TestStatus {
    pub fn from_success(ok: bool) -> Self {
        if ok {
            TestStatus::Pass
        } else {
            TestStatus::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall verdict of a run; shares its wire form with [`TestStatus`].
pub type ReportStatus = TestStatus;
