use crate::{Platform, ReportStatus, TestStatus, Warnings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerdictPolicy {
    /// A passing native (amd64) tag lifts a FAIL caused by emulated platforms.
    pub native_override: bool,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self { native_override: true }
    }
}

/// Overall run status from per-tag `(platform, test_success)` outcomes.
///
/// Any failed tag fails the run. With `native_override` set, one passing amd64
/// tag turns that FAIL back into PASS. The override never turns PASS into FAIL.
pub fn compute_verdict<I>(outcomes: I, policy: VerdictPolicy) -> ReportStatus
where
    I: IntoIterator<Item = (Platform, bool)>,
{
    let mut all_passed = true;
    let mut native_passed = false;
    for (platform, ok) in outcomes {
        all_passed &= ok;
        native_passed |= ok && platform.is_native();
    }
    if all_passed {
        return TestStatus::Pass;
    }
    if policy.native_override && native_passed {
        return TestStatus::Pass;
    }
    TestStatus::Fail
}

/// Whether a screenshot failure on `platform` fails the tag.
pub fn screenshot_failure_is_fatal(platform: Platform) -> bool {
    platform.is_native()
}

/// Advisory flags derived from the tag platform and its package inventory.
pub fn derive_warnings(platform: Platform, sysinfo: &str) -> Warnings {
    let dotnet = platform == Platform::Arm && (sysinfo.contains("icu-libs") || sysinfo.contains("libicu"));
    let uwsgi = platform.is_arm() && sysinfo.contains("uwsgi");
    Warnings { dotnet, uwsgi }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ON: VerdictPolicy = VerdictPolicy { native_override: true };
    const OFF: VerdictPolicy = VerdictPolicy { native_override: false };

    #[test]
    fn all_pass_is_pass() {
        let v = compute_verdict([(Platform::Amd64, true), (Platform::Arm64, true)], ON);
        assert_eq!(v, TestStatus::Pass);
    }

    #[test]
    fn native_pass_lifts_emulated_failure() {
        let v = compute_verdict([(Platform::Amd64, true), (Platform::Arm64, false)], ON);
        assert_eq!(v, TestStatus::Pass);
    }

    #[test]
    fn native_failure_is_never_lifted() {
        let v = compute_verdict([(Platform::Amd64, false), (Platform::Arm64, true)], ON);
        assert_eq!(v, TestStatus::Fail);
    }

    #[test]
    fn override_disabled_keeps_failure() {
        let v = compute_verdict([(Platform::Amd64, true), (Platform::Arm64, false)], OFF);
        assert_eq!(v, TestStatus::Fail);
    }

    #[test]
    fn emulated_only_failure_without_native_tag_fails() {
        let v = compute_verdict([(Platform::Arm, false), (Platform::Riscv64, true)], ON);
        assert_eq!(v, TestStatus::Fail);
    }

    #[test]
    fn screenshot_tolerance_is_non_native() {
        assert!(screenshot_failure_is_fatal(Platform::Amd64));
        assert!(!screenshot_failure_is_fatal(Platform::Arm64));
        assert!(!screenshot_failure_is_fatal(Platform::Riscv64));
    }

    #[test]
    fn warnings_follow_platform_and_packages() {
        let w = derive_warnings(Platform::Arm, "icu-libs 74.2-r0\nuwsgi 2.0");
        assert!(w.dotnet && w.uwsgi);
        let w = derive_warnings(Platform::Arm64, "icu-libs 74.2-r0\nuwsgi 2.0");
        assert!(!w.dotnet && w.uwsgi);
        let w = derive_warnings(Platform::Amd64, "icu-libs uwsgi");
        assert_eq!(w, Warnings::default());
    }
}
