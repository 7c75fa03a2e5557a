use std::collections::BTreeMap;

use citest_core::{BuildInfo, Platform, RunId, RunReport, Tag, TagReport, TestResult, TestStatus, ERROR_MARKER};

#[test]
fn test_tag_platform() {
    let tag = Tag::new("arm32v7-2.4.3-ls7");
    assert_eq!(tag.platform(), Platform::Arm);
    assert_eq!(tag.as_str(), "arm32v7-2.4.3-ls7");
}

#[test]
fn test_empty_tag_report_is_failed_until_finalized() {
    let report = TagReport::empty(Tag::new("riscv64-1.0"));
    assert_eq!(report.platform, Platform::Riscv64);
    assert!(!report.test_success);
    assert_eq!(report.sysinfo, ERROR_MARKER);
    assert!(report.build_info.is_error());
    assert_eq!(report.runtime, "-");
}

#[test]
fn test_error_build_info_is_uniform() {
    let info = BuildInfo::error_marker();
    for field in [&info.version, &info.created, &info.size, &info.maintainer, &info.builder, &info.tag, &info.image] {
        assert_eq!(field, ERROR_MARKER);
    }
}

#[test]
fn test_empty_message_becomes_dash() {
    let r = TestResult::new("Container startup", TestStatus::Pass, "", "-");
    assert_eq!(r.message, "-");
    assert!(r.passed());
}

#[test]
fn test_run_report_json_shape() {
    let mut tags = BTreeMap::new();
    let mut amd = TagReport::empty(Tag::new("amd64-1.0"));
    amd.test_success = true;
    amd.tests.insert("Container startup".into(), TestResult::pass("Container startup", "1.00s"));
    tags.insert(amd.tag.clone(), amd);
    let arm = TagReport::empty(Tag::new("arm64-1.0"));
    tags.insert(arm.tag.clone(), arm);

    let report = RunReport {
        run_id: RunId::from_str("r"),
        image: "linuxserver/test".into(),
        meta_tag: "1.0-ls1".into(),
        release_tag: "latest".into(),
        report_status: TestStatus::Pass,
        total_runtime: "3.00s".into(),
        screenshot_enabled: false,
        tags,
        launch_failures: BTreeMap::new(),
    };

    let v = serde_json::to_value(&report).unwrap();
    assert_eq!(v["report_status"], "PASS");
    assert_eq!(v["tags"]["amd64-1.0"]["platform"], "amd64");
    assert_eq!(v["tags"]["amd64-1.0"]["tests"]["Container startup"]["status"], "PASS");
    assert!(v["tags"]["arm64-1.0"].get("cleanup_failures").is_none());
    assert_eq!(report.failed_tags(), vec![&Tag::new("arm64-1.0")]);
}
