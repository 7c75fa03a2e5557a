use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use citest_core::{Tag, TagReport, TestResult};

use crate::error::CiError;

#[derive(Default)]
struct Slots {
    tests: HashMap<Tag, BTreeMap<String, TestResult>>,
    reports: HashMap<Tag, TagReport>,
}

/// Run-wide results, partitioned by tag. Workers only touch their own tag.
#[derive(Default)]
pub struct ResultAggregate {
    inner: Mutex<Slots>,
}

impl ResultAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `result` under its name; a later write for the same name replaces it.
    pub fn record_test(&self, tag: &Tag, result: TestResult) {
        let mut g = self.inner.lock().unwrap();
        g.tests.entry(tag.clone()).or_default().insert(result.name.clone(), result);
    }

    pub fn test(&self, tag: &Tag, name: &str) -> Option<TestResult> {
        let g = self.inner.lock().unwrap();
        g.tests.get(tag).and_then(|m| m.get(name)).cloned()
    }

    pub fn tests_for(&self, tag: &Tag) -> BTreeMap<String, TestResult> {
        let g = self.inner.lock().unwrap();
        g.tests.get(tag).cloned().unwrap_or_default()
    }

    /// Insert the finished report for its tag. Each tag is finalized at most once.
    pub fn finalize(&self, report: TagReport) -> Result<(), CiError> {
        let mut g = self.inner.lock().unwrap();
        if g.reports.contains_key(&report.tag) {
            return Err(CiError::DuplicateReport(report.tag));
        }
        g.reports.insert(report.tag.clone(), report);
        Ok(())
    }

    pub fn reports(&self) -> BTreeMap<Tag, TagReport> {
        let g = self.inner.lock().unwrap();
        g.reports.iter().map(|(t, r)| (t.clone(), r.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citest_core::TestStatus;

    #[test]
    fn test_results_round_trip_and_last_write_wins() {
        let agg = ResultAggregate::new();
        let tag = Tag::new("amd64-1.0");
        agg.record_test(&tag, TestResult::fail("Create SBOM", "timed out", "900.00s"));
        let got = agg.test(&tag, "Create SBOM").unwrap();
        assert_eq!(got.status, TestStatus::Fail);
        assert_eq!(got.message, "timed out");
        assert_eq!(got.runtime, "900.00s");

        agg.record_test(&tag, TestResult::pass("Create SBOM", "3.00s"));
        let tests = agg.tests_for(&tag);
        assert_eq!(tests.len(), 1);
        assert!(tests["Create SBOM"].passed());
        assert!(agg.tests_for(&Tag::new("arm64v8-1.0")).is_empty());
    }

    #[test]
    fn second_finalize_for_a_tag_is_rejected() {
        let agg = ResultAggregate::new();
        let tag = Tag::new("arm64v8-1.0");
        agg.finalize(TagReport::empty(tag.clone())).unwrap();
        let err = agg.finalize(TagReport::empty(tag.clone())).unwrap_err();
        assert!(matches!(err, CiError::DuplicateReport(t) if t == tag));
        assert_eq!(agg.reports().len(), 1);
    }
}
