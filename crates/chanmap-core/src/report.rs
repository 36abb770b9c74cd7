//! Suite run reports
//!
//! Human-readable text with a status marker per test, and JSON for
//! machine consumption.

use crate::result::{TestResult, TestStatus};
use crate::suite::tally;
use serde::Serialize;
use std::fmt::Write;

const STATUS_ORDER: [TestStatus; 5] = [
    TestStatus::Pass,
    TestStatus::Fail,
    TestStatus::Warning,
    TestStatus::NotApplicable,
    TestStatus::Manual,
];

/// Results of one suite run against one API
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub api_url: String,
    pub version: String,
    pub results: Vec<TestResult>,
}

impl SuiteReport {
    pub fn new(api_url: impl Into<String>, results: Vec<TestResult>) -> Self {
        Self {
            api_url: api_url.into(),
            version: crate::VERSION.to_string(),
            results,
        }
    }

    pub fn count(&self, status: TestStatus) -> usize {
        tally(&self.results, status)
    }

    /// True when any test failed; drives the process exit code
    pub fn has_failures(&self) -> bool {
        self.count(TestStatus::Fail) > 0
    }

    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Channel Mapping Conformance Report\n");
        out.push_str(&"=".repeat(60));
        out.push('\n');
        let _ = writeln!(out, "API: {}\n", self.api_url);

        for result in &self.results {
            let _ = writeln!(
                out,
                "{} {} ({} ms)",
                result.outcome.status.marker(),
                result.name,
                result.elapsed_ms
            );
            if let Some(message) = &result.outcome.message {
                let _ = writeln!(out, "       {message}");
            }
        }

        out.push('\n');
        let summary: Vec<String> = STATUS_ORDER
            .iter()
            .map(|status| format!("{status}: {}", self.count(*status)))
            .collect();
        let _ = writeln!(out, "{} tests | {}", self.results.len(), summary.join(" | "));
        out
    }

    pub fn generate_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::TestOutcome;

    fn result(name: &str, outcome: TestOutcome) -> TestResult {
        TestResult {
            name: name.to_string(),
            description: String::new(),
            outcome,
            elapsed_ms: 5,
        }
    }

    #[test]
    fn test_text_report_lists_each_test() {
        let report = SuiteReport::new(
            "http://device/x-nmos/channelmapping/v1.0/",
            vec![
                result("test_01_io_content_match", TestOutcome::pass()),
                result("test_13_violate_routing_constraints_rejected", TestOutcome::na("no constraints")),
                result("test_09_props_name", TestOutcome::manual()),
            ],
        );
        let text = report.generate_text();
        assert!(text.contains("[PASS] test_01_io_content_match"));
        assert!(text.contains("[ NA ] test_13_violate_routing_constraints_rejected"));
        assert!(text.contains("       no constraints"));
        assert!(text.contains("3 tests | PASS: 1 | FAIL: 0 | WARNING: 0 | NA: 1 | MANUAL: 1"));
        assert!(!report.has_failures());
    }

    #[test]
    fn test_failures_detected() {
        let report = SuiteReport::new("u", vec![result("test_02", TestOutcome::fail("boom"))]);
        assert!(report.has_failures());
        assert_eq!(report.count(TestStatus::Fail), 1);
    }

    #[test]
    fn test_json_report() {
        let report = SuiteReport::new("u", vec![result("test_02", TestOutcome::fail("boom"))]);
        let json: serde_json::Value = serde_json::from_str(&report.generate_json().unwrap()).unwrap();
        assert_eq!(json["api_url"], "u");
        assert_eq!(json["results"][0]["status"], "FAIL");
        assert_eq!(json["results"][0]["message"], "boom");
    }
}
