//! Shared setup for end-to-end runs against the mock device

#![allow(dead_code)]

use chanmap_conformance::suite::{self, TestContext};
use chanmap_conformance::{TestConfig, TestResult, TestStatus};
use chanmap_testkit::{Device, MockDevice};

/// Short delays so scheduled activations finish in well under a second
pub fn fast_config(api_url: String) -> TestConfig {
    TestConfig {
        api_url,
        request_timeout_ms: 2000,
        poll_retries: 5,
        poll_interval_ms: 100,
        schedule_offset_ms: 400,
        lock_offset_ms: 2000,
        settle_delay_ms: 100,
        delete_wait_ms: 100,
    }
}

pub fn context(mock: &MockDevice) -> TestContext {
    TestContext::new(fast_config(mock.base_url())).unwrap()
}

/// Serve `device` and run the selected tests against it
pub fn run(device: Device, selectors: &[&str]) -> Vec<TestResult> {
    let mock = MockDevice::spawn(device).unwrap();
    let selectors: Vec<String> = selectors.iter().map(|s| s.to_string()).collect();
    suite::run_suite(&context(&mock), &selectors)
}

pub fn status_of(results: &[TestResult], selector: &str) -> TestStatus {
    results
        .iter()
        .find(|r| r.name.starts_with(selector))
        .map(|r| r.outcome.status)
        .unwrap_or_else(|| panic!("{selector} did not run"))
}
