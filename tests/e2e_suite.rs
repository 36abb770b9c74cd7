//! E2E tests running the full suite against a well-behaved mock device
//!
//! Every automated check should pass; the property checks need a person.

mod common;

use chanmap_conformance::{SuiteReport, TestStatus};
use chanmap_testkit::fixtures;
use common::status_of;

#[test]
fn test_full_suite_passes_on_conformant_device() {
    let results = common::run(fixtures::standard(), &[]);
    assert_eq!(results.len(), 15);

    for result in &results {
        let expected = match result.name.as_str() {
            "test_09_props_name" | "test_10_props_description" => TestStatus::Manual,
            _ => TestStatus::Pass,
        };
        assert_eq!(
            result.outcome.status, expected,
            "{} gave {:?}",
            result.name, result.outcome
        );
    }

    let report = SuiteReport::new("mock", results);
    assert!(!report.has_failures());
    assert_eq!(report.count(TestStatus::Manual), 2);
}

#[test]
fn test_selected_tests_only() {
    let results = common::run(fixtures::standard(), &["test_01", "test_12"]);
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["test_01_io_content_match", "test_12_outputs_have_channels"]
    );
}

#[test]
fn test_manual_checks_list_property_values() {
    let results = common::run(fixtures::standard(), &["test_09"]);
    let message = results[0].outcome.message.as_deref().unwrap_or_default();
    assert!(message.contains("input in1: \"Mic\""), "{message}");
    assert!(message.contains("output out2: \"Return\""), "{message}");
}

#[test]
fn test_unconstrained_device_is_not_applicable() {
    let results = common::run(
        fixtures::unconstrained(),
        &["test_13", "test_14", "test_15", "test_08"],
    );
    assert_eq!(status_of(&results, "test_13"), TestStatus::NotApplicable);
    assert_eq!(status_of(&results, "test_14"), TestStatus::NotApplicable);
    assert_eq!(status_of(&results, "test_15"), TestStatus::NotApplicable);
    assert_eq!(status_of(&results, "test_08"), TestStatus::Pass);
}

#[test]
fn test_reentrant_loop_detected() {
    let results = common::run(fixtures::re_entrant_loop(), &["test_08"]);
    assert_eq!(status_of(&results, "test_08"), TestStatus::Fail);
    let message = results[0].outcome.message.as_deref().unwrap_or_default();
    assert!(message.contains("input in1 and output out2"), "{message}");
}

#[test]
fn test_unreachable_device_fails_every_automated_check() {
    let config = common::fast_config("http://127.0.0.1:9/x-nmos/channelmapping/v1.0/".to_string());
    let ctx = chanmap_conformance::TestContext::new(config).unwrap();
    let results = chanmap_conformance::suite::run_suite(&ctx, &["test_01".to_string(), "test_09".to_string()]);
    assert_eq!(status_of(&results, "test_01"), TestStatus::Fail);
    assert_eq!(status_of(&results, "test_09"), TestStatus::Manual);
}
