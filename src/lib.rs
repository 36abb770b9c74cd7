//! Chanmap Conformance - conformance suite for channel mapping APIs
//!
//! This library re-exports the resource model, activation protocol and
//! test cases from `chanmap-core`. The `chanmap-conformance` binary runs
//! them from the command line.

pub use chanmap_core::{compare, config, http, model, poll, report, result, suite, tai};

pub use chanmap_core::{
    compare_json, Action, Activation, ActivationMode, Active, ApiClient, ApiError, Input, Io,
    Output, Retry, Submission, SuiteReport, TestCase, TestConfig, TestContext, TestError,
    TestOutcome, TestResult, TestStatus,
};
pub use chanmap_core::{MAPPING_API_KEY, TAI_UTC_OFFSET_SECS, VERSION};
