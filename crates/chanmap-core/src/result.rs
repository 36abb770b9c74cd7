//! Test verdicts and the error type that aborts a test case
//!
//! A test case returns `Result<TestOutcome, TestError>`. `Ok` carries an
//! explicit verdict (PASS, FAIL, NA, MANUAL, WARNING). `Err` means the case
//! could not finish; the runner records it as FAIL with the error message.

use crate::http::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Terminal status of a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Pass,
    Fail,
    /// Property not exercised; the device exposes nothing to test
    #[serde(rename = "NA")]
    NotApplicable,
    /// Needs human judgment
    Manual,
    Warning,
}

impl TestStatus {
    /// Fixed-width marker used in text reports
    pub fn marker(self) -> &'static str {
        match self {
            TestStatus::Pass => "[PASS]",
            TestStatus::Fail => "[FAIL]",
            TestStatus::NotApplicable => "[ NA ]",
            TestStatus::Manual => "[MANU]",
            TestStatus::Warning => "[WARN]",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::NotApplicable => "NA",
            TestStatus::Manual => "MANUAL",
            TestStatus::Warning => "WARNING",
        };
        f.write_str(name)
    }
}

/// Verdict of a test case with an optional explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestOutcome {
    pub fn pass() -> Self {
        Self {
            status: TestStatus::Pass,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::with_message(TestStatus::Fail, message)
    }

    pub fn na(message: impl Into<String>) -> Self {
        Self::with_message(TestStatus::NotApplicable, message)
    }

    pub fn manual() -> Self {
        Self {
            status: TestStatus::Manual,
            message: None,
        }
    }

    pub fn manual_with(message: impl Into<String>) -> Self {
        Self::with_message(TestStatus::Manual, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_message(TestStatus::Warning, message)
    }

    fn with_message(status: TestStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }
}

/// Result of one test case in a suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub outcome: TestOutcome,
    pub elapsed_ms: u64,
}

/// Errors that abort a test case
#[derive(Error, Debug)]
pub enum TestError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Unexpected resource format: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Activation rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("{0}")]
    Failed(String),
}

impl TestError {
    pub fn failed(message: impl Into<String>) -> Self {
        TestError::Failed(message.into())
    }
}

impl From<TestError> for TestOutcome {
    fn from(err: TestError) -> Self {
        TestOutcome::fail(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_like_report_names() {
        assert_eq!(serde_json::to_string(&TestStatus::Pass).unwrap(), "\"PASS\"");
        assert_eq!(
            serde_json::to_string(&TestStatus::NotApplicable).unwrap(),
            "\"NA\""
        );
        assert_eq!(serde_json::to_string(&TestStatus::Manual).unwrap(), "\"MANUAL\"");
        assert_eq!(TestStatus::NotApplicable.to_string(), "NA");
    }

    #[test]
    fn test_error_becomes_fail() {
        let outcome: TestOutcome = TestError::failed("Outputs must have at least one channel").into();
        assert_eq!(outcome.status, TestStatus::Fail);
        assert_eq!(
            outcome.message.as_deref(),
            Some("Outputs must have at least one channel")
        );
    }

    #[test]
    fn test_result_flattens_outcome() {
        let result = TestResult {
            name: "test_13".to_string(),
            description: "constraints".to_string(),
            outcome: TestOutcome::na("no constrained outputs"),
            elapsed_ms: 12,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "NA");
        assert_eq!(json["message"], "no constrained outputs");
    }
}
