//! Chanmap Core - Channel mapping conformance test library
//!
//! Drives a live channel-mapping API (`/map/*` resources of an audio/video
//! routing matrix) over HTTP and checks the behaviour the API must show:
//! resource consistency, immediate and scheduled activations, locking,
//! deletion and routing constraints.
//!
//! The device under test owns all routing logic. This crate only reads
//! snapshots of its resources, submits activations and compares JSON.

pub mod compare;
pub mod config;
pub mod http;
pub mod model;
pub mod poll;
pub mod report;
pub mod result;
pub mod suite;
pub mod tai;

pub use compare::compare_json;
pub use config::TestConfig;
pub use http::{ApiClient, ApiError, Submission};
pub use model::{Action, Activation, ActivationMode, Active, Input, Io, Output};
pub use poll::Retry;
pub use report::SuiteReport;
pub use result::{TestError, TestOutcome, TestResult, TestStatus};
pub use suite::{TestCase, TestContext};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Key of the channel mapping API in NMOS-style API listings
pub const MAPPING_API_KEY: &str = "channelmapping";

/// Leap-second offset between TAI and UTC
pub const TAI_UTC_OFFSET_SECS: i64 = 37;
