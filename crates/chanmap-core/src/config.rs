//! Test-run configuration
//!
//! Stores the API location and the timing knobs used while waiting for the
//! device under test. Persisted as JSON; every field has a default so partial
//! files are accepted.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_api_url() -> String {
    "http://localhost:8080/x-nmos/channelmapping/v1.0/".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_poll_retries() -> u32 {
    5
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_schedule_offset_ms() -> u64 {
    2000
}

fn default_lock_offset_ms() -> u64 {
    5000
}

fn default_settle_delay_ms() -> u64 {
    2000
}

fn default_delete_wait_ms() -> u64 {
    1000
}

/// Configuration shared by every test case of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestConfig {
    /// Base URL of the channel mapping API (up to and including the version)
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Attempts made when polling for a scheduled activation to complete
    #[serde(default = "default_poll_retries")]
    pub poll_retries: u32,
    /// Fixed delay between poll attempts
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Offset used for relative and absolute scheduled activations
    #[serde(default = "default_schedule_offset_ms")]
    pub schedule_offset_ms: u64,
    /// Offset of the scheduled activation that holds the lock in the locking test
    #[serde(default = "default_lock_offset_ms")]
    pub lock_offset_ms: u64,
    /// Grace period that lets in-flight scheduled activations settle
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Time a scheduled activation is left pending before it is deleted
    #[serde(default = "default_delete_wait_ms")]
    pub delete_wait_ms: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout_ms: default_request_timeout_ms(),
            poll_retries: default_poll_retries(),
            poll_interval_ms: default_poll_interval_ms(),
            schedule_offset_ms: default_schedule_offset_ms(),
            lock_offset_ms: default_lock_offset_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            delete_wait_ms: default_delete_wait_ms(),
        }
    }
}

impl TestConfig {
    /// Default configuration pointing at `api_url`
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Load config from disk, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn schedule_offset(&self) -> Duration {
        Duration::from_millis(self.schedule_offset_ms)
    }

    pub fn lock_offset(&self) -> Duration {
        Duration::from_millis(self.lock_offset_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn delete_wait(&self) -> Duration {
        Duration::from_millis(self.delete_wait_ms)
    }
}
