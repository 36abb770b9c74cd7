//! Blocking HTTP/JSON client for the channel mapping API
//!
//! Reads fail with [`ApiError`] on any non-2xx status. Writes return a
//! [`Submission`] so callers can pattern-match expected client-error
//! responses (400 rejected route, 423 locked) instead of catching errors.

use crate::config::TestConfig;
use reqwest::blocking::{Client, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the device under test
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP {status} from {method} {url}: {body}")]
    Status {
        method: Method,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    /// HTTP status carried by the error, if the device answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Outcome of a write request
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// 2xx; body parsed as JSON (`null` when empty)
    Accepted { status: u16, body: Value },
    /// 4xx; the device refused the request
    Rejected { status: u16, body: String },
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted { .. })
    }

    pub fn status(&self) -> u16 {
        match self {
            Submission::Accepted { status, .. } | Submission::Rejected { status, .. } => *status,
        }
    }
}

/// HTTP client bound to the base URL of one channel mapping API
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &TestConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API-relative path such as `map/inputs`
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a resource as raw JSON
    pub fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = self.url(path);
        let response = self.send(Method::GET, &url, None)?;
        let status = response.status().as_u16();
        let body = read_body(response, &url)?;
        if !(200..300).contains(&status) {
            return Err(ApiError::Status {
                method: Method::GET,
                url,
                status,
                body,
            });
        }
        parse_body(&body, &url)
    }

    /// GET a resource and deserialize it
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let value = self.get_json(path)?;
        serde_json::from_value(value).map_err(|source| ApiError::Json { url, source })
    }

    /// POST a JSON body
    pub fn post_json(&self, path: &str, body: &Value) -> Result<Submission, ApiError> {
        let url = self.url(path);
        let response = self.send(Method::POST, &url, Some(body))?;
        submission(Method::POST, response, url)
    }

    pub fn delete(&self, path: &str) -> Result<Submission, ApiError> {
        let url = self.url(path);
        let response = self.send(Method::DELETE, &url, None)?;
        submission(Method::DELETE, response, url)
    }

    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response, ApiError> {
        tracing::debug!(%method, url = %url, "API request");
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })
    }
}

fn read_body(response: Response, url: &str) -> Result<String, ApiError> {
    response.text().map_err(|source| ApiError::Transport {
        url: url.to_string(),
        source,
    })
}

fn parse_body(body: &str, url: &str) -> Result<Value, ApiError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|source| ApiError::Json {
        url: url.to_string(),
        source,
    })
}

fn submission(method: Method, response: Response, url: String) -> Result<Submission, ApiError> {
    let status = response.status().as_u16();
    let body = read_body(response, &url)?;
    tracing::debug!(%method, url = %url, status, "API response");
    match status {
        200..=299 => Ok(Submission::Accepted {
            status,
            body: parse_body(&body, &url)?,
        }),
        400..=499 => Ok(Submission::Rejected { status, body }),
        _ => Err(ApiError::Status {
            method,
            url,
            status,
            body,
        }),
    }
}
