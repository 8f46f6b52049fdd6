// Core types for the CI collaborator: build outcomes and client errors

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Overall outcome of a build, collapsed to the two cases the selector cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    Failure,
}

impl BuildStatus {
    /// Map a Jenkins `result` string. Anything other than `SUCCESS` is a failure.
    pub fn from_result(result: &str) -> Self {
        if result.eq_ignore_ascii_case("success") {
            BuildStatus::Success
        } else {
            BuildStatus::Failure
        }
    }
}

/// Metadata of one finished build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// Build number within the job
    pub number: u64,

    /// Collapsed build result
    pub status: BuildStatus,

    /// Revision label read from the configured build parameter, if the build has it
    pub revision: Option<String>,

    /// All build parameters, rendered as text
    pub parameters: BTreeMap<String, String>,

    /// Build page URL as reported by the server
    pub url: Option<String>,

    /// When the build started
    pub started_at: Option<DateTime<Utc>>,
}

impl BuildOutcome {
    /// Parse a build's `api/json` document.
    ///
    /// Fails closed: a document that is not the expected shape, or a build
    /// that has no result yet, is a [`CiError::Malformed`].
    pub fn from_api(number: u64, body: &[u8], revision_parameter: &str) -> CiResult<Self> {
        let raw: RawBuild = serde_json::from_slice(body)
            .map_err(|e| CiError::Malformed(format!("build {}: {}", number, e)))?;

        let result = raw
            .result
            .ok_or_else(|| CiError::Malformed(format!("build {} has no result yet", number)))?;

        // The last action carrying a parameter list wins.
        let parameters: BTreeMap<String, String> = raw
            .actions
            .into_iter()
            .flatten()
            .filter_map(|action| action.parameters)
            .last()
            .unwrap_or_default()
            .into_iter()
            .filter_map(RawParameter::into_pair)
            .collect();

        let started_at = raw
            .timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

        Ok(Self {
            number,
            status: BuildStatus::from_result(&result),
            revision: parameters.get(revision_parameter).cloned(),
            parameters,
            url: raw.url,
            started_at,
        })
    }

    /// Whether the build ran on `target` and did not succeed
    pub fn is_failed_on(&self, target: &str) -> bool {
        self.status != BuildStatus::Success && self.revision.as_deref() == Some(target)
    }
}

#[derive(Debug, Deserialize)]
struct RawBuild {
    result: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    actions: Vec<Option<RawAction>>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(default)]
    parameters: Option<Vec<RawParameter>>,
}

#[derive(Debug, Deserialize)]
struct RawParameter {
    name: String,
    #[serde(default)]
    value: serde_json::Value,
}

impl RawParameter {
    fn into_pair(self) -> Option<(String, String)> {
        let value = match self.value {
            serde_json::Value::Null => return None,
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Some((self.name, value))
    }
}

/// Result type for CI operations
pub type CiResult<T> = Result<T, CiError>;

/// Errors raised by the CI collaborator
#[derive(Debug, thiserror::Error)]
pub enum CiError {
    /// The server answered 404
    #[error("not found: {url}")]
    NotFound { url: String },

    /// Any other non-2xx answer
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// The request did not complete within the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// The configured server URL cannot carry a path
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    /// The body was not the expected document
    #[error("malformed response: {0}")]
    Malformed(String),
}
