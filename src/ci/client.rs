//! Jenkins JSON API client.
//!
//! All HTTP status interpretation happens here; callers only see
//! [`CiError`] variants.

use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::types::{BuildOutcome, CiError, CiResult};
use crate::config::CiSettings;

/// Source of build metadata and test reports for one job.
///
/// Implementations:
/// - [`JenkinsClient`] talks to a live server
/// - test doubles serve canned documents
pub trait CiSource {
    /// Fetch and parse one build's outcome
    fn build_outcome(&self, build: u64) -> CiResult<BuildOutcome>;

    /// Fetch one build's test report exactly as the server sent it
    fn build_report(&self, build: u64) -> CiResult<Vec<u8>>;
}

/// Blocking client for a single Jenkins job
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    http: Client,
    base: Url,
    settings: CiSettings,
    revision_parameter: String,
}

impl JenkinsClient {
    /// Build a client; `revision_parameter` names the build parameter holding the revision label
    pub fn new(settings: CiSettings, revision_parameter: impl Into<String>) -> CiResult<Self> {
        let base = Url::parse(&settings.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| CiError::InvalidUrl(settings.base_url.clone()))?;

        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("flake-hunter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base,
            settings,
            revision_parameter: revision_parameter.into(),
        })
    }

    /// Check that the server is reachable and accepts our credentials.
    pub fn check_health(&self) -> CiResult<()> {
        let url = self.url_with(&["api", "json"], None);
        self.get(url.as_str()).map(|_| ())
    }

    /// `<base>/job/<job>/<build>/api/json`
    ///
    /// A job inside folders (`team/backend`) maps to `job/team/job/backend`.
    /// Every segment is percent-encoded.
    pub fn build_url(&self, build: u64) -> String {
        self.url_with(&["api", "json"], Some(build)).into()
    }

    /// `<base>/job/<job>/<build>/testReport/api/json`
    pub fn report_url(&self, build: u64) -> String {
        self.url_with(&["testReport", "api", "json"], Some(build)).into()
    }

    fn url_with(&self, tail: &[&str], build: Option<u64>) -> Url {
        let mut url = self.base.clone();
        {
            // cannot_be_a_base URLs are rejected in new()
            let Ok(mut segments) = url.path_segments_mut() else {
                return url;
            };
            segments.pop_if_empty();
            if let Some(build) = build {
                for folder in self.settings.job_name.split('/').filter(|s| !s.is_empty()) {
                    segments.push("job").push(folder);
                }
                segments.push(&build.to_string());
            }
            segments.extend(tail);
        }
        url
    }

    fn get(&self, url: &str) -> CiResult<Vec<u8>> {
        debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .basic_auth(&self.settings.username, Some(&self.settings.password))
            .send()
            .map_err(|e| self.transport_error(e))?;

        let response = check_status(url, response)?;
        let body = response.bytes().map_err(|e| self.transport_error(e))?;
        Ok(body.to_vec())
    }

    fn transport_error(&self, err: reqwest::Error) -> CiError {
        if err.is_timeout() {
            CiError::Timeout(self.settings.timeout)
        } else {
            CiError::Network(err.to_string())
        }
    }
}

fn check_status(url: &str, response: Response) -> CiResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else if status == StatusCode::NOT_FOUND {
        Err(CiError::NotFound {
            url: url.to_string(),
        })
    } else {
        Err(CiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

impl CiSource for JenkinsClient {
    fn build_outcome(&self, build: u64) -> CiResult<BuildOutcome> {
        let body = self.get(&self.build_url(build))?;
        BuildOutcome::from_api(build, &body, &self.revision_parameter)
    }

    fn build_report(&self, build: u64) -> CiResult<Vec<u8>> {
        self.get(&self.report_url(build))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(base_url: &str) -> CiSettings {
        CiSettings {
            base_url: base_url.to_string(),
            username: "bot".to_string(),
            password: "secret".to_string(),
            job_name: "backend".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_job_names_are_encoded() {
        let mut with_space = settings("http://ci.example.com/jenkins/");
        with_space.job_name = "my job".to_string();
        let client = JenkinsClient::new(with_space, "sha1").unwrap();
        assert_eq!(
            client.build_url(7),
            "http://ci.example.com/jenkins/job/my%20job/7/api/json"
        );

        let mut in_folder = settings("http://ci.example.com");
        in_folder.job_name = "team/backend".to_string();
        let client = JenkinsClient::new(in_folder, "sha1").unwrap();
        assert_eq!(
            client.report_url(7),
            "http://ci.example.com/job/team/job/backend/7/testReport/api/json"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = JenkinsClient::new(settings("not a url"), "sha1").unwrap_err();
        assert!(matches!(err, CiError::InvalidUrl(_)));
    }

    #[test]
    fn test_urls() {
        let client = JenkinsClient::new(settings("http://ci.example.com"), "sha1").unwrap();
        assert_eq!(
            client.build_url(42),
            "http://ci.example.com/job/backend/42/api/json"
        );
        assert_eq!(
            client.report_url(42),
            "http://ci.example.com/job/backend/42/testReport/api/json"
        );
    }
}
