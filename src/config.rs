//! Configuration management with environment variable support.
//!
//! Settings are grouped by the stage that needs them:
//! - [`CiSettings`] for the build selector and report fetcher (network access)
//! - [`StoreSettings`] for the on-disk checkpoints shared by every stage
//! - [`AnalysisSettings`] for the selection filter and the ranking
//!
//! Only [`CiSettings`] has required values. Aggregating already persisted
//! reports works with nothing set in the environment.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `JENKINS_URL` | CI server base URL | required |
//! | `JENKINS_USERNAME` | Basic-auth user | required |
//! | `JENKINS_PASSWORD` | Basic-auth password or API token | required |
//! | `JOB_NAME` | Job whose builds are analysed | required |
//! | `JENKINS_RESPONSE_TIMEOUT` | Request timeout in seconds | `60` |
//! | `FLAKE_HUNTER_TARGET_REVISION` | Revision label a build must carry to be retained | `origin/master` |
//! | `FLAKE_HUNTER_REVISION_PARAMETER` | Build parameter holding the revision label | `sha1` |
//! | `FLAKE_HUNTER_START_BUILD` | First build number of the scanned range | `1` |
//! | `FLAKE_HUNTER_END_BUILD` | End of the scanned range (exclusive) | `2` |
//! | `FLAKE_HUNTER_STATS_FILE` | Append-only log of retained builds | `stats` |
//! | `FLAKE_HUNTER_LOG_DIR` | Directory of persisted test reports | `logs` |
//! | `FLAKE_HUNTER_TOP_N` | Number of ranked tests to print | `10` |
//!
//! # Example
//!
//! ```bash
//! export JENKINS_URL="https://ci.example.com/"
//! export JENKINS_USERNAME="bot"
//! export JENKINS_PASSWORD="api-token"
//! export JOB_NAME="backend-tests"
//! export FLAKE_HUNTER_START_BUILD=1200
//! export FLAKE_HUNTER_END_BUILD=1400
//! ```

use std::env;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Default Values
// ============================================================================

/// Default request timeout (seconds)
pub const DEFAULT_RESPONSE_TIMEOUT: u64 = 60;

/// Default revision label a retained build must carry
pub const DEFAULT_TARGET_REVISION: &str = "origin/master";

/// Default build parameter holding the revision label
pub const DEFAULT_REVISION_PARAMETER: &str = "sha1";

/// Default first build number of the scanned range
pub const DEFAULT_START_BUILD: u64 = 1;

/// Default end of the scanned range (exclusive)
pub const DEFAULT_END_BUILD: u64 = 2;

/// Default path of the retained-build log
pub const DEFAULT_STATS_FILE: &str = "stats";

/// Default directory of persisted reports
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default number of ranked tests
pub const DEFAULT_TOP_N: usize = 10;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_URL: &str = "JENKINS_URL";
pub const ENV_USERNAME: &str = "JENKINS_USERNAME";
pub const ENV_PASSWORD: &str = "JENKINS_PASSWORD";
pub const ENV_JOB_NAME: &str = "JOB_NAME";
pub const ENV_RESPONSE_TIMEOUT: &str = "JENKINS_RESPONSE_TIMEOUT";
pub const ENV_TARGET_REVISION: &str = "FLAKE_HUNTER_TARGET_REVISION";
pub const ENV_REVISION_PARAMETER: &str = "FLAKE_HUNTER_REVISION_PARAMETER";
pub const ENV_START_BUILD: &str = "FLAKE_HUNTER_START_BUILD";
pub const ENV_END_BUILD: &str = "FLAKE_HUNTER_END_BUILD";
pub const ENV_STATS_FILE: &str = "FLAKE_HUNTER_STATS_FILE";
pub const ENV_LOG_DIR: &str = "FLAKE_HUNTER_LOG_DIR";
pub const ENV_TOP_N: &str = "FLAKE_HUNTER_TOP_N";

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while assembling configuration
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A value was present but unusable
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Full configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct Config {
    /// CI connection, or why it could not be assembled. Only the stages that
    /// talk to the server turn an error here into a failure.
    pub ci: ConfigResult<CiSettings>,
    /// Persisted checkpoint locations
    pub store: StoreSettings,
    /// Selection filter and ranking parameters
    pub analysis: AnalysisSettings,
}

/// Connection settings for the CI server
#[derive(Debug, Clone)]
pub struct CiSettings {
    /// Server base URL, without trailing slashes
    pub base_url: String,
    /// Basic-auth user
    pub username: String,
    /// Basic-auth password or API token
    pub password: String,
    /// Job whose builds are queried
    pub job_name: String,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Locations of the on-disk checkpoints
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Append-only log of retained build numbers
    pub stats_file: PathBuf,
    /// Directory of per-build report documents
    pub log_dir: PathBuf,
}

/// Selection and ranking parameters
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    /// Revision label a build must carry to be retained
    pub target_revision: String,
    /// Build parameter holding the revision label
    pub revision_parameter: String,
    /// Default scanned range, end exclusive
    pub builds: Range<u64>,
    /// Number of ranked tests to report
    pub top_n: usize,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the whole configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&'static str) -> Option<String>,
    {
        Self {
            ci: CiSettings::from_lookup(&lookup),
            store: StoreSettings::from_lookup(&lookup),
            analysis: AnalysisSettings::from_lookup(&lookup),
        }
    }

    /// Create configuration with all defaults (ignoring environment).
    ///
    /// There is no default server, so the CI settings are missing.
    pub fn defaults() -> Self {
        Self {
            ci: Err(ConfigError::Missing(ENV_URL)),
            store: StoreSettings::defaults(),
            analysis: AnalysisSettings::defaults(),
        }
    }
}

impl Config {
    /// CI settings, or the reason they are unavailable
    pub fn ci_settings(&self) -> ConfigResult<&CiSettings> {
        self.ci.as_ref().map_err(Clone::clone)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl CiSettings {
    /// Read CI settings from the environment. Every connection value is required.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build CI settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let base_url = strip_trailing_slash(&required(ENV_URL)?).to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: ENV_URL,
                reason: format!("'{}' is not an http(s) URL", base_url),
            });
        }

        Ok(Self {
            base_url,
            username: required(ENV_USERNAME)?,
            password: required(ENV_PASSWORD)?,
            job_name: required(ENV_JOB_NAME)?,
            timeout: Duration::from_secs(parse_or(
                lookup(ENV_RESPONSE_TIMEOUT),
                DEFAULT_RESPONSE_TIMEOUT,
            )),
        })
    }

    /// Override the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl StoreSettings {
    /// Create store settings from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build store settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&'static str) -> Option<String>,
    {
        Self {
            stats_file: PathBuf::from(
                lookup(ENV_STATS_FILE).unwrap_or_else(|| DEFAULT_STATS_FILE.to_string()),
            ),
            log_dir: PathBuf::from(
                lookup(ENV_LOG_DIR).unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()),
            ),
        }
    }

    /// Create store settings with defaults
    pub fn defaults() -> Self {
        Self {
            stats_file: PathBuf::from(DEFAULT_STATS_FILE),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl AnalysisSettings {
    /// Create analysis settings from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build analysis settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let start = parse_or(lookup(ENV_START_BUILD), DEFAULT_START_BUILD);
        let end = parse_or(lookup(ENV_END_BUILD), DEFAULT_END_BUILD);

        Self {
            target_revision: lookup(ENV_TARGET_REVISION)
                .unwrap_or_else(|| DEFAULT_TARGET_REVISION.to_string()),
            revision_parameter: lookup(ENV_REVISION_PARAMETER)
                .unwrap_or_else(|| DEFAULT_REVISION_PARAMETER.to_string()),
            builds: start..end,
            top_n: parse_or(lookup(ENV_TOP_N), DEFAULT_TOP_N),
        }
    }

    /// Create analysis settings with defaults
    pub fn defaults() -> Self {
        Self {
            target_revision: DEFAULT_TARGET_REVISION.to_string(),
            revision_parameter: DEFAULT_REVISION_PARAMETER.to_string(),
            builds: DEFAULT_START_BUILD..DEFAULT_END_BUILD,
            top_n: DEFAULT_TOP_N,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse an optional textual value, keeping the default when absent or unparsable
fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Remove every trailing `/` from a URL
pub fn strip_trailing_slash(url: &str) -> &str {
    url.trim_end_matches('/')
}
