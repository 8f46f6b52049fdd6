pub mod client;
pub mod types;

pub use client::{CiSource, JenkinsClient};
pub use types::{BuildOutcome, BuildStatus, CiError, CiResult};
