//! Flake Hunter - find the tests that fail most often in a Jenkins job.
//!
//! The pipeline has three stages, each checkpointed on disk so a run can be
//! interrupted and resumed:
//! - Build selection: keep the failed builds of a target revision
//! - Report fetching: persist each retained build's test report
//! - Aggregation: rank test cases by how often they failed
//!
//! # Example
//!
//! ```rust,no_run
//! use flake_hunter::report::render_text;
//! use flake_hunter::{ReportStore, analyze_store};
//!
//! let store = ReportStore::new("logs");
//! let report = analyze_store(&store, 10).unwrap();
//! print!("{}", render_text(&report));
//! ```

pub mod ci;
pub mod config;
pub mod fetcher;
pub mod pipeline;
pub mod report;
pub mod selector;
pub mod store;

// Re-export CI client types
pub use ci::{BuildOutcome, BuildStatus, CiError, CiResult, CiSource, JenkinsClient};

// Re-export configuration
pub use config::{AnalysisSettings, CiSettings, Config, ConfigError, StoreSettings};

// Re-export stages
pub use fetcher::{FetchSummary, fetch_missing};
pub use pipeline::{ConnectError, RunOutcome, analyze_store, connect, run};
pub use selector::{Selection, select};

// Re-export aggregation types
pub use report::{
    FlakinessRecord, FlakinessReport, Tally, TestCase, TestIdentity, TestReport, aggregate,
    aggregate_raw,
};

// Re-export persistence
pub use store::{ReportStore, StatsLog, StoreError};
