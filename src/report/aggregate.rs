//! Flakiness aggregation.
//!
//! Turns a sequence of `(build number, report)` pairs into a ranking of the
//! test cases that failed most often, each with the builds it failed in.
//!
//! Aggregation is a fold: [`Tally::absorb`] consumes one report and returns
//! the updated tally, [`Tally::finish`] sorts and truncates it into an
//! immutable [`FlakinessReport`].
//!
//! Provenance order is first-seen order, so callers should feed reports in
//! ascending build number to get reproducible output.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::types::{TestCase, TestReport};

/// Joins class name and case name in a [`TestIdentity`]
pub const IDENTITY_SEPARATOR: char = ':';

/// Canonical key of a test case across builds: `<class name>:<case name>`.
///
/// A missing class or case name renders as an empty segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestIdentity(String);

impl TestIdentity {
    pub fn new(class_name: Option<&str>, case_name: Option<&str>) -> Self {
        let class_name = class_name.unwrap_or_default();
        let case_name = case_name.unwrap_or_default();
        let mut key = String::with_capacity(class_name.len() + case_name.len() + 1);
        key.push_str(class_name);
        key.push(IDENTITY_SEPARATOR);
        key.push_str(case_name);
        Self(key)
    }

    pub fn of(case: &TestCase) -> Self {
        Self::new(case.class_name.as_deref(), case.name.as_deref())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure history of one test identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlakinessRecord {
    pub identity: TestIdentity,

    /// Number of failing case results observed
    pub failure_count: usize,

    /// Build numbers of those failures, in first-seen order, duplicates kept
    pub builds: Vec<u64>,
}

/// Ranked outcome of an aggregation run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlakinessReport {
    /// Most failing identities, highest count first
    pub records: Vec<FlakinessRecord>,

    /// Reports that contributed to the ranking
    pub reports_analyzed: usize,

    /// Reports ignored because they were unreadable or had no suites
    pub reports_skipped: usize,

    /// Distinct failing identities before truncation
    pub distinct_failures: usize,
}

impl FlakinessReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Running state of an aggregation
#[derive(Debug, Clone, Default)]
pub struct Tally {
    failures: IndexMap<TestIdentity, Vec<u64>>,
    reports_analyzed: usize,
    reports_skipped: usize,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every failing case of `report` against `build`.
    ///
    /// A report without any suite is counted as skipped.
    pub fn absorb(mut self, build: u64, report: &TestReport) -> Self {
        if !report.has_suites() {
            debug!(build, "report has no test suites, skipping");
            self.reports_skipped += 1;
            return self;
        }

        for case in report.cases().filter(|case| case.status.is_failure()) {
            self.failures
                .entry(TestIdentity::of(case))
                .or_default()
                .push(build);
        }
        self.reports_analyzed += 1;
        self
    }

    /// Parse `raw` and absorb it; unparsable documents are counted as skipped
    pub fn absorb_raw(mut self, build: u64, raw: &[u8]) -> Self {
        match TestReport::parse(raw) {
            Ok(report) => self.absorb(build, &report),
            Err(e) => {
                debug!(build, error = %e, "unreadable report, skipping");
                self.reports_skipped += 1;
                self
            }
        }
    }

    /// Record a report that could not even be read
    pub fn skip(mut self) -> Self {
        self.reports_skipped += 1;
        self
    }

    /// Rank identities by failure count (ties keep first-seen order) and keep the top `top_n`
    pub fn finish(self, top_n: usize) -> FlakinessReport {
        let distinct_failures = self.failures.len();
        let mut records: Vec<FlakinessRecord> = self
            .failures
            .into_iter()
            .map(|(identity, builds)| FlakinessRecord {
                identity,
                failure_count: builds.len(),
                builds,
            })
            .collect();

        // sort_by is stable, which preserves first-seen order among ties
        records.sort_by(|a, b| b.failure_count.cmp(&a.failure_count));
        records.truncate(top_n);

        FlakinessReport {
            records,
            reports_analyzed: self.reports_analyzed,
            reports_skipped: self.reports_skipped,
            distinct_failures,
        }
    }
}

/// Aggregate parsed reports into a ranking of at most `top_n` identities
pub fn aggregate<'a, I>(reports: I, top_n: usize) -> FlakinessReport
where
    I: IntoIterator<Item = (u64, &'a TestReport)>,
{
    reports
        .into_iter()
        .fold(Tally::new(), |tally, (build, report)| tally.absorb(build, report))
        .finish(top_n)
}

/// Aggregate raw report documents, skipping any that do not parse
pub fn aggregate_raw<I, R>(reports: I, top_n: usize) -> FlakinessReport
where
    I: IntoIterator<Item = (u64, R)>,
    R: AsRef<[u8]>,
{
    reports
        .into_iter()
        .fold(Tally::new(), |tally, (build, raw)| {
            tally.absorb_raw(build, raw.as_ref())
        })
        .finish(top_n)
}
