// Typed view of a Jenkins `testReport/api/json` document

use serde::{Deserialize, Serialize};

/// Status of a single test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Passed,
    Failed,
    Regression,
    Skipped,
    Fixed,
    /// Any status this tool does not know about
    #[serde(other)]
    Other,
}

impl CaseStatus {
    /// Whether the case counts as a failure for flakiness purposes
    pub fn is_failure(self) -> bool {
        matches!(self, CaseStatus::Failed | CaseStatus::Regression)
    }
}

/// One test case result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(rename = "className", default)]
    pub class_name: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    pub status: CaseStatus,
}

/// An ordered group of test cases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    #[serde(default)]
    pub name: Option<String>,

    pub cases: Vec<TestCase>,
}

/// Report of one matrix configuration inside an aggregated report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildReport {
    #[serde(default)]
    pub result: Option<TestReport>,
}

/// Full test report of one build
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestReport {
    #[serde(default)]
    pub suites: Vec<TestSuite>,

    #[serde(rename = "childReports", default)]
    pub child_reports: Vec<ChildReport>,
}

impl TestReport {
    /// Parse a report document. Anything that is not the expected shape is an error.
    pub fn parse(bytes: &[u8]) -> ReportResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Every suite, including those nested in matrix child reports
    pub fn suites(&self) -> Box<dyn Iterator<Item = &TestSuite> + '_> {
        Box::new(
            self.suites.iter().chain(
                self.child_reports
                    .iter()
                    .filter_map(|child| child.result.as_ref())
                    .flat_map(|report| report.suites()),
            ),
        )
    }

    /// Every test case across all suites, in document order
    pub fn cases(&self) -> impl Iterator<Item = &TestCase> + '_ {
        self.suites().flat_map(|suite| suite.cases.iter())
    }

    /// Whether the report holds at least one suite
    pub fn has_suites(&self) -> bool {
        self.suites().next().is_some()
    }
}

/// Result type for report parsing
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors raised while reading a report document
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The document is not valid JSON of the expected shape
    #[error("invalid report document: {0}")]
    Parse(#[from] serde_json::Error),
}
