pub mod aggregate;
pub mod render;
pub mod types;

pub use aggregate::{
    FlakinessRecord, FlakinessReport, IDENTITY_SEPARATOR, Tally, TestIdentity, aggregate,
    aggregate_raw,
};
pub use render::{render_json, render_text};
pub use types::{CaseStatus, ChildReport, ReportError, ReportResult, TestCase, TestReport, TestSuite};
