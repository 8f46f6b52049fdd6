use std::fmt::Write;

use super::aggregate::FlakinessReport;

/// Render the ranking as plain text, one test per entry followed by its builds
pub fn render_text(report: &FlakinessReport) -> String {
    let mut out = String::new();

    if report.records.is_empty() {
        out.push_str("No failing tests found.\n");
    }

    for (rank, record) in report.records.iter().enumerate() {
        let builds: Vec<String> = record.builds.iter().map(u64::to_string).collect();
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{:>3}. {} ({} failures)\n     builds: {}",
            rank + 1,
            record.identity,
            record.failure_count,
            builds.join(", ")
        );
    }

    let _ = writeln!(
        out,
        "\n{} reports analyzed, {} skipped, {} distinct failing tests",
        report.reports_analyzed, report.reports_skipped, report.distinct_failures
    );
    out
}

/// Render the ranking as pretty-printed JSON
pub fn render_json(report: &FlakinessReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::aggregate::{FlakinessRecord, TestIdentity};

    fn sample() -> FlakinessReport {
        FlakinessReport {
            records: vec![FlakinessRecord {
                identity: TestIdentity::new(Some("Suite.Foo"), Some("test_bar")),
                failure_count: 3,
                builds: vec![10, 11, 12],
            }],
            reports_analyzed: 4,
            reports_skipped: 1,
            distinct_failures: 1,
        }
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&sample());
        assert!(text.starts_with("  1. Suite.Foo:test_bar (3 failures)\n     builds: 10, 11, 12\n"));
        assert!(text.contains("4 reports analyzed, 1 skipped, 1 distinct failing tests"));
    }

    #[test]
    fn test_render_text_empty() {
        let text = render_text(&FlakinessReport::default());
        assert!(text.starts_with("No failing tests found."));
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["records"][0]["identity"], "Suite.Foo:test_bar");
        assert_eq!(value["records"][0]["builds"], serde_json::json!([10, 11, 12]));
        assert_eq!(value["reports_skipped"], 1);
    }
}
