//! Report fetching: persist the test report of every retained build that is
//! not on disk yet.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::ci::CiSource;
use crate::report::TestReport;
use crate::store::{ReportStore, StoreError, StoreResult};

/// Outcome of a fetch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSummary {
    /// Reports downloaded and written during this pass
    pub fetched: usize,

    /// Reports that were already persisted
    pub already_present: usize,

    /// Builds whose report could not be fetched, validated or written
    pub skipped: usize,
}

/// Fetch and persist the report of every build in `builds` that `store` lacks.
///
/// The document is written byte-for-byte as received once it validates as a
/// test report. Per-build failures leave nothing on disk and do not stop the
/// pass. Only a failure to create the store directory is returned as an error.
pub fn fetch_missing<C: CiSource + ?Sized>(
    client: &C,
    store: &ReportStore,
    builds: &BTreeSet<u64>,
) -> StoreResult<FetchSummary> {
    store.init()?;
    let mut summary = FetchSummary::default();

    for &build in builds {
        if store.contains(build) {
            summary.already_present += 1;
            continue;
        }

        let bytes = match client.build_report(build) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(build, error = %e, "report unavailable, skipping");
                summary.skipped += 1;
                continue;
            }
        };

        if let Err(e) = TestReport::parse(&bytes) {
            debug!(build, error = %e, "report failed validation, skipping");
            summary.skipped += 1;
            continue;
        }

        match store.write(build, &bytes) {
            Ok(()) => summary.fetched += 1,
            Err(StoreError::AlreadyExists(_)) => summary.already_present += 1,
            Err(e) => {
                debug!(build, error = %e, "could not persist report, skipping");
                summary.skipped += 1;
            }
        }
    }

    info!(
        fetched = summary.fetched,
        already_present = summary.already_present,
        skipped = summary.skipped,
        "report fetch finished"
    );
    Ok(summary)
}
