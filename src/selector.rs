//! Build selection: scan a range of build numbers and keep the failed builds
//! of the target revision.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;
use tracing::{debug, info};

use crate::ci::CiSource;

/// Outcome of a selection pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Retained build numbers, ascending
    pub retained: BTreeSet<u64>,

    /// Builds whose outcome was fetched and parsed
    pub examined: usize,

    /// Builds that could not be fetched or parsed
    pub skipped: usize,
}

/// Query every build in `builds` (end exclusive) and keep those that ran on
/// `target_revision` without succeeding.
///
/// A build that cannot be fetched or parsed is skipped; the scan always
/// covers the whole range.
pub fn select<C: CiSource + ?Sized>(
    client: &C,
    builds: Range<u64>,
    target_revision: &str,
) -> Selection {
    let mut selection = Selection::default();

    for build in builds {
        match client.build_outcome(build) {
            Ok(outcome) => {
                selection.examined += 1;
                if outcome.is_failed_on(target_revision) {
                    debug!(build, "retained");
                    selection.retained.insert(build);
                }
            }
            Err(e) => {
                debug!(build, error = %e, "skipping build");
                selection.skipped += 1;
            }
        }
    }

    info!(
        retained = selection.retained.len(),
        examined = selection.examined,
        skipped = selection.skipped,
        "build selection finished"
    );
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci::{BuildOutcome, BuildStatus, CiError, CiResult};
    use std::collections::{BTreeMap, HashMap};

    struct FakeCi {
        builds: HashMap<u64, BuildOutcome>,
    }

    impl FakeCi {
        fn new(builds: &[(u64, BuildStatus, Option<&str>)]) -> Self {
            let builds = builds
                .iter()
                .map(|&(number, status, revision)| {
                    let outcome = BuildOutcome {
                        number,
                        status,
                        revision: revision.map(str::to_string),
                        parameters: BTreeMap::new(),
                        url: None,
                        started_at: None,
                    };
                    (number, outcome)
                })
                .collect();
            Self { builds }
        }
    }

    impl CiSource for FakeCi {
        fn build_outcome(&self, build: u64) -> CiResult<BuildOutcome> {
            self.builds.get(&build).cloned().ok_or(CiError::NotFound {
                url: format!("build/{}", build),
            })
        }

        fn build_report(&self, _build: u64) -> CiResult<Vec<u8>> {
            unreachable!("the selector never fetches reports")
        }
    }

    #[test]
    fn test_keeps_failed_builds_on_target() {
        let ci = FakeCi::new(&[
            (5, BuildStatus::Failure, Some("origin/feature")),
            (6, BuildStatus::Failure, Some("origin/master")),
            (7, BuildStatus::Failure, Some("origin/feature")),
        ]);
        let selection = select(&ci, 5..8, "origin/master");
        assert_eq!(selection.retained, BTreeSet::from([6]));
        assert_eq!(selection.examined, 3);
        assert_eq!(selection.skipped, 0);
    }

    #[test]
    fn test_successful_and_unlabelled_builds_are_dropped() {
        let ci = FakeCi::new(&[
            (1, BuildStatus::Success, Some("origin/master")),
            (2, BuildStatus::Failure, None),
            (3, BuildStatus::Failure, Some("origin/master")),
        ]);
        let selection = select(&ci, 1..4, "origin/master");
        assert_eq!(selection.retained, BTreeSet::from([3]));
    }

    #[test]
    fn test_unreachable_builds_do_not_abort() {
        let ci = FakeCi::new(&[
            (10, BuildStatus::Failure, Some("origin/master")),
            (13, BuildStatus::Failure, Some("origin/master")),
        ]);
        let selection = select(&ci, 10..14, "origin/master");
        assert_eq!(selection.retained, BTreeSet::from([10, 13]));
        assert_eq!(selection.examined, 2);
        assert_eq!(selection.skipped, 2);
    }

    #[test]
    fn test_empty_range() {
        let ci = FakeCi::new(&[]);
        assert_eq!(select(&ci, 4..4, "origin/master"), Selection::default());
    }
}
