//! The three stages wired together over their on-disk checkpoints.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{info, warn};

use crate::ci::{CiError, CiSource, JenkinsClient};
use crate::config::{Config, ConfigError};
use crate::fetcher::{FetchSummary, fetch_missing};
use crate::report::{FlakinessReport, Tally};
use crate::selector::{Selection, select};
use crate::store::{ReportStore, StatsLog, StoreResult};

/// Everything a full run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub selection: Selection,
    pub fetch: FetchSummary,
    pub report: FlakinessReport,
}

/// Reasons the stages that talk to the CI server cannot start
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot build CI client: {0}")]
    Client(#[source] CiError),

    #[error("CI server is not reachable: {0}")]
    Unreachable(#[source] CiError),
}

/// Build the CI client and make sure the server answers before any work starts
pub fn connect(config: &Config) -> Result<JenkinsClient, ConnectError> {
    let settings = config.ci_settings()?;
    let client = JenkinsClient::new(settings.clone(), config.analysis.revision_parameter.clone())
        .map_err(ConnectError::Client)?;
    client.check_health().map_err(ConnectError::Unreachable)?;
    info!(server = %settings.base_url, job = %settings.job_name, "CI server reachable");
    Ok(client)
}

/// Stage 1: select retained builds and append the new ones to `stats`
pub fn select_and_record<C: CiSource + ?Sized>(
    client: &C,
    builds: Range<u64>,
    target_revision: &str,
    stats: &StatsLog,
) -> StoreResult<Selection> {
    let selection = select(client, builds, target_revision);
    stats.append_new(&selection.retained)?;
    Ok(selection)
}

/// Stage 2: fetch the report of every build in `stats` not yet in `store`
pub fn fetch_logged<C: CiSource + ?Sized>(
    client: &C,
    stats: &StatsLog,
    store: &ReportStore,
) -> StoreResult<FetchSummary> {
    let builds = stats.read()?;
    fetch_missing(client, store, &builds)
}

/// Stage 3: aggregate every persisted report in ascending build order.
///
/// Needs no network access. Files that cannot be read count as skipped.
pub fn analyze_store(store: &ReportStore, top_n: usize) -> StoreResult<FlakinessReport> {
    let builds = store.list()?;

    let report = builds
        .into_iter()
        .fold(Tally::new(), |tally, build| match store.read(build) {
            Ok(bytes) => tally.absorb_raw(build, &bytes),
            Err(e) => {
                warn!(build, error = %e, "cannot read persisted report");
                tally.skip()
            }
        })
        .finish(top_n);

    info!(
        analyzed = report.reports_analyzed,
        skipped = report.reports_skipped,
        distinct = report.distinct_failures,
        "aggregation finished"
    );
    Ok(report)
}

/// Run all three stages in order
pub fn run<C: CiSource + ?Sized>(
    client: &C,
    builds: Range<u64>,
    target_revision: &str,
    stats: &StatsLog,
    store: &ReportStore,
    top_n: usize,
) -> StoreResult<RunOutcome> {
    let selection = select_and_record(client, builds, target_revision, stats)?;
    let fetch = fetch_logged(client, stats, store)?;
    let report = analyze_store(store, top_n)?;
    Ok(RunOutcome {
        selection,
        fetch,
        report,
    })
}
