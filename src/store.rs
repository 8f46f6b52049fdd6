//! On-disk checkpoints shared between pipeline stages.
//!
//! - [`StatsLog`]: append-only log of retained build numbers, one per line
//! - [`ReportStore`]: directory of per-build report documents named
//!   `jenkins_build_<n>.json`, written atomically and never overwritten
//!
//! Rerunning a stage against the same checkpoints resumes where the previous
//! run stopped.

use atomicwrites::{AtomicFile, DisallowOverwrite};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const REPORT_PREFIX: &str = "jenkins_build_";
const REPORT_EXTENSION: &str = "json";

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the on-disk stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A report for this build is already persisted
    #[error("report for build {0} already exists")]
    AlreadyExists(u64),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Append-only log of retained build numbers
#[derive(Debug, Clone)]
pub struct StatsLog {
    path: PathBuf,
}

impl StatsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every logged build number. A missing file is an empty log.
    ///
    /// Blank lines are ignored; malformed lines are skipped with a warning.
    pub fn read(&self) -> StoreResult<BTreeSet<u64>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let mut builds = BTreeSet::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<u64>() {
                Ok(build) => {
                    builds.insert(build);
                }
                Err(_) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    "ignoring malformed build number {:?}",
                    line
                ),
            }
        }
        Ok(builds)
    }

    /// Append the builds not already logged, in increasing order. Returns how many were written.
    pub fn append_new(&self, builds: &BTreeSet<u64>) -> StoreResult<usize> {
        let known = self.read()?;
        let fresh: Vec<u64> = builds.difference(&known).copied().collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;

        let mut lines = String::new();
        for build in &fresh {
            lines.push_str(&build.to_string());
            lines.push('\n');
        }
        file.write_all(lines.as_bytes())
            .map_err(|e| StoreError::io(&self.path, e))?;

        debug!(path = %self.path.display(), count = fresh.len(), "appended retained builds");
        Ok(fresh.len())
    }
}

/// Directory of persisted per-build test reports
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed
    pub fn init(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))
    }

    /// Path of the report for `build`
    pub fn path_for(&self, build: u64) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", REPORT_PREFIX, build, REPORT_EXTENSION))
    }

    pub fn contains(&self, build: u64) -> bool {
        self.path_for(build).exists()
    }

    /// Persist `bytes` as the report of `build`, atomically.
    ///
    /// Either the whole document lands under its final name or nothing does.
    /// An existing report is never replaced.
    pub fn write(&self, build: u64, bytes: &[u8]) -> StoreResult<()> {
        let path = self.path_for(build);
        if path.exists() {
            return Err(StoreError::AlreadyExists(build));
        }

        AtomicFile::new(&path, DisallowOverwrite)
            .write(|file| file.write_all(bytes))
            .map_err(|err| match err {
                atomicwrites::Error::Internal(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    StoreError::AlreadyExists(build)
                }
                atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => {
                    StoreError::io(&path, e)
                }
            })
    }

    /// Read the persisted report of `build`
    pub fn read(&self, build: u64) -> StoreResult<Vec<u8>> {
        let path = self.path_for(build);
        fs::read(&path).map_err(|e| StoreError::io(&path, e))
    }

    /// Build numbers of every persisted report, ascending.
    ///
    /// Files that do not follow the naming scheme are ignored. A missing
    /// directory holds no reports.
    pub fn list(&self) -> StoreResult<Vec<u64>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut builds = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            if let Some(build) = parse_report_name(&entry.file_name().to_string_lossy()) {
                builds.push(build);
            }
        }
        builds.sort_unstable();
        builds.dedup();
        Ok(builds)
    }
}

/// Extract the build number from `jenkins_build_<n>.json`.
///
/// Only the canonical spelling is accepted, so `042` or `+42` never alias build 42.
fn parse_report_name(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(REPORT_PREFIX)?
        .strip_suffix(REPORT_EXTENSION)?
        .strip_suffix('.')?;
    digits
        .parse::<u64>()
        .ok()
        .filter(|build| build.to_string() == digits)
}
