use clap::{Parser, Subcommand};
use std::error::Error;
use std::ops::Range;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use flake_hunter::config::Config;
use flake_hunter::report::{FlakinessReport, render_json, render_text};
use flake_hunter::store::{ReportStore, StatsLog};
use flake_hunter::pipeline::{self, connect};

/// Flake Hunter - rank the tests that fail most often in a Jenkins job
#[derive(Parser, Debug)]
#[command(
    name = "flake-hunter",
    about = "Find flaky and failing tests in a Jenkins job's build history",
    after_help = "ENVIRONMENT VARIABLES:\n\
        JENKINS_URL                      CI server base URL (select, fetch, run)\n\
        JENKINS_USERNAME                 Basic-auth user (select, fetch, run)\n\
        JENKINS_PASSWORD                 Basic-auth password or token (select, fetch, run)\n\
        JOB_NAME                         Job to analyse (select, fetch, run)\n\
        JENKINS_RESPONSE_TIMEOUT         Request timeout in seconds\n\
        FLAKE_HUNTER_TARGET_REVISION     Revision label of retained builds\n\
        FLAKE_HUNTER_REVISION_PARAMETER  Build parameter holding the revision\n\
        FLAKE_HUNTER_START_BUILD         First build of the scanned range\n\
        FLAKE_HUNTER_END_BUILD           End of the scanned range (exclusive)\n\
        FLAKE_HUNTER_STATS_FILE          Retained-build log\n\
        FLAKE_HUNTER_LOG_DIR             Persisted report directory\n\
        FLAKE_HUNTER_TOP_N               Number of ranked tests\n\
        RUST_LOG                         Log filter (default: warn)"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Retained-build log
    #[arg(long, global = true)]
    stats_file: Option<PathBuf>,

    /// Directory of persisted reports
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Select, fetch and analyze in one pass (default)
    Run {
        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Record the failed builds of the target revision in the stats file
    Select {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Download the test report of every build in the stats file
    Fetch,

    /// Rank failing tests from the persisted reports (no network access)
    Analyze {
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RangeArgs {
    /// First build number to scan
    #[arg(long)]
    start: Option<u64>,

    /// End of the scanned range (exclusive)
    #[arg(long)]
    end: Option<u64>,

    /// Revision label a build must carry to be retained
    #[arg(long)]
    target: Option<String>,
}

#[derive(clap::Args, Debug, Default)]
struct OutputArgs {
    /// Number of tests to report
    #[arg(long, short = 'n')]
    top: Option<usize>,

    /// Output the ranking as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(path) = args.stats_file {
        config.store.stats_file = path;
    }
    if let Some(dir) = args.log_dir {
        config.store.log_dir = dir;
    }

    let stats = StatsLog::new(&config.store.stats_file);
    let store = ReportStore::new(&config.store.log_dir);

    let command = args.command.unwrap_or(Commands::Run {
        range: RangeArgs::default(),
        output: OutputArgs::default(),
    });

    match command {
        Commands::Run { range, output } => {
            let client = connect(&config)?;
            let (builds, target) = range.resolve(&config);
            let outcome = pipeline::run(
                &client,
                builds,
                &target,
                &stats,
                &store,
                output.top.unwrap_or(config.analysis.top_n),
            )?;
            print_report(&outcome.report, output.json)?;
        }

        Commands::Select { range } => {
            let client = connect(&config)?;
            let (builds, target) = range.resolve(&config);
            let selection = pipeline::select_and_record(&client, builds, &target, &stats)?;
            let retained: Vec<String> = selection.retained.iter().map(u64::to_string).collect();
            println!(
                "Retained {} of {} builds ({} skipped): {}",
                selection.retained.len(),
                selection.examined,
                selection.skipped,
                retained.join(", ")
            );
            println!("Stats file: {}", stats.path().display());
        }

        Commands::Fetch => {
            let client = connect(&config)?;
            let summary = pipeline::fetch_logged(&client, &stats, &store)?;
            println!(
                "Fetched {} reports ({} already present, {} skipped) into {}",
                summary.fetched,
                summary.already_present,
                summary.skipped,
                store.dir().display()
            );
        }

        Commands::Analyze { output } => {
            let report =
                pipeline::analyze_store(&store, output.top.unwrap_or(config.analysis.top_n))?;
            print_report(&report, output.json)?;
        }
    }

    Ok(())
}

impl RangeArgs {
    fn resolve(self, config: &Config) -> (Range<u64>, String) {
        let start = self.start.unwrap_or(config.analysis.builds.start);
        let end = self.end.unwrap_or(config.analysis.builds.end);
        let target = self
            .target
            .unwrap_or_else(|| config.analysis.target_revision.clone());
        (start..end, target)
    }
}

fn print_report(report: &FlakinessReport, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", render_json(report)?);
    } else {
        print!("{}", render_text(report));
    }
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
