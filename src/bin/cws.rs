use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use catalog_week_sync::app::{App, SyncReport};
use catalog_week_sync::catalog::CatalogHttpClient;
use catalog_week_sync::config::{ConfigLoader, Overrides};
use catalog_week_sync::error::SyncError;
use catalog_week_sync::output::{ConsoleOutput, JsonOutput};
use catalog_week_sync::sync::SyncOptions;

#[derive(Parser)]
#[command(name = "cws")]
#[command(about = "Mirror catalog resources into per-organization ISO-week folders")]
#[command(version, author)]
struct Cli {
    /// Root directory for mirrored files.
    #[arg(long, env = "DATA_FOLDERS_PATH")]
    base_path: Option<String>,

    /// JSON config file (defaults to ./catalog-sync.json when present).
    #[arg(long)]
    config: Option<String>,

    /// Number of distinct datasets to wait for before syncing.
    #[arg(long)]
    expected: Option<usize>,

    #[arg(long)]
    state_file: Option<String>,

    /// Give up after this many polling rounds short of the expected count.
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Accept fewer datasets after this many rounds with no new ones.
    #[arg(long)]
    stable_rounds: Option<u32>,

    /// Re-download files whose state entry shows a newer upstream version this week.
    #[arg(long)]
    refresh_changed: bool,

    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON instead of progress lines.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SyncError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SyncError) -> u8 {
    if error.is_config() {
        2
    } else if error.is_transport() {
        3
    } else {
        1
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = Overrides {
        base_path: cli.base_path,
        expected_datasets: cli.expected,
        state_file: cli.state_file,
        max_rounds: cli.max_rounds,
        stable_rounds: cli.stable_rounds,
    };
    let config = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;

    let client = CatalogHttpClient::new(config.timeouts, config.retries)?;
    let app = App::new(client, &config);
    let options = SyncOptions {
        dry_run: cli.dry_run,
        refresh_changed: cli.refresh_changed,
    };

    if cli.json {
        let report = app.run(options, &JsonOutput)?;
        JsonOutput::print_report(&report).into_diagnostic()?;
    } else {
        let report = app.run(options, &ConsoleOutput)?;
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &SyncReport) {
    println!("{}", report.summary_line());
}
