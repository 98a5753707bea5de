//! Cadence-Crawl main entry point
//!
//! This is the command-line interface for the Cadence-Crawl scheduled harvester.

use anyhow::Context;
use cadence_crawl::config::{load_config_with_hash, Config};
use cadence_crawl::crawler::{schedule_store, telemetry_log};
use cadence_crawl::output::{self, SourceHistory};
use cadence_crawl::sources::build_orchestrator;
use cadence_crawl::storage::{open_storage, DocumentStore, Interval, ScheduleEntry, ScheduleError};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Cadence-Crawl: a scheduled vendor API harvester
///
/// Cadence-Crawl re-runs each configured source once its interval has elapsed
/// since its last completed run, storing normalized records together with a
/// timing record for every pipeline phase.
#[derive(Parser, Debug)]
#[command(name = "cadence-crawl")]
#[command(version)]
#[command(about = "A scheduled vendor API harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every due source once
    Run {
        /// Keep running a cycle every tick interval until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// Show phase history, newest first
    Logs {
        /// Only this source; every source with telemetry when omitted
        source: Option<String>,
    },

    /// Inspect or edit schedules
    #[command(subcommand)]
    Schedule(ScheduleCommand),

    /// Show stored records of a source, newest first
    Records { source: String },
}

#[derive(Subcommand, Debug)]
enum ScheduleCommand {
    /// List every schedule entry
    List,

    /// Show one schedule entry
    Show { source: String },

    /// Create a schedule entry; fails if one exists
    Create {
        source: String,
        #[command(flatten)]
        interval: IntervalArgs,
    },

    /// Replace an existing schedule entry; fails if none exists
    Update {
        source: String,
        #[command(flatten)]
        interval: IntervalArgs,
    },
}

#[derive(Args, Debug)]
struct IntervalArgs {
    #[arg(long, default_value_t = 0)]
    days: u64,
    #[arg(long, default_value_t = 0)]
    hours: u64,
    #[arg(long, default_value_t = 0)]
    minutes: u64,
    #[arg(long, default_value_t = 0)]
    seconds: u64,
}

impl From<IntervalArgs> for Interval {
    fn from(args: IntervalArgs) -> Self {
        Interval::new(args.days, args.hours, args.minutes, args.seconds)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let store: Arc<dyn DocumentStore> = Arc::new(
        open_storage(Path::new(&config.storage.database_path))
            .with_context(|| format!("Failed to open database {}", config.storage.database_path))?,
    );

    match cli.command {
        Command::Run { watch } => handle_run(&config, store, watch, cli.json).await,
        Command::Logs { source } => {
            handle_logs(&config, store, source.as_deref(), cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Schedule(command) => {
            handle_schedule(&config, store, command, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Records { source } => {
            handle_records(&config, store.as_ref(), &source, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("cadence_crawl=info,warn"),
            1 => EnvFilter::new("cadence_crawl=debug,info"),
            2 => EnvFilter::new("cadence_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles `run`: one cycle, or a cycle every tick until Ctrl-C
async fn handle_run(
    config: &Config,
    store: Arc<dyn DocumentStore>,
    watch_mode: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    tracing::info!(
        "Sources: {}, seeded schedules: {}",
        config.sources.len(),
        config.schedules.len()
    );
    let orchestrator = build_orchestrator(config, store)?;

    if !watch_mode {
        let report = orchestrator.run_cycle().await?;
        print_output(
            json,
            || output::to_json(&output::cycle_report_json(&report)),
            || output::format_cycle_report(&report),
        )?;
        return Ok(if report.failed() == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    // The signal is observed even while a cycle is running; in-flight runs
    // still finish before the loop exits.
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let tick = Duration::from_secs(config.orchestrator.tick_interval_secs);
    tracing::info!("Watching schedules every {:?}, press Ctrl-C to stop", tick);

    loop {
        match orchestrator.run_cycle().await {
            Ok(report) => {
                if json {
                    println!("{}", serde_json::to_string(&output::cycle_report_json(&report))?);
                }
            }
            Err(e) => tracing::error!("Cycle could not run: {}", e),
        }

        if *shutdown_rx.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            Ok(()) = shutdown_rx.changed() => break,
        }
    }

    tracing::info!("Shutting down");
    Ok(ExitCode::SUCCESS)
}

/// Handles `logs`: phase history of one or every source
fn handle_logs(
    config: &Config,
    store: Arc<dyn DocumentStore>,
    source: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let telemetry = telemetry_log(config, store);
    let histories: Vec<SourceHistory> = match source {
        Some(source_name) => vec![output::load_history(&telemetry, source_name)?],
        None => output::load_all_history(&telemetry)?,
    };

    print_output(json, || output::to_json(&histories), || {
        output::format_history(&histories)
    })
}

/// Handles `schedule` subcommands
fn handle_schedule(
    config: &Config,
    store: Arc<dyn DocumentStore>,
    command: ScheduleCommand,
    json: bool,
) -> anyhow::Result<()> {
    let schedules = schedule_store(config, store);

    let entries = match command {
        ScheduleCommand::List => schedules.list()?,
        ScheduleCommand::Show { source } => {
            let entry = schedules
                .get(&source)?
                .ok_or(ScheduleError::NotFound(source))?;
            vec![entry]
        }
        ScheduleCommand::Create { source, interval } => {
            warn_if_unconfigured(config, &source);
            let entry = ScheduleEntry::new(source, interval.into());
            schedules.create(&entry)?;
            tracing::info!(source = %entry.source_name, "Schedule created");
            vec![entry]
        }
        ScheduleCommand::Update { source, interval } => {
            let entry = ScheduleEntry::new(source, interval.into());
            schedules.update(&entry)?;
            tracing::info!(source = %entry.source_name, "Schedule updated");
            vec![entry]
        }
    };

    print_output(json, || output::to_json(&entries), || {
        output::format_schedules(&entries)
    })
}

/// Handles `records`: stored records of one source
fn handle_records(
    config: &Config,
    store: &dyn DocumentStore,
    source: &str,
    json: bool,
) -> anyhow::Result<()> {
    warn_if_unconfigured(config, source);
    let records = output::load_records(store, &config.storage.data_prefix, source)?;

    print_output(json, || output::to_json(&records), || {
        output::format_records(source, &records)
    })
}

fn warn_if_unconfigured(config: &Config, source: &str) {
    if config.source(source).is_none() {
        tracing::warn!("'{}' is not a configured source", source);
    }
}

fn print_output(
    json: bool,
    as_json: impl FnOnce() -> output::OutputResult<String>,
    as_text: impl FnOnce() -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", as_json()?);
    } else {
        print!("{}", as_text());
    }
    Ok(())
}
