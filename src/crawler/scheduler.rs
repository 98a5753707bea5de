//! Orchestrator - decides which sources are due and runs them
//!
//! This module handles:
//! - Loading every schedule entry and its source's last completion
//! - The due rule: `now - last_completion >= interval`, boundary inclusive
//! - Launching one independent pipeline task per due source
//! - Collecting per-source outcomes without letting one failure affect another

use crate::crawler::pipeline::{CrawlPipeline, PipelineError, RunSummary};
use crate::storage::{run_blocking, ScheduleEntry, ScheduleError, ScheduleStore, TelemetryLog};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Returns whether a source with the given interval is due at `now`
///
/// A source that never completed a run is always due.
pub fn is_due(entry: &ScheduleEntry, last_completion: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_completion {
        None => true,
        Some(finished) => (now - finished).num_seconds() >= entry.interval.total_seconds(),
    }
}

/// How one launched run ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunSummary),
    Failed(PipelineError),
    /// The run exceeded the per-run deadline and was cancelled
    TimedOut(Duration),
    /// The run panicked
    Crashed(String),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Result of one orchestration cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Sources that were due, sorted by name
    pub due: Vec<String>,
    /// Scheduled sources with no registered pipeline
    pub unknown: Vec<String>,
    pub outcomes: BTreeMap<String, RunOutcome>,
}

impl CycleReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// The scheduler: one `run_cycle` call is one orchestration cycle
pub struct Orchestrator {
    schedules: ScheduleStore,
    telemetry: TelemetryLog,
    pipelines: HashMap<String, Arc<CrawlPipeline>>,
    run_deadline: Option<Duration>,
}

impl Orchestrator {
    pub fn new(schedules: ScheduleStore, telemetry: TelemetryLog) -> Self {
        Self {
            schedules,
            telemetry,
            pipelines: HashMap::new(),
            run_deadline: None,
        }
    }

    /// Cancels any run that takes longer than `deadline`
    pub fn with_run_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.run_deadline = deadline;
        self
    }

    /// Registers the pipeline run for a source
    pub fn register(&mut self, pipeline: CrawlPipeline) {
        self.pipelines
            .insert(pipeline.source_name().to_string(), Arc::new(pipeline));
    }

    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    /// Computes the due set at `now`
    ///
    /// Last completions are looked up concurrently, one blocking task per entry.
    pub async fn due_sources(&self, now: DateTime<Utc>) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        let entries = self.schedules.list()?;

        let lookups = entries.iter().map(|entry| {
            let telemetry = self.telemetry.clone();
            let source_name = entry.source_name.clone();
            run_blocking(move || telemetry.last_completion(&source_name))
        });
        let results = join_all(lookups).await;

        let mut due = Vec::new();
        for (entry, last_completion) in entries.into_iter().zip(results) {
            let last_completion = last_completion?;
            let is_due = is_due(&entry, last_completion, now);
            tracing::debug!(
                source = %entry.source_name,
                last_completion = ?last_completion,
                interval_secs = entry.interval.total_seconds(),
                is_due,
                "Checked schedule"
            );
            if is_due {
                due.push(entry);
            }
        }

        due.sort_by(|a, b| a.source_name.cmp(&b.source_name));
        Ok(due)
    }

    /// Runs one cycle: every due source's pipeline, concurrently, to completion
    ///
    /// Only failing to read schedules or telemetry fails the cycle itself;
    /// pipeline failures are logged and reported per source.
    pub async fn run_cycle(&self) -> Result<CycleReport, ScheduleError> {
        let due = self.due_sources(Utc::now()).await?;
        let mut report = CycleReport::default();

        let mut tasks = JoinSet::new();
        for entry in due {
            let Some(pipeline) = self.pipelines.get(&entry.source_name).cloned() else {
                tracing::warn!(source = %entry.source_name, "Source is scheduled but has no adapter, skipping");
                report.unknown.push(entry.source_name);
                continue;
            };

            report.due.push(entry.source_name.clone());
            let deadline = self.run_deadline;
            tasks.spawn(async move {
                let source_name = pipeline.source_name().to_string();
                let run = async move {
                    match deadline {
                        Some(limit) => match tokio::time::timeout(limit, pipeline.run()).await {
                            Ok(result) => result.into(),
                            Err(_) => RunOutcome::TimedOut(limit),
                        },
                        None => pipeline.run().await.into(),
                    }
                };
                let outcome = AssertUnwindSafe(run)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| RunOutcome::Crashed(panic_message(panic.as_ref())));
                (source_name, outcome)
            });
        }

        tracing::info!(due = ?report.due, "Launched {} pipeline run(s)", report.due.len());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source_name, outcome)) => {
                    log_outcome(&source_name, &outcome);
                    report.outcomes.insert(source_name, outcome);
                }
                Err(e) => tracing::error!("Pipeline task did not finish: {}", e),
            }
        }

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Cycle finished"
        );
        Ok(report)
    }
}

impl From<Result<RunSummary, PipelineError>> for RunOutcome {
    fn from(result: Result<RunSummary, PipelineError>) -> Self {
        match result {
            Ok(summary) => Self::Completed(summary),
            Err(e) => Self::Failed(e),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn log_outcome(source_name: &str, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(summary) => {
            tracing::info!(source = %source_name, records = summary.records, "Run succeeded")
        }
        RunOutcome::Failed(e) => tracing::error!(source = %source_name, "Run failed: {}", e),
        RunOutcome::TimedOut(limit) => {
            tracing::error!(source = %source_name, "Run exceeded deadline of {:?}", limit)
        }
        RunOutcome::Crashed(message) => {
            tracing::error!(source = %source_name, "Run crashed: {}", message)
        }
    }
}
