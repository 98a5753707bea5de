//! Text and JSON rendering of read-side views

use crate::crawler::{CycleReport, RunOutcome};
use crate::output::views::SourceHistory;
use crate::storage::{Document, ScheduleEntry};
use serde_json::{json, Value};
use std::fmt::Write;

/// Formats phase histories, one block per source
pub fn format_history(histories: &[SourceHistory]) -> String {
    let mut out = String::new();

    if histories.is_empty() {
        out.push_str("No telemetry recorded yet\n");
        return out;
    }

    for history in histories {
        let _ = writeln!(out, "=== {} ({} records) ===", history.source_name, history.records.len());
        for record in &history.records {
            let _ = writeln!(
                out,
                "  {}  {:<16}  {:>8} ms",
                record.timestamp.to_rfc3339(),
                record.phase.to_db_string(),
                record.duration_ms
            );
        }
        out.push('\n');
    }

    out
}

pub fn format_schedules(entries: &[ScheduleEntry]) -> String {
    let mut out = String::new();

    if entries.is_empty() {
        out.push_str("No schedules defined\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<24} {:>5} {:>5} {:>5} {:>5}  {:>10}",
        "SOURCE", "DAYS", "HRS", "MIN", "SEC", "TOTAL (s)"
    );
    for entry in entries {
        let interval = &entry.interval;
        let _ = writeln!(
            out,
            "{:<24} {:>5} {:>5} {:>5} {:>5}  {:>10}",
            entry.source_name,
            interval.days,
            interval.hours,
            interval.minutes,
            interval.seconds,
            interval.total_seconds()
        );
    }

    out
}

/// One compact JSON line per record
pub fn format_records(source_name: &str, records: &[Document]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ({} records) ===", source_name, records.len());
    for record in records {
        let line = serde_json::to_string(record).unwrap_or_else(|_| "<unprintable>".to_string());
        let _ = writeln!(out, "  {}", line);
    }
    out
}

pub fn format_cycle_report(report: &CycleReport) -> String {
    let mut out = String::new();

    if report.due.is_empty() && report.unknown.is_empty() {
        out.push_str("No sources were due\n");
        return out;
    }

    for (source_name, outcome) in &report.outcomes {
        let status = match outcome {
            RunOutcome::Completed(summary) => format!(
                "ok       {} targets, {} soft-empty, {} records",
                summary.targets, summary.soft_empty, summary.records
            ),
            RunOutcome::Failed(e) => format!("failed   {} ({})", e.phase, e.cause),
            RunOutcome::TimedOut(limit) => format!("timeout  after {}s", limit.as_secs()),
            RunOutcome::Crashed(message) => format!("crashed  {}", message),
        };
        let _ = writeln!(out, "{:<24} {}", source_name, status);
    }
    for source_name in &report.unknown {
        let _ = writeln!(out, "{:<24} skipped  no adapter configured", source_name);
    }

    let _ = writeln!(
        out,
        "\n{} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    out
}

/// Machine-readable form of a cycle report
pub fn cycle_report_json(report: &CycleReport) -> Value {
    let outcomes: serde_json::Map<String, Value> = report
        .outcomes
        .iter()
        .map(|(source_name, outcome)| {
            let value = match outcome {
                RunOutcome::Completed(summary) => json!({
                    "status": "completed",
                    "targets": summary.targets,
                    "payloads": summary.payloads,
                    "soft_empty": summary.soft_empty,
                    "records": summary.records,
                }),
                RunOutcome::Failed(e) => json!({
                    "status": "failed",
                    "phase": e.phase,
                    "error": e.cause.to_string(),
                }),
                RunOutcome::TimedOut(limit) => json!({
                    "status": "timed-out",
                    "deadline_secs": limit.as_secs(),
                }),
                RunOutcome::Crashed(message) => json!({
                    "status": "crashed",
                    "error": message,
                }),
            };
            (source_name.clone(), value)
        })
        .collect();

    json!({
        "due": report.due,
        "unknown": report.unknown,
        "outcomes": outcomes,
    })
}
