//! Report command for time per task over a selected range.
//!
//! This module implements `twt report`, which resolves a range such as
//! "last week", aggregates the stored events and prints the sums as text or JSON.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;
use twt_core::{
    Calendar, Grouping, Instant, Range, Report, ReportBody, ReportRequest, TaskSums, Unit,
    generate, merge_periods,
};
use twt_db::Database;

use super::events::{JsonEvent, format_events};
use super::util::TaskNames;

// ========== Header ==========

fn format_instant(instant: &Instant) -> String {
    instant.format("%Y-%m-%d %H:%M").to_string()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// First line of a text report, e.g.
/// "Last week, by day: 2025-01-20 00:00 to 2025-01-27 00:00 (Europe/Berlin)".
pub fn format_header(report: &Report) -> String {
    let mut title = capitalize(&report.request.name());
    if let ReportBody::PerPeriod { unit, .. } = &report.body {
        write!(title, ", by {unit}").unwrap();
    }
    format!(
        "{title}: {} to {} ({})",
        format_instant(report.window.begin()),
        format_instant(report.window.end()),
        report.generated_at.timezone().name()
    )
}

// ========== Human-Readable Output ==========

/// Sums sorted by task name.
fn named_sums<'a>(sums: &'a TaskSums, names: &'a TaskNames) -> Vec<(&'a str, String)> {
    let mut rows: Vec<_> = sums
        .iter()
        .map(|(task, sum)| (names.get(task), sum.to_string()))
        .collect();
    rows.sort_unstable();
    rows
}

fn write_sums(output: &mut String, sums: &TaskSums, names: &TaskNames, indent: &str, width: usize) {
    if sums.is_empty() {
        writeln!(output, "{indent}-").unwrap();
        return;
    }
    for (name, sum) in named_sums(sums, names) {
        writeln!(output, "{indent}{name:<width$}  {sum:>6}").unwrap();
    }
}

fn name_width<'a>(sums: impl IntoIterator<Item = &'a TaskSums>, names: &TaskNames) -> usize {
    sums.into_iter()
        .flat_map(|sums| sums.keys())
        .map(|task| names.get(task).chars().count())
        .chain(std::iter::once("Total".len()))
        .max()
        .unwrap_or(0)
}

fn period_label(begin: &Instant, unit: Unit) -> String {
    match unit {
        Unit::Day | Unit::Week => begin.format("%Y-%m-%d").to_string(),
        Unit::Month => begin.format("%Y-%m").to_string(),
        Unit::Year => begin.format("%Y").to_string(),
    }
}

/// Formats the human-readable report output.
pub fn format_report(report: &Report, names: &TaskNames) -> String {
    let mut output = String::new();
    writeln!(output, "{}", format_header(report)).unwrap();
    writeln!(output).unwrap();

    let selection = report.request.name();
    match &report.body {
        ReportBody::Events(events) => {
            if events.is_empty() {
                writeln!(output, "No events in {selection}.").unwrap();
            } else {
                format_events(&mut output, events, names, report.generated_at.timezone());
            }
        }
        ReportBody::Sums(sums) => {
            if sums.is_empty() {
                writeln!(output, "No time recorded in {selection}.").unwrap();
                return output;
            }
            let width = name_width([sums], names);
            write_sums(&mut output, sums, names, "", width);
            let total: twt_core::TimeSum = sums.values().sum();
            writeln!(output, "{:<width$}  {:>6}", "Total", total.to_string()).unwrap();
        }
        ReportBody::PerPeriod { unit, periods } => {
            let totals = merge_periods(periods);
            if totals.is_empty() {
                writeln!(output, "No time recorded in {selection}.").unwrap();
                return output;
            }
            let width = name_width(periods.iter().map(|period| &period.sums), names);
            for period in periods {
                writeln!(output, "{}", period_label(period.window.begin(), *unit)).unwrap();
                write_sums(&mut output, &period.sums, names, "  ", width);
            }
            writeln!(output, "Total").unwrap();
            write_sums(&mut output, &totals, names, "  ", width);
        }
    }
    output
}

// ========== JSON Output ==========

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub name: String,
    pub file_stem: String,
    pub range: Range,
    pub unit: Unit,
    pub grouping: Grouping,
    pub timezone: String,
    pub generated_at: String,
    pub window: JsonWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<JsonEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periods: Option<Vec<JsonPeriod>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sums: Option<Vec<JsonSum>>,
}

#[derive(Debug, Serialize)]
pub struct JsonWindow {
    pub begin: String,
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct JsonPeriod {
    pub begin: String,
    pub end: String,
    pub sums: Vec<JsonSum>,
}

#[derive(Debug, Serialize)]
pub struct JsonSum {
    pub task: String,
    pub task_id: String,
    pub seconds: i64,
    pub duration: String,
}

fn json_sums(sums: &TaskSums, names: &TaskNames) -> Vec<JsonSum> {
    let mut rows: Vec<JsonSum> = sums
        .iter()
        .map(|(task, sum)| JsonSum {
            task: names.get(task).to_string(),
            task_id: task.to_string(),
            seconds: sum.as_seconds(),
            duration: sum.to_string(),
        })
        .collect();
    rows.sort_by(|a, b| a.task.cmp(&b.task));
    rows
}

/// Formats a report as JSON.
///
/// Per-period reports also carry the merged totals under `sums`.
pub fn format_report_json(report: &Report, names: &TaskNames) -> Result<String> {
    let tz = report.generated_at.timezone();
    let (events, periods, sums) = match &report.body {
        ReportBody::Events(events) => (
            Some(events.iter().map(|event| JsonEvent::new(event, names, tz)).collect()),
            None,
            None,
        ),
        ReportBody::Sums(sums) => (None, None, Some(json_sums(sums, names))),
        ReportBody::PerPeriod { periods, .. } => (
            None,
            Some(
                periods
                    .iter()
                    .map(|period| JsonPeriod {
                        begin: period.window.begin().to_rfc3339(),
                        end: period.window.end().to_rfc3339(),
                        sums: json_sums(&period.sums, names),
                    })
                    .collect(),
            ),
            Some(json_sums(&merge_periods(periods), names)),
        ),
    };

    let report = JsonReport {
        name: report.request.name(),
        file_stem: report.request.file_stem(),
        range: report.request.range,
        unit: report.request.unit,
        grouping: report.request.grouping,
        timezone: tz.name().to_string(),
        generated_at: report.generated_at.to_rfc3339(),
        window: JsonWindow {
            begin: report.window.begin().to_rfc3339(),
            end: report.window.end().to_rfc3339(),
        },
        events,
        periods,
        sums,
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

// ========== Public Interface ==========

/// Runs the report command.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    calendar: &Calendar,
    request: ReportRequest,
    now: Instant,
    json: bool,
) -> Result<()> {
    let report = generate(db, calendar, request, now)
        .with_context(|| format!("failed to build report for {}", request.name()))?;
    let names = TaskNames::new(db.list_tasks()?);

    if json {
        writeln!(writer, "{}", format_report_json(&report, &names)?)?;
    } else {
        write!(writer, "{}", format_report(&report, &names))?;
    }
    Ok(())
}
