//! `twt events`: the raw events of a selected range.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono_tz::Tz;
use serde::Serialize;
use twt_core::{Calendar, Event, EventKind, Grouping, Instant, Range, ReportRequest, Unit};
use twt_db::Database;

use super::report;
use super::util::{TaskNames, format_local};

/// One event in JSON output.
#[derive(Debug, Serialize)]
pub struct JsonEvent {
    pub id: String,
    pub at: String,
    pub kind: EventKind,
    pub task: String,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl JsonEvent {
    pub fn new(event: &Event, names: &TaskNames, tz: Tz) -> Self {
        Self {
            id: event.id.to_string(),
            at: event.instant.with_timezone(&tz).to_rfc3339(),
            kind: event.kind,
            task: names.get(&event.task).to_string(),
            task_id: event.task.to_string(),
            note: event.note.clone(),
        }
    }
}

/// Appends one line per event, in local time.
pub fn format_events(output: &mut String, events: &[Event], names: &TaskNames, tz: Tz) {
    for event in events {
        write!(
            output,
            "{}  {:<6}  {}",
            format_local(event.instant, tz),
            event.kind.as_str(),
            names.get(&event.task)
        )
        .unwrap();
        if let Some(note) = &event.note {
            write!(output, "  ({note})").unwrap();
        }
        writeln!(output).unwrap();
    }
}

/// Runs the events command.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    calendar: &Calendar,
    range: Range,
    unit: Unit,
    now: Instant,
    json: bool,
) -> Result<()> {
    let request = ReportRequest {
        range,
        unit,
        grouping: Grouping::None,
    };
    report::run(writer, db, calendar, request, now, json)
}
