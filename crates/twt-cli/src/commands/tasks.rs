//! `twt tasks`: every known task with its current state.
//! `twt activate` / `twt deactivate`: hide a task from tracking, or bring it back.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use twt_core::{EventKind, Task};
use twt_db::Database;

use super::util::format_local;

/// What a task is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Running,
    Paused,
    Idle,
}

/// One row of the task list.
#[derive(Debug, Clone, Serialize)]
pub struct TaskEntry {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub state: TaskState,
    /// Instant of the event that put the task in its state.
    pub since: Option<DateTime<Utc>>,
}

/// Joins tasks with their latest events.
pub fn get_task_entries(db: &Database) -> Result<Vec<TaskEntry>> {
    let latest = db.latest_events()?;
    let entries = db
        .list_tasks()?
        .into_iter()
        .map(|Task { id, name, active }| {
            let last = latest.iter().find(|event| event.task == id);
            let state = match last.map(|event| event.kind) {
                Some(EventKind::Start | EventKind::Resume) => TaskState::Running,
                Some(EventKind::Pause) => TaskState::Paused,
                Some(EventKind::End) | None => TaskState::Idle,
            };
            TaskEntry {
                id: id.to_string(),
                name,
                active,
                state,
                since: last.map(|event| event.instant),
            }
        })
        .collect();
    Ok(entries)
}

/// Formats the task list for humans.
pub fn format_tasks(entries: &[TaskEntry], tz: Tz) -> String {
    let mut output = String::new();

    if entries.is_empty() {
        writeln!(output, "No tasks yet.").unwrap();
        writeln!(output).unwrap();
        writeln!(output, "Hint: Run 'twt start <task>' to start tracking.").unwrap();
        return output;
    }

    let width = entries
        .iter()
        .map(|entry| entry.name.chars().count())
        .max()
        .unwrap_or(0);
    for entry in entries {
        let state = match (entry.state, entry.since) {
            (TaskState::Running, Some(since)) => format!("running since {}", format_local(since, tz)),
            (TaskState::Paused, Some(since)) => format!("paused since {}", format_local(since, tz)),
            _ => "idle".to_string(),
        };
        let inactive = if entry.active { "" } else { " (inactive)" };
        writeln!(output, "{:<width$}  {state}{inactive}", entry.name).unwrap();
    }
    output
}

/// Marks the task `name` active or inactive.
///
/// Only idle tasks can be deactivated.
pub fn set_active<W: Write>(
    writer: &mut W,
    db: &mut Database,
    name: &str,
    active: bool,
) -> Result<()> {
    let task = db
        .find_task_by_name(name.trim())?
        .with_context(|| format!("unknown task: {name}"))?;

    if !active {
        let latest = db
            .latest_events()?
            .into_iter()
            .find(|event| event.task == task.id);
        match latest.map(|event| event.kind) {
            Some(EventKind::Start | EventKind::Resume) => {
                anyhow::bail!("{} is running; use `twt stop {}` first", task.name, task.name)
            }
            Some(EventKind::Pause) => {
                anyhow::bail!("{} is paused; use `twt stop {}` first", task.name, task.name)
            }
            Some(EventKind::End) | None => {}
        }
    }

    db.set_task_active(&task.id, active)?;
    tracing::debug!(task = %task.id, active, "updated task");
    let verb = if active { "Activated" } else { "Deactivated" };
    writeln!(writer, "{verb} {}", task.name)?;
    Ok(())
}

/// Runs the tasks command.
pub fn run<W: Write>(writer: &mut W, db: &Database, tz: Tz, json: bool) -> Result<()> {
    let entries = get_task_entries(db)?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
    } else {
        write!(writer, "{}", format_tasks(&entries, tz))?;
    }
    Ok(())
}
