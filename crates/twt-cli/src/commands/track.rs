//! Recording commands: `twt start`, `stop`, `pause` and `resume`.
//!
//! Every command appends one event per affected task, all in one transaction.
//! A new event must not precede the task's latest event, so the stored log
//! stays in causal order.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use twt_core::{Event, EventKind, TaskId};
use twt_db::Database;

use super::util::{TaskNames, format_local};

/// Past-tense verb for confirmations.
const fn verb(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Start => "Started",
        EventKind::End => "Stopped",
        EventKind::Pause => "Paused",
        EventKind::Resume => "Resumed",
    }
}

/// Whether a task whose latest event is `latest` accepts `kind` next.
fn accepts(latest: Option<EventKind>, kind: EventKind) -> bool {
    match kind {
        EventKind::Start => !latest.is_some_and(|k| k.opens_span() || k == EventKind::Pause),
        EventKind::End => latest.is_some_and(|k| k != EventKind::End),
        EventKind::Pause => latest.is_some_and(|k| k.opens_span()),
        EventKind::Resume => latest == Some(EventKind::Pause),
    }
}

fn ensure_in_order(name: &str, latest: &Event, at: DateTime<Utc>, tz: Tz) -> Result<()> {
    if at < latest.instant {
        anyhow::bail!(
            "{name} already has a {} event at {}, which is after {}",
            latest.kind,
            format_local(latest.instant, tz),
            format_local(at, tz)
        );
    }
    Ok(())
}

/// Starts `name`, creating the task on first use.
pub fn start<W: Write>(
    writer: &mut W,
    db: &mut Database,
    tz: Tz,
    name: &str,
    at: DateTime<Utc>,
    note: Option<String>,
) -> Result<()> {
    let task = db
        .task_by_name_or_create(name)
        .with_context(|| format!("failed to find or create task {name}"))?;
    if !task.active {
        anyhow::bail!(
            "{} is inactive; use `twt activate {}` first",
            task.name,
            task.name
        );
    }
    let latest = db
        .latest_events()?
        .into_iter()
        .find(|event| event.task == task.id);

    if let Some(latest) = &latest {
        if !accepts(Some(latest.kind), EventKind::Start) {
            anyhow::bail!(
                "{} is {}; use `twt {}` instead",
                task.name,
                if latest.kind == EventKind::Pause { "paused" } else { "already running" },
                if latest.kind == EventKind::Pause { "resume" } else { "stop" },
            );
        }
        ensure_in_order(&task.name, latest, at, tz)?;
    }

    db.record_event(&task.id, at, EventKind::Start, note)?;
    writeln!(writer, "{} {} at {}", verb(EventKind::Start), task.name, format_local(at, tz))?;
    Ok(())
}

/// Appends `kind` to every task that accepts it, or only to `only`.
pub fn transition<W: Write>(
    writer: &mut W,
    db: &mut Database,
    tz: Tz,
    kind: EventKind,
    only: Option<&str>,
    at: DateTime<Utc>,
    note: Option<String>,
) -> Result<()> {
    let names = TaskNames::new(db.list_tasks()?);
    let only: Option<TaskId> = match only {
        Some(name) => Some(
            db.find_task_by_name(name.trim())?
                .with_context(|| format!("unknown task: {name}"))?
                .id,
        ),
        None => None,
    };

    let targets: Vec<Event> = db
        .latest_events()?
        .into_iter()
        .filter(|event| only.as_ref().is_none_or(|id| *id == event.task))
        .filter(|event| accepts(Some(event.kind), kind))
        .collect();

    if targets.is_empty() {
        let state = if kind == EventKind::Resume { "paused" } else { "running" };
        match only {
            Some(id) => anyhow::bail!("{} is not {state}", names.get(&id)),
            None => anyhow::bail!("no {state} task"),
        }
    }

    for latest in &targets {
        ensure_in_order(names.get(&latest.task), latest, at, tz)?;
    }
    let events = targets
        .iter()
        .map(|latest| twt_db::new_event(&latest.task, at, kind, note.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    db.insert_events(&events)?;
    for event in &events {
        writeln!(
            writer,
            "{} {} at {}",
            verb(kind),
            names.get(&event.task),
            format_local(at, tz)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 27, h, m, 0).unwrap()
    }

    fn run_start(db: &mut Database, name: &str, when: DateTime<Utc>) -> Result<String> {
        let mut out = Vec::new();
        start(&mut out, db, Berlin, name, when, None)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn run(
        db: &mut Database,
        kind: EventKind,
        only: Option<&str>,
        when: DateTime<Utc>,
    ) -> Result<String> {
        let mut out = Vec::new();
        transition(&mut out, db, Berlin, kind, only, when, None)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn kinds(db: &Database) -> Vec<EventKind> {
        db.list_events().unwrap().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn start_creates_task_and_reports_local_time() {
        let mut db = Database::open_in_memory().unwrap();
        let output = run_start(&mut db, "dev", at(8, 0)).unwrap();
        assert_eq!(output, "Started dev at 2025-01-27 09:00\n");
        assert_eq!(db.list_tasks().unwrap()[0].name, "dev");
        assert_eq!(kinds(&db), vec![EventKind::Start]);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        run_start(&mut db, "dev", at(8, 0)).unwrap();
        let err = run_start(&mut db, "dev", at(9, 0)).unwrap_err();
        assert!(err.to_string().contains("already running"));
    }

    #[test]
    fn pause_resume_stop_cycle() {
        let mut db = Database::open_in_memory().unwrap();
        run_start(&mut db, "dev", at(8, 0)).unwrap();
        run(&mut db, EventKind::Pause, None, at(10, 0)).unwrap();

        let err = run_start(&mut db, "dev", at(10, 30)).unwrap_err();
        assert!(err.to_string().contains("twt resume"));

        run(&mut db, EventKind::Resume, None, at(11, 0)).unwrap();
        let output = run(&mut db, EventKind::End, Some("dev"), at(12, 0)).unwrap();
        assert_eq!(output, "Stopped dev at 2025-01-27 13:00\n");
        assert_eq!(
            kinds(&db),
            vec![
                EventKind::Start,
                EventKind::Pause,
                EventKind::Resume,
                EventKind::End
            ]
        );
    }

    #[test]
    fn stop_without_task_stops_all_open_tasks() {
        let mut db = Database::open_in_memory().unwrap();
        run_start(&mut db, "dev", at(8, 0)).unwrap();
        run_start(&mut db, "ops", at(8, 30)).unwrap();
        run(&mut db, EventKind::Pause, Some("ops"), at(9, 0)).unwrap();

        let output = run(&mut db, EventKind::End, None, at(10, 0)).unwrap();
        insta::assert_snapshot!(output, @r"
        Stopped dev at 2025-01-27 11:00
        Stopped ops at 2025-01-27 11:00
        ");
        assert!(
            db.latest_events()
                .unwrap()
                .iter()
                .all(|event| event.kind == EventKind::End)
        );
        assert_eq!(db.list_events().unwrap().len(), 5);
    }

    #[test]
    fn stop_without_task_writes_one_batch() {
        let mut db = Database::open_in_memory().unwrap();
        run_start(&mut db, "dev", at(8, 0)).unwrap();
        run_start(&mut db, "ops", at(8, 30)).unwrap();
        run(&mut db, EventKind::Pause, None, at(9, 0)).unwrap();

        let paused: Vec<_> = db
            .list_events()
            .unwrap()
            .into_iter()
            .filter(|event| event.kind == EventKind::Pause)
            .collect();
        assert_eq!(paused.len(), 2);
        assert!(paused.iter().all(|event| event.instant == at(9, 0)));
        assert_ne!(paused[0].id, paused[1].id);
    }

    #[test]
    fn inactive_task_cannot_be_started() {
        let mut db = Database::open_in_memory().unwrap();
        let task = db.create_task("dev").unwrap();
        db.set_task_active(&task.id, false).unwrap();
        let err = run_start(&mut db, "dev", at(8, 0)).unwrap_err();
        assert_eq!(err.to_string(), "dev is inactive; use `twt activate dev` first");
        assert!(kinds(&db).is_empty());
    }

    #[test]
    fn nothing_to_do_is_an_error() {
        let mut db = Database::open_in_memory().unwrap();
        let err = run(&mut db, EventKind::End, None, at(10, 0)).unwrap_err();
        assert_eq!(err.to_string(), "no running task");

        run_start(&mut db, "dev", at(8, 0)).unwrap();
        let err = run(&mut db, EventKind::Resume, Some("dev"), at(10, 0)).unwrap_err();
        assert_eq!(err.to_string(), "dev is not paused");

        let err = run(&mut db, EventKind::Pause, Some("ghost"), at(10, 0)).unwrap_err();
        assert_eq!(err.to_string(), "unknown task: ghost");
    }

    #[test]
    fn events_before_latest_are_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        run_start(&mut db, "dev", at(10, 0)).unwrap();
        let err = run(&mut db, EventKind::End, None, at(9, 0)).unwrap_err();
        assert!(err.to_string().contains("already has a start event"));
        assert_eq!(kinds(&db), vec![EventKind::Start]);
    }
}
