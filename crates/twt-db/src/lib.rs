//! Storage layer for work time tracking.
//!
//! Provides persistence for tasks and their start/stop events using `rusqlite`,
//! and implements [`twt_core::EventStore`] so reports can read from it.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). The fixed width keeps lexicographic
//! ordering equal to chronological ordering, so range queries compare strings.
//!
//! ## Event Order
//!
//! Events with the same timestamp are ordered by `rowid`, i.e. insertion order.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use twt_core::{
    DataBounds, Event, EventId, EventKind, EventStore, Task, TaskId, UnknownEventKind,
    ValidationError,
};
use uuid::Uuid;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse an event timestamp.
    #[error("invalid timestamp for event {event_id}: {timestamp}")]
    TimestampParse {
        event_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored event kind is not known.
    #[error("invalid kind for event {event_id}")]
    InvalidEventKind {
        event_id: String,
        #[source]
        source: UnknownEventKind,
    },
    /// A stored or supplied identifier or name is invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// An event refers to a task that does not exist.
    #[error("unknown task: {0}")]
    UnknownTask(String),
    /// A task with this name already exists.
    #[error("task already exists: {0}")]
    DuplicateTask(String),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

const EVENT_COLUMNS: &str = "id, timestamp, type, task_id, note";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            -- Events table: append-only log of task markers
            -- timestamp: RFC 3339 UTC (e.g., '2024-01-15T10:30:00.000Z')
            -- type: event kind ('start', 'end', 'pause', 'resume')
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                type TEXT NOT NULL,
                task_id TEXT NOT NULL,
                note TEXT,
                FOREIGN KEY (task_id) REFERENCES tasks(id)
            );

            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_task ON events(task_id, timestamp);
            ",
        )?;
        Ok(())
    }

    // ========== Tasks ==========

    /// Creates a new active task with a generated ID.
    pub fn create_task(&mut self, name: &str) -> Result<Task, DbError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty { field: "task name" }.into());
        }
        if self.find_task_by_name(name)?.is_some() {
            return Err(DbError::DuplicateTask(name.to_string()));
        }
        let task = Task {
            id: TaskId::new(Uuid::new_v4().to_string())?,
            name: name.to_string(),
            active: true,
        };
        self.conn.execute(
            "INSERT INTO tasks (id, name, active, created_at) VALUES (?, ?, 1, ?)",
            params![task.id.as_str(), task.name, format_timestamp(Utc::now())],
        )?;
        tracing::debug!(task = %task.id, name = %task.name, "created task");
        Ok(task)
    }

    /// Returns the task with this name, creating it if needed.
    pub fn task_by_name_or_create(&mut self, name: &str) -> Result<Task, DbError> {
        match self.find_task_by_name(name.trim())? {
            Some(task) => Ok(task),
            None => self.create_task(name),
        }
    }

    /// Looks up a task by its exact name.
    pub fn find_task_by_name(&self, name: &str) -> Result<Option<Task>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, active FROM tasks WHERE name = ?",
                [name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, name, active)| {
            Ok::<_, DbError>(Task {
                id: TaskId::new(id)?,
                name,
                active,
            })
        })
        .transpose()
    }

    /// Lists all tasks ordered by name.
    pub fn list_tasks(&self) -> Result<Vec<Task>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, active FROM tasks ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
            ))
        })?;
        let mut tasks = Vec::new();
        for row in rows {
            let (id, name, active) = row?;
            tasks.push(Task {
                id: TaskId::new(id)?,
                name,
                active,
            });
        }
        Ok(tasks)
    }

    /// Marks a task active or inactive.
    pub fn set_task_active(&mut self, id: &TaskId, active: bool) -> Result<(), DbError> {
        let updated = self.conn.execute(
            "UPDATE tasks SET active = ? WHERE id = ?",
            params![active, id.as_str()],
        )?;
        if updated == 0 {
            return Err(DbError::UnknownTask(id.to_string()));
        }
        Ok(())
    }

    // ========== Events ==========

    /// Inserts a batch of events, ignoring duplicates by ID.
    ///
    /// Returns the number of events actually written.
    pub fn insert_events(&mut self, events: &[Event]) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut known = tx.prepare("SELECT 1 FROM tasks WHERE id = ?")?;
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO events (id, timestamp, type, task_id, note)
                VALUES (?, ?, ?, ?, ?)
                ",
            )?;
            for event in events {
                if !known.exists([event.task.as_str()])? {
                    return Err(DbError::UnknownTask(event.task.to_string()));
                }
                inserted += stmt.execute(params![
                    event.id.as_str(),
                    format_timestamp(event.instant),
                    event.kind.as_str(),
                    event.task.as_str(),
                    event.note,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(inserted, "inserted events");
        Ok(inserted)
    }

    /// Records a new event with a generated ID.
    pub fn record_event(
        &mut self,
        task: &TaskId,
        instant: DateTime<Utc>,
        kind: EventKind,
        note: Option<String>,
    ) -> Result<Event, DbError> {
        let event = new_event(task, instant, kind, note)?;
        self.insert_events(std::slice::from_ref(&event))?;
        Ok(event)
    }

    /// Lists all events in timestamp order.
    pub fn list_events(&self) -> Result<Vec<Event>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY timestamp ASC, rowid ASC"
        ))?;
        collect_events(stmt.query_map([], RawEvent::from_row)?)
    }

    /// Lists events within a time range.
    ///
    /// The range is inclusive of `start` and exclusive of `end`.
    pub fn list_events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE timestamp >= ? AND timestamp < ?
            ORDER BY timestamp ASC, rowid ASC
            "
        ))?;
        let rows = stmt.query_map(
            [format_timestamp(start), format_timestamp(end)],
            RawEvent::from_row,
        )?;
        collect_events(rows)
    }

    /// Per task, the latest event strictly before `instant`.
    pub fn latest_events_before(&self, instant: DateTime<Utc>) -> Result<Vec<Event>, DbError> {
        self.latest_events_per_task(Some(format_timestamp(instant)))
    }

    /// Per task, the latest event of every task, whenever it was recorded.
    pub fn latest_events(&self) -> Result<Vec<Event>, DbError> {
        self.latest_events_per_task(None)
    }

    fn latest_events_per_task(&self, before: Option<String>) -> Result<Vec<Event>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {EVENT_COLUMNS}
            FROM events AS e
            WHERE (?1 IS NULL OR e.timestamp < ?1)
              AND NOT EXISTS (
                  SELECT 1 FROM events AS later
                  WHERE later.task_id = e.task_id
                    AND (?1 IS NULL OR later.timestamp < ?1)
                    AND (later.timestamp > e.timestamp
                         OR (later.timestamp = e.timestamp AND later.rowid > e.rowid))
              )
            ORDER BY e.timestamp ASC, e.rowid ASC
            "
        ))?;
        collect_events(stmt.query_map([before], RawEvent::from_row)?)
    }

    /// Instants of the first and last stored events.
    pub fn event_bounds(&self) -> Result<DataBounds, DbError> {
        let (earliest, latest): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM events",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(DataBounds {
            earliest: earliest
                .map(|ts| parse_timestamp(&ts, "<earliest>"))
                .transpose()?,
            latest: latest
                .map(|ts| parse_timestamp(&ts, "<latest>"))
                .transpose()?,
        })
    }
}

impl EventStore for Database {
    type Error = DbError;

    fn events_between(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, Self::Error> {
        self.list_events_in_range(begin, end)
    }

    fn latest_before(&self, instant: DateTime<Utc>) -> Result<Vec<Event>, Self::Error> {
        self.latest_events_before(instant)
    }

    fn bounds(&self) -> Result<DataBounds, Self::Error> {
        self.event_bounds()
    }
}

/// Builds an event with a generated ID, ready for [`Database::insert_events`].
pub fn new_event(
    task: &TaskId,
    instant: DateTime<Utc>,
    kind: EventKind,
    note: Option<String>,
) -> Result<Event, DbError> {
    Ok(Event {
        id: EventId::new(Uuid::new_v4().to_string())?,
        task: task.clone(),
        instant,
        kind,
        note,
    })
}

/// An event row before validation.
struct RawEvent {
    id: String,
    timestamp: String,
    kind: String,
    task_id: String,
    note: Option<String>,
}

impl RawEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            kind: row.get(2)?,
            task_id: row.get(3)?,
            note: row.get(4)?,
        })
    }

    fn into_event(self) -> Result<Event, DbError> {
        let instant = parse_timestamp(&self.timestamp, &self.id)?;
        let kind = self
            .kind
            .parse::<EventKind>()
            .map_err(|source| DbError::InvalidEventKind {
                event_id: self.id.clone(),
                source,
            })?;
        Ok(Event {
            id: EventId::new(self.id)?,
            task: TaskId::new(self.task_id)?,
            instant,
            kind,
            note: self.note,
        })
    }
}

fn collect_events(
    rows: impl Iterator<Item = rusqlite::Result<RawEvent>>,
) -> Result<Vec<Event>, DbError> {
    let mut events = Vec::new();
    for row in rows {
        events.push(row?.into_event()?);
    }
    Ok(events)
}

fn parse_timestamp(timestamp: &str, event_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            event_id: event_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
