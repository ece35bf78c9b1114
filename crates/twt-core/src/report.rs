//! Report assembly: resolve a selection, read the store, aggregate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{PeriodSums, TaskSums, aggregate_periods, aggregate_until};
use crate::calendar::{Calendar, Instant, Unit, Window};
use crate::error::{Error, ReportError};
use crate::event::Event;
use crate::period::split;
use crate::range::{DataBounds, Range, resolve, selection_name};

/// Read access to recorded events.
///
/// Implemented by the SQLite store and by in-memory fixtures in tests.
pub trait EventStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Events with `begin <= instant < end`, ascending by instant.
    fn events_between(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, Self::Error>;

    /// The latest event of every task with events before `instant`.
    ///
    /// Whatever its kind, that event tells whether the task was running,
    /// paused or idle at `instant`.
    fn latest_before(&self, instant: DateTime<Utc>) -> Result<Vec<Event>, Self::Error>;

    /// Instants of the first and last recorded events.
    fn bounds(&self) -> Result<DataBounds, Self::Error>;
}

/// How a report groups its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grouping {
    /// The raw events of the window.
    None,
    /// One total per task.
    ByTask,
    ByTaskPerDay,
    ByTaskPerWeek,
    ByTaskPerMonth,
}

impl Grouping {
    /// Sub-period unit for per-period groupings.
    pub const fn period_unit(self) -> Option<Unit> {
        match self {
            Self::None | Self::ByTask => None,
            Self::ByTaskPerDay => Some(Unit::Day),
            Self::ByTaskPerWeek => Some(Unit::Week),
            Self::ByTaskPerMonth => Some(Unit::Month),
        }
    }

    /// Prefix for exported report file names.
    pub const fn file_prefix(self) -> &'static str {
        match self {
            Self::None => "events",
            Self::ByTask => "sums",
            Self::ByTaskPerDay => "sums-per-day",
            Self::ByTaskPerWeek => "sums-per-week",
            Self::ByTaskPerMonth => "sums-per-month",
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ByTask => "by-task",
            Self::ByTaskPerDay => "by-task-per-day",
            Self::ByTaskPerWeek => "by-task-per-week",
            Self::ByTaskPerMonth => "by-task-per-month",
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Grouping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "none" | "events" => Ok(Self::None),
            "by-task" | "task" => Ok(Self::ByTask),
            "by-task-per-day" | "day" => Ok(Self::ByTaskPerDay),
            "by-task-per-week" | "week" => Ok(Self::ByTaskPerWeek),
            "by-task-per-month" | "month" => Ok(Self::ByTaskPerMonth),
            _ => Err(Error::InvalidSelection {
                kind: "grouping",
                value: s.to_string(),
            }),
        }
    }
}

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRequest {
    pub range: Range,
    pub unit: Unit,
    pub grouping: Grouping,
}

impl ReportRequest {
    /// Name of the selection, e.g. "last week".
    pub fn name(&self) -> String {
        selection_name(self.range, self.unit)
    }

    /// File name stem, e.g. `sums-per-day-last-week`.
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.grouping.file_prefix(), self.name().replace(' ', "-"))
    }
}

/// Aggregated data of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportBody {
    Events(Vec<Event>),
    Sums(TaskSums),
    PerPeriod { unit: Unit, periods: Vec<PeriodSums> },
}

/// A generated report, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub request: ReportRequest,
    pub window: Window,
    pub generated_at: Instant,
    pub body: ReportBody,
}

/// Generates the report for `request` as of `now`.
///
/// Spans still running at `now` are counted up to `now` only.
pub fn generate<S: EventStore>(
    store: &S,
    calendar: &Calendar,
    request: ReportRequest,
    now: Instant,
) -> Result<Report, ReportError> {
    let bounds = if request.range == Range::AllData {
        store.bounds().map_err(ReportError::store)?
    } else {
        DataBounds::default()
    };
    let window = resolve(calendar, request.range, request.unit, &now, &bounds)?;

    let events = store
        .events_between(window.begin_utc(), window.end_utc())
        .map_err(ReportError::store)?;
    tracing::debug!(%window, events = events.len(), grouping = %request.grouping, "fetched events");

    let body = if request.grouping == Grouping::None {
        ReportBody::Events(events)
    } else {
        let events = with_carry_in(store, &window, events)?;
        let cutoff = now.with_timezone(&Utc);
        match request.grouping.period_unit() {
            None => ReportBody::Sums(aggregate_until(&window, &events, cutoff)),
            Some(unit) => {
                let periods = aggregate_periods(split(calendar, unit, &window), &events, cutoff);
                ReportBody::PerPeriod { unit, periods }
            }
        }
    };

    Ok(Report {
        request,
        window,
        generated_at: now,
        body,
    })
}

/// Prepends every task's latest event before the window begin, so each task
/// enters the window running, paused or idle as it was.
fn with_carry_in<S: EventStore>(
    store: &S,
    window: &Window,
    events: Vec<Event>,
) -> Result<Vec<Event>, ReportError> {
    let mut carried = store
        .latest_before(window.begin_utc())
        .map_err(ReportError::store)?;
    if carried.is_empty() {
        return Ok(events);
    }
    tracing::debug!(tasks = carried.len(), "carrying task states into window");
    carried.sort_by_key(|event| event.instant);
    carried.extend(events);
    Ok(carried)
}
