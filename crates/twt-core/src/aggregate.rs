//! Pairing of task events into spans and per-task time totals.
//!
//! # Algorithm Summary
//!
//! Events are walked in the order supplied (causal order from the store). Each
//! task carries a small state machine:
//!
//! - `start`/`resume` open a span, `end`/`pause` close it
//! - a span is clamped to the window before it is credited
//! - a span still open after the last event runs until the window end, or an
//!   earlier cut-off such as "now"
//! - a task whose first event closes a span was already running when the
//!   supplied data began, so that span is credited from the window begin
//!
//! Out-of-order markers (a second `start` while running, `end` while idle) are
//! skipped. Totals are [`TimeSum`]s and cannot go negative.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::calendar::Window;
use crate::event::Event;
use crate::event_kind::EventKind;
use crate::time_sum::TimeSum;
use crate::types::TaskId;

/// Time per task, ordered by task ID. Tasks without time are absent.
pub type TaskSums = BTreeMap<TaskId, TimeSum>;

/// Totals for one sub-window of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodSums {
    pub window: Window,
    pub sums: TaskSums,
}

/// Where a task stands while its events are replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    /// No event seen for the task yet.
    Unseen,
    Running { since: DateTime<Utc> },
    Paused,
    Idle,
}

#[derive(Debug)]
struct Tally {
    state: TaskState,
    sum: TimeSum,
}

impl Tally {
    const fn new() -> Self {
        Self {
            state: TaskState::Unseen,
            sum: TimeSum::ZERO,
        }
    }

    fn credit(&mut self, window: &Window, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.sum += window.overlap(start, end);
    }

    fn apply(&mut self, window: &Window, event: &Event) {
        let at = event.instant;
        self.state = match (self.state, event.kind) {
            (TaskState::Unseen | TaskState::Paused | TaskState::Idle, EventKind::Start)
            | (TaskState::Unseen | TaskState::Paused, EventKind::Resume) => {
                TaskState::Running { since: at }
            }
            (TaskState::Running { since }, EventKind::End) => {
                self.credit(window, since, at);
                TaskState::Idle
            }
            (TaskState::Running { since }, EventKind::Pause) => {
                self.credit(window, since, at);
                TaskState::Paused
            }
            (TaskState::Unseen, EventKind::End) => {
                self.credit(window, window.begin_utc(), at);
                TaskState::Idle
            }
            (TaskState::Unseen, EventKind::Pause) => {
                self.credit(window, window.begin_utc(), at);
                TaskState::Paused
            }
            (TaskState::Paused, EventKind::End) => TaskState::Idle,
            (state, kind) => {
                tracing::warn!(
                    task = %event.task,
                    event = %event.id,
                    ?state,
                    %kind,
                    "skipping out-of-order event"
                );
                state
            }
        };
    }

    fn finish(mut self, window: &Window, cutoff: DateTime<Utc>) -> TimeSum {
        if let TaskState::Running { since } = self.state {
            self.credit(window, since, cutoff.min(window.end_utc()));
        }
        self.sum
    }
}

/// Totals per task over `window`, running open spans to the window end.
pub fn aggregate(window: &Window, events: &[Event]) -> TaskSums {
    aggregate_until(window, events, window.end_utc())
}

/// Totals per task over `window`, running open spans only until `cutoff`.
///
/// `events` may include events outside the window; only the parts of spans
/// inside the window are counted.
pub fn aggregate_until(window: &Window, events: &[Event], cutoff: DateTime<Utc>) -> TaskSums {
    let mut tallies: BTreeMap<&TaskId, Tally> = BTreeMap::new();
    for event in events {
        tallies
            .entry(&event.task)
            .or_insert_with(Tally::new)
            .apply(window, event);
    }

    tallies
        .into_iter()
        .map(|(task, tally)| (task.clone(), tally.finish(window, cutoff)))
        .filter(|(_, sum)| !sum.is_zero())
        .collect()
}

/// Aggregates every sub-window independently, in parallel, keeping the
/// chronological order of `periods`.
pub fn aggregate_periods<I>(periods: I, events: &[Event], cutoff: DateTime<Utc>) -> Vec<PeriodSums>
where
    I: IntoIterator<Item = Window>,
{
    let windows: Vec<Window> = periods.into_iter().collect();
    tracing::debug!(periods = windows.len(), events = events.len(), "aggregating periods");
    windows
        .into_par_iter()
        .map(|window| PeriodSums {
            sums: aggregate_until(&window, events, cutoff),
            window,
        })
        .collect()
}

/// Sums per task across all periods.
pub fn merge_periods(periods: &[PeriodSums]) -> TaskSums {
    let mut totals = TaskSums::new();
    for period in periods {
        for (task, sum) in &period.sums {
            *totals.entry(task.clone()).or_default() += *sum;
        }
    }
    totals
}
