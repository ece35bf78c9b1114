//! Core domain logic for work time tracking.
//!
//! This crate contains the fundamental types and logic for:
//! - Calendar: civil period boundaries on timezone-aware instants
//! - Ranges: resolving "last week", "current month", ... into windows
//! - Periods: splitting a window into days, weeks or months
//! - Aggregation: pairing task events into per-task time sums
//! - Reports: the resolve, fetch, split, aggregate pipeline over an event store

mod aggregate;
pub mod calendar;
mod error;
pub mod event;
pub mod event_kind;
mod period;
pub mod range;
pub mod report;
mod time_sum;
pub mod types;

pub use aggregate::{
    PeriodSums, TaskSums, aggregate, aggregate_periods, aggregate_until, merge_periods,
};
pub use calendar::{Calendar, Instant, Unit, Window};
pub use error::{Error, ReportError};
pub use event::{Event, Task};
pub use event_kind::{EventKind, UnknownEventKind};
pub use period::{Periods, split};
pub use range::{DataBounds, Range, resolve, selection_name};
pub use report::{EventStore, Grouping, Report, ReportBody, ReportRequest, generate};
pub use time_sum::TimeSum;
pub use types::{EventId, TaskId, ValidationError};
