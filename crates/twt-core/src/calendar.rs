//! Civil calendar arithmetic on timezone-aware instants.
//!
//! Every operation works on the wall clock of the instant's own zone, so
//! "start of day" is the user's midnight and not UTC midnight. Results keep the
//! input's zone.
//!
//! # DST
//!
//! Local times that fall into a spring-forward gap resolve to the first instant
//! after the gap. Ambiguous local times (fall-back) resolve to the earlier
//! instant.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Days, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// An absolute point in time bound to a civil timezone.
pub type Instant = DateTime<Tz>;

/// Calendar granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    /// Lowercase name used in report names and on the command line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(Error::InvalidSelection {
                kind: "unit",
                value: s.to_string(),
            }),
        }
    }
}

/// Calendar conventions for civil period boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    week_start: Weekday,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::new(Weekday::Mon)
    }
}

impl Calendar {
    /// Creates a calendar whose weeks begin on `week_start`.
    pub const fn new(week_start: Weekday) -> Self {
        Self { week_start }
    }

    /// First day of the week.
    pub const fn week_start(&self) -> Weekday {
        self.week_start
    }

    /// First instant of the civil day containing `instant`.
    pub fn start_of_day(&self, instant: &Instant) -> Instant {
        midnight(instant.timezone(), instant.date_naive())
    }

    /// First instant of the week containing `instant`.
    pub fn start_of_week(&self, instant: &Instant) -> Instant {
        let date = instant.date_naive();
        let offset = (7 + date.weekday().num_days_from_monday()
            - self.week_start.num_days_from_monday())
            % 7;
        let first = date
            .checked_sub_days(Days::new(u64::from(offset)))
            .unwrap_or(date);
        midnight(instant.timezone(), first)
    }

    /// First instant of the month containing `instant`.
    pub fn start_of_month(&self, instant: &Instant) -> Instant {
        let date = instant.date_naive();
        midnight(instant.timezone(), date.with_day(1).unwrap_or(date))
    }

    /// First instant of the year containing `instant`.
    pub fn start_of_year(&self, instant: &Instant) -> Instant {
        let date = instant.date_naive();
        let first = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
        midnight(instant.timezone(), first)
    }

    /// First instant of the `unit` period containing `instant`.
    pub fn start_of(&self, unit: Unit, instant: &Instant) -> Instant {
        match unit {
            Unit::Day => self.start_of_day(instant),
            Unit::Week => self.start_of_week(instant),
            Unit::Month => self.start_of_month(instant),
            Unit::Year => self.start_of_year(instant),
        }
    }

    /// Steps `count` units forward (or backward when negative) on the wall clock.
    ///
    /// Month and year steps keep the day of month, clamped to the last day of
    /// the target month. Steps past the representable range return `instant`.
    pub fn add(&self, instant: &Instant, unit: Unit, count: i32) -> Instant {
        let local = instant.naive_local();
        let magnitude = count.unsigned_abs();
        let stepped = match unit {
            Unit::Day => shift_days(local, count, u64::from(magnitude)),
            Unit::Week => shift_days(local, count, u64::from(magnitude) * 7),
            Unit::Month => shift_months(local, count, magnitude),
            Unit::Year => magnitude
                .checked_mul(12)
                .and_then(|months| shift_months(local, count, months)),
        };
        stepped.map_or(*instant, |naive| localize(instant.timezone(), naive))
    }
}

fn shift_days(local: NaiveDateTime, sign: i32, days: u64) -> Option<NaiveDateTime> {
    if sign < 0 {
        local.checked_sub_days(Days::new(days))
    } else {
        local.checked_add_days(Days::new(days))
    }
}

fn shift_months(local: NaiveDateTime, sign: i32, months: u32) -> Option<NaiveDateTime> {
    if sign < 0 {
        local.checked_sub_months(Months::new(months))
    } else {
        local.checked_add_months(Months::new(months))
    }
}

fn midnight(tz: Tz, date: NaiveDate) -> Instant {
    localize(tz, date.and_time(NaiveTime::MIN))
}

/// Maps a wall-clock time in `tz` to an instant.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> Instant {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => {
            // Read the wall time with the offset in force before the gap; that
            // lands on the transition for a time at the gap's start.
            let probe = naive - Duration::days(1);
            let before = tz.offset_from_utc_datetime(&probe).fix();
            let utc = naive - Duration::seconds(i64::from(before.local_minus_utc()));
            tz.from_utc_datetime(&utc)
        }
    }
}

/// A half-open instant range `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    begin: Instant,
    end: Instant,
}

impl Window {
    /// Creates a window, or `None` unless `begin < end`.
    pub fn new(begin: Instant, end: Instant) -> Option<Self> {
        (begin < end).then_some(Self { begin, end })
    }

    pub const fn begin(&self) -> &Instant {
        &self.begin
    }

    pub const fn end(&self) -> &Instant {
        &self.end
    }

    /// Begin as UTC, the representation stored events use.
    pub fn begin_utc(&self) -> DateTime<Utc> {
        self.begin.with_timezone(&Utc)
    }

    /// End as UTC, the representation stored events use.
    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.with_timezone(&Utc)
    }

    /// Whether `instant` lies in `[begin, end)`.
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.begin_utc() && *instant < self.end_utc()
    }

    /// Length of the window.
    pub fn duration(&self) -> Duration {
        self.end - self.begin
    }

    /// Length of `[start, end)` after clamping it to this window; zero when
    /// the span misses the window or ends before it starts.
    pub fn overlap(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Duration {
        let start = start.max(self.begin_utc());
        let end = end.min(self.end_utc());
        if end > start {
            end - start
        } else {
            Duration::zero()
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin.to_rfc3339(), self.end.to_rfc3339())
    }
}
