//! Resolution of relative range selections into concrete windows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{Calendar, Instant, Unit, Window};
use crate::error::Error;

/// Relative window selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Range {
    /// The previous completed period.
    Last,
    /// The period containing now.
    Current,
    /// The previous and the current period together.
    LastAndCurrent,
    /// Everything from the first recorded event up to now.
    AllData,
}

impl Range {
    /// Name used in report titles and file names.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::Current => "current",
            Self::LastAndCurrent => "last and current",
            Self::AllData => "all data",
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Range {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "last" => Ok(Self::Last),
            "current" => Ok(Self::Current),
            "last_and_current" => Ok(Self::LastAndCurrent),
            "all_data" | "all" => Ok(Self::AllData),
            _ => Err(Error::InvalidSelection {
                kind: "range",
                value: s.to_string(),
            }),
        }
    }
}

/// Name of a selection, e.g. "last week" or "all data".
///
/// The unit is meaningless for [`Range::AllData`] and left out.
pub fn selection_name(range: Range, unit: Unit) -> String {
    match range {
        Range::AllData => range.name().to_string(),
        _ => format!("{} {}", range.name(), unit.name()),
    }
}

/// Instants of the first and last recorded events, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataBounds {
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl DataBounds {
    pub const fn is_empty(&self) -> bool {
        self.earliest.is_none()
    }
}

/// Resolves `range` in periods of `unit` relative to `now`.
///
/// Windows follow the civil calendar of `now`'s zone and are half-open. A
/// current period is not cut at `now`; it ends where the next period begins.
pub fn resolve(
    calendar: &Calendar,
    range: Range,
    unit: Unit,
    now: &Instant,
    bounds: &DataBounds,
) -> Result<Window, Error> {
    let (begin, end) = match range {
        Range::Current => current(calendar, unit, now),
        Range::Last => last(calendar, unit, now),
        Range::LastAndCurrent => {
            let (begin, _) = last(calendar, unit, now);
            let (_, end) = current(calendar, unit, now);
            (begin, end)
        }
        Range::AllData => return all_data(calendar, now, bounds),
    };

    let window = Window::new(begin, end).ok_or_else(|| Error::InvalidSelection {
        kind: "unit",
        value: unit.to_string(),
    })?;
    tracing::debug!(%range, %unit, %window, "resolved range");
    Ok(window)
}

fn current(calendar: &Calendar, unit: Unit, now: &Instant) -> (Instant, Instant) {
    let begin = calendar.start_of(unit, now);
    let end = calendar.start_of(unit, &calendar.add(now, unit, 1));
    (begin, end)
}

fn last(calendar: &Calendar, unit: Unit, now: &Instant) -> (Instant, Instant) {
    let begin = calendar.start_of(unit, &calendar.add(now, unit, -1));
    let end = calendar.start_of(unit, now);
    (begin, end)
}

fn all_data(calendar: &Calendar, now: &Instant, bounds: &DataBounds) -> Result<Window, Error> {
    let earliest = bounds.earliest.ok_or(Error::NoData)?;
    let tz = now.timezone();
    let begin = calendar.start_of_day(&earliest.with_timezone(&tz));

    if let Some(window) = Window::new(begin, *now) {
        tracing::debug!(%window, "resolved all data");
        return Ok(window);
    }

    // Every recorded event lies after now; reach to the end of the latest
    // event's day instead.
    let latest = bounds.latest.unwrap_or(earliest).with_timezone(&tz);
    let end = calendar.start_of_day(&calendar.add(&latest, Unit::Day, 1));
    tracing::warn!(%now, %latest, "recorded events lie after now");
    Window::new(begin, end).ok_or(Error::NoData)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};
    use chrono_tz::Europe::Berlin;
    use chrono_tz::Tz;

    fn berlin(y: i32, m: u32, d: u32, h: u32, min: u32) -> Instant {
        Berlin
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .earliest()
            .unwrap()
    }

    fn no_data() -> DataBounds {
        DataBounds::default()
    }

    const UNITS: [Unit; 4] = [Unit::Day, Unit::Week, Unit::Month, Unit::Year];

    // ========== Period Selection Tests ==========

    #[test]
    fn current_week_for_known_date() {
        // Jan 29, 2025 is a Wednesday
        let now = berlin(2025, 1, 29, 10, 0);
        let window = resolve(&Calendar::default(), Range::Current, Unit::Week, &now, &no_data())
            .unwrap();
        assert_eq!(*window.begin(), berlin(2025, 1, 27, 0, 0));
        assert_eq!(*window.end(), berlin(2025, 2, 3, 0, 0));
    }

    #[test]
    fn last_week_for_known_date() {
        let now = berlin(2025, 1, 29, 10, 0);
        let window =
            resolve(&Calendar::default(), Range::Last, Unit::Week, &now, &no_data()).unwrap();
        assert_eq!(*window.begin(), berlin(2025, 1, 20, 0, 0));
        assert_eq!(*window.end(), berlin(2025, 1, 27, 0, 0));
    }

    #[test]
    fn last_month_from_end_of_march() {
        // Stepping back one month from Mar 31 clamps to Feb 28, still February
        let now = berlin(2025, 3, 31, 23, 0);
        let window =
            resolve(&Calendar::default(), Range::Last, Unit::Month, &now, &no_data()).unwrap();
        assert_eq!(*window.begin(), berlin(2025, 2, 1, 0, 0));
        assert_eq!(*window.end(), berlin(2025, 3, 1, 0, 0));
    }

    #[test]
    fn current_year_spans_calendar_year() {
        let now = berlin(2024, 7, 4, 12, 0);
        let window =
            resolve(&Calendar::default(), Range::Current, Unit::Year, &now, &no_data()).unwrap();
        assert_eq!(*window.begin(), berlin(2024, 1, 1, 0, 0));
        assert_eq!(*window.end(), berlin(2025, 1, 1, 0, 0));
    }

    #[test]
    fn current_week_with_sunday_start() {
        let calendar = Calendar::new(Weekday::Sun);
        let now = berlin(2025, 1, 29, 10, 0);
        let window = resolve(&calendar, Range::Current, Unit::Week, &now, &no_data()).unwrap();
        assert_eq!(*window.begin(), berlin(2025, 1, 26, 0, 0));
        assert_eq!(*window.end(), berlin(2025, 2, 2, 0, 0));
    }

    #[test]
    fn last_and_current_month_across_year_boundary() {
        let now = berlin(2025, 1, 10, 9, 0);
        let window = resolve(
            &Calendar::default(),
            Range::LastAndCurrent,
            Unit::Month,
            &now,
            &no_data(),
        )
        .unwrap();
        assert_eq!(*window.begin(), berlin(2024, 12, 1, 0, 0));
        assert_eq!(*window.end(), berlin(2025, 2, 1, 0, 0));
    }

    // ========== Properties ==========

    #[test]
    fn last_and_current_are_adjacent_for_every_unit() {
        let calendar = Calendar::default();
        let nows = [
            berlin(2024, 3, 31, 1, 30),
            berlin(2024, 10, 27, 2, 30),
            berlin(2024, 12, 31, 23, 59),
            berlin(2025, 1, 1, 0, 0),
            berlin(2024, 2, 29, 12, 0),
        ];
        for now in &nows {
            for unit in UNITS {
                let last = resolve(&calendar, Range::Last, unit, now, &no_data()).unwrap();
                let current = resolve(&calendar, Range::Current, unit, now, &no_data()).unwrap();
                let both =
                    resolve(&calendar, Range::LastAndCurrent, unit, now, &no_data()).unwrap();

                assert_eq!(last.end(), current.begin(), "gap for {unit} at {now}");
                assert!(current.contains(&now.with_timezone(&Utc)), "{unit} at {now}");
                assert_eq!(both.begin(), last.begin());
                assert_eq!(both.end(), current.end());
            }
        }
    }

    #[test]
    fn windows_follow_the_zone_of_now() {
        let tokyo: Tz = "Asia/Tokyo".parse().unwrap();
        // Same absolute instant: already Jan 1 in Tokyo, still Dec 31 in Berlin
        let now_berlin = berlin(2024, 12, 31, 18, 0);
        let now_tokyo = now_berlin.with_timezone(&tokyo);
        let calendar = Calendar::default();

        let berlin_year =
            resolve(&calendar, Range::Current, Unit::Year, &now_berlin, &no_data()).unwrap();
        let tokyo_year =
            resolve(&calendar, Range::Current, Unit::Year, &now_tokyo, &no_data()).unwrap();

        assert_eq!(*berlin_year.begin(), berlin(2024, 1, 1, 0, 0));
        assert_eq!(
            *tokyo_year.begin(),
            tokyo.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(tokyo_year.begin().timezone(), tokyo);
    }

    // ========== All Data Tests ==========

    #[test]
    fn all_data_on_empty_store_is_no_data() {
        let now = berlin(2025, 1, 29, 10, 0);
        let result = resolve(&Calendar::default(), Range::AllData, Unit::Week, &now, &no_data());
        assert_eq!(result, Err(Error::NoData));
    }

    #[test]
    fn all_data_runs_from_first_day_to_now() {
        let now = berlin(2025, 1, 29, 10, 0);
        let bounds = DataBounds {
            earliest: Some(berlin(2024, 11, 5, 14, 20).with_timezone(&Utc)),
            latest: Some(berlin(2025, 1, 28, 17, 0).with_timezone(&Utc)),
        };
        let window =
            resolve(&Calendar::default(), Range::AllData, Unit::Year, &now, &bounds).unwrap();
        assert_eq!(*window.begin(), berlin(2024, 11, 5, 0, 0));
        assert_eq!(*window.end(), now);
    }

    #[test]
    fn all_data_in_the_future_still_yields_a_window() {
        let now = berlin(2025, 1, 29, 10, 0);
        let bounds = DataBounds {
            earliest: Some(berlin(2025, 2, 1, 9, 0).with_timezone(&Utc)),
            latest: Some(berlin(2025, 2, 3, 9, 0).with_timezone(&Utc)),
        };
        let window =
            resolve(&Calendar::default(), Range::AllData, Unit::Week, &now, &bounds).unwrap();
        assert_eq!(*window.begin(), berlin(2025, 2, 1, 0, 0));
        assert_eq!(*window.end(), berlin(2025, 2, 4, 0, 0));
    }

    // ========== Naming and Parsing ==========

    #[test]
    fn selection_names() {
        assert_eq!(selection_name(Range::Last, Unit::Week), "last week");
        assert_eq!(
            selection_name(Range::LastAndCurrent, Unit::Month),
            "last and current month"
        );
        assert_eq!(selection_name(Range::AllData, Unit::Year), "all data");
    }

    #[test]
    fn range_parses_separators() {
        assert_eq!("last-and-current".parse::<Range>().unwrap(), Range::LastAndCurrent);
        assert_eq!("ALL_DATA".parse::<Range>().unwrap(), Range::AllData);
        assert!(matches!(
            "previous".parse::<Range>(),
            Err(Error::InvalidSelection { kind: "range", .. })
        ));
    }
}
