//! Decomposition of a window into calendar sub-periods.

use std::iter::FusedIterator;

use crate::calendar::{Calendar, Instant, Unit, Window};

/// Splits `window` into consecutive sub-windows of `unit`.
///
/// The first sub-window starts at the window's own begin, even when that is
/// mid-period; every later one starts on a civil `unit` boundary. Each
/// sub-window ends where the next starts and the last ends at the window end,
/// so the pieces cover the window exactly.
pub fn split(calendar: &Calendar, unit: Unit, window: &Window) -> Periods {
    Periods {
        calendar: *calendar,
        unit,
        anchor: calendar.start_of(unit, window.begin()),
        step: 1,
        next_start: Some(*window.begin()),
        end: *window.end(),
    }
}

/// Lazy iterator over the sub-windows of a split. Cloning restarts from the
/// clone's position.
#[derive(Debug, Clone)]
pub struct Periods {
    calendar: Calendar,
    unit: Unit,
    anchor: Instant,
    step: i32,
    next_start: Option<Instant>,
    end: Instant,
}

impl Periods {
    /// Start instants of the remaining sub-windows.
    pub fn starts(self) -> impl Iterator<Item = Instant> {
        self.map(|window| *window.begin())
    }

    /// Next civil boundary strictly after `after`, if it is before the end.
    fn boundary_after(&mut self, after: &Instant) -> Option<Instant> {
        loop {
            let boundary = self
                .calendar
                .start_of(self.unit, &self.calendar.add(&self.anchor, self.unit, self.step));
            if boundary >= self.end {
                return None;
            }
            if boundary > *after {
                return Some(boundary);
            }
            // A boundary swallowed by a DST gap can repeat; keep stepping.
            self.step = self.step.checked_add(1)?;
        }
    }
}

impl Iterator for Periods {
    type Item = Window;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start.take()?;
        let next = self.boundary_after(&start);
        if next.is_some() {
            self.step = self.step.saturating_add(1);
        }
        self.next_start = next;
        Window::new(start, next.unwrap_or(self.end))
    }
}

impl FusedIterator for Periods {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Weekday};
    use chrono_tz::Europe::Berlin;

    fn berlin(y: i32, m: u32, d: u32, h: u32, min: u32) -> Instant {
        Berlin.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn window(begin: Instant, end: Instant) -> Window {
        Window::new(begin, end).unwrap()
    }

    /// Asserts the pieces tile the window with no gap or overlap.
    fn assert_tiles(pieces: &[Window], whole: &Window) {
        assert!(!pieces.is_empty());
        assert_eq!(pieces[0].begin(), whole.begin());
        assert_eq!(pieces[pieces.len() - 1].end(), whole.end());
        for pair in pieces.windows(2) {
            assert_eq!(pair[0].end(), pair[1].begin());
            assert!(pair[0].begin() < pair[1].begin());
        }
        let total: Duration = pieces.iter().map(Window::duration).sum();
        assert_eq!(total, whole.duration());
    }

    #[test]
    fn monday_to_thursday_by_day() {
        // Jan 27, 2025 is a Monday
        let whole = window(berlin(2025, 1, 27, 0, 0), berlin(2025, 1, 30, 0, 0));
        let pieces: Vec<_> = split(&Calendar::default(), Unit::Day, &whole).collect();

        assert_eq!(
            pieces,
            vec![
                window(berlin(2025, 1, 27, 0, 0), berlin(2025, 1, 28, 0, 0)),
                window(berlin(2025, 1, 28, 0, 0), berlin(2025, 1, 29, 0, 0)),
                window(berlin(2025, 1, 29, 0, 0), berlin(2025, 1, 30, 0, 0)),
            ]
        );
    }

    #[test]
    fn first_piece_starts_at_mid_period_begin() {
        let whole = window(berlin(2025, 1, 15, 10, 30), berlin(2025, 1, 18, 0, 0));
        let starts: Vec<_> = split(&Calendar::default(), Unit::Day, &whole)
            .starts()
            .collect();
        assert_eq!(
            starts,
            vec![
                berlin(2025, 1, 15, 10, 30),
                berlin(2025, 1, 16, 0, 0),
                berlin(2025, 1, 17, 0, 0),
            ]
        );
    }

    #[test]
    fn last_piece_ends_at_open_end() {
        // All-data style window ending at "now"
        let whole = window(berlin(2025, 1, 1, 0, 0), berlin(2025, 3, 12, 16, 45));
        let pieces: Vec<_> = split(&Calendar::default(), Unit::Month, &whole).collect();
        assert_eq!(pieces.len(), 3);
        assert_eq!(*pieces[2].begin(), berlin(2025, 3, 1, 0, 0));
        assert_eq!(*pieces[2].end(), berlin(2025, 3, 12, 16, 45));
        assert_tiles(&pieces, &whole);
    }

    #[test]
    fn month_by_week_uses_week_start() {
        let whole = window(berlin(2025, 2, 1, 0, 0), berlin(2025, 3, 1, 0, 0));
        let starts: Vec<_> = split(&Calendar::new(Weekday::Mon), Unit::Week, &whole)
            .starts()
            .collect();
        // Feb 1, 2025 is a Saturday
        assert_eq!(
            starts,
            vec![
                berlin(2025, 2, 1, 0, 0),
                berlin(2025, 2, 3, 0, 0),
                berlin(2025, 2, 10, 0, 0),
                berlin(2025, 2, 17, 0, 0),
                berlin(2025, 2, 24, 0, 0),
            ]
        );
    }

    #[test]
    fn window_shorter_than_unit_is_one_piece() {
        let whole = window(berlin(2025, 1, 27, 9, 0), berlin(2025, 1, 27, 17, 0));
        let pieces: Vec<_> = split(&Calendar::default(), Unit::Week, &whole).collect();
        assert_eq!(pieces, vec![whole]);
    }

    #[test]
    fn days_across_dst_change_tile_exactly() {
        let whole = window(berlin(2024, 3, 29, 0, 0), berlin(2024, 4, 2, 0, 0));
        let pieces: Vec<_> = split(&Calendar::default(), Unit::Day, &whole).collect();
        assert_eq!(pieces.len(), 4);
        // The switch day is only 23 hours long
        assert_eq!(pieces[2].duration(), Duration::hours(23));
        assert_tiles(&pieces, &whole);
    }

    #[test]
    fn year_by_month_tiles() {
        let whole = window(berlin(2024, 1, 1, 0, 0), berlin(2025, 1, 1, 0, 0));
        let pieces: Vec<_> = split(&Calendar::default(), Unit::Month, &whole).collect();
        assert_eq!(pieces.len(), 12);
        assert_eq!(*pieces[1].begin(), berlin(2024, 2, 1, 0, 0));
        assert_tiles(&pieces, &whole);
    }

    #[test]
    fn split_is_restartable() {
        let whole = window(berlin(2025, 1, 27, 0, 0), berlin(2025, 2, 3, 0, 0));
        let periods = split(&Calendar::default(), Unit::Day, &whole);
        let first: Vec<_> = periods.clone().collect();
        let second: Vec<_> = periods.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 7);
    }

    #[test]
    fn arbitrary_windows_tile_for_every_unit() {
        let calendar = Calendar::default();
        let begins = [
            berlin(2024, 1, 31, 13, 7),
            berlin(2024, 2, 29, 0, 0),
            berlin(2024, 10, 26, 23, 59),
        ];
        for begin in begins {
            for days in [1, 6, 40, 400] {
                let whole = window(begin, begin + Duration::days(days) + Duration::minutes(3));
                for unit in [Unit::Day, Unit::Week, Unit::Month, Unit::Year] {
                    let pieces: Vec<_> = split(&calendar, unit, &whole).collect();
                    assert_tiles(&pieces, &whole);
                }
            }
        }
    }
}
