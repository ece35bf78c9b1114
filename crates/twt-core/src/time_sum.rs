//! Non-negative accumulated durations.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use chrono::Duration;
use serde::{Deserialize, Serialize};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Accumulated work time, kept to the nanosecond.
///
/// Sub-second parts are kept so that totals of adjacent windows add up to the
/// total of their union. Whole seconds are only taken when reading the sum
/// back. Additions saturate at the upper bound and are floored at zero, so a
/// malformed span can never drive a total negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSum(i64);

impl TimeSum {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn zero() -> Self {
        Self::ZERO
    }

    /// Creates a sum from seconds, flooring negative input at zero.
    #[must_use]
    pub const fn from_seconds(seconds: i64) -> Self {
        if seconds < 0 {
            Self(0)
        } else {
            Self(seconds.saturating_mul(NANOS_PER_SECOND))
        }
    }

    /// Adds a raw duration.
    #[must_use]
    pub fn add_duration(self, duration: Duration) -> Self {
        let nanos = duration.num_nanoseconds().unwrap_or(if duration < Duration::zero() {
            i64::MIN
        } else {
            i64::MAX
        });
        Self(self.0.saturating_add(nanos).max(0))
    }

    /// Adds another sum.
    #[must_use]
    pub const fn add_sum(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Whole seconds, rounded down.
    #[must_use]
    pub const fn as_seconds(self) -> i64 {
        self.0 / NANOS_PER_SECOND
    }

    #[must_use]
    pub fn to_duration(self) -> Duration {
        Duration::nanoseconds(self.0)
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Add for TimeSum {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.add_sum(rhs)
    }
}

impl Add<Duration> for TimeSum {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        self.add_duration(rhs)
    }
}

impl AddAssign for TimeSum {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.add_sum(rhs);
    }
}

impl AddAssign<Duration> for TimeSum {
    fn add_assign(&mut self, rhs: Duration) {
        *self = self.add_duration(rhs);
    }
}

impl Sum for TimeSum {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::add_sum)
    }
}

impl<'a> Sum<&'a Self> for TimeSum {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Serializes as whole seconds.
impl Serialize for TimeSum {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.as_seconds().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TimeSum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let seconds = i64::deserialize(deserializer)?;
        // Clamp on deserialization to be lenient with external data
        Ok(Self::from_seconds(seconds))
    }
}

/// Formats as `H:MM`, rounding down to the minute.
impl fmt::Display for TimeSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.as_seconds() / 60;
        write!(f, "{}:{:02}", minutes / 60, minutes % 60)
    }
}
