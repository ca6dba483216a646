//! ISO-8601 rule durations.
//!
//! Rules express their window as an ISO-8601 duration (`P7D`, `PT12H`,
//! `P1M2DT3H`). The window's oldest instant is computed by subtracting the
//! duration from the evaluation time, calendar-aware for years and months.

use crate::{Error, Result};
use chrono::{DateTime, Duration, Months, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

static DURATION_PATTERN: Lazy<Result<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^P(?:(?P<y>\d+)Y)?(?:(?P<mo>\d+)M)?(?:(?P<w>\d+)W)?(?:(?P<d>\d+)D)?(?:T(?:(?P<h>\d+)H)?(?:(?P<mi>\d+)M)?(?:(?P<s>\d+)S)?)?$",
    )
    .map_err(|e| Error::OperationFailed {
        operation: "compile_duration_pattern".to_string(),
        cause: e.to_string(),
    })
});

/// A parsed ISO-8601 duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleDuration {
    /// Calendar years.
    pub years: u32,
    /// Calendar months.
    pub months: u32,
    /// Weeks.
    pub weeks: u32,
    /// Days.
    pub days: u32,
    /// Hours.
    pub hours: u32,
    /// Minutes.
    pub minutes: u32,
    /// Seconds.
    pub seconds: u32,
}

impl RuleDuration {
    /// Parses an ISO-8601 duration such as `P1Y2M10DT2H30M`.
    ///
    /// At least one component must be present and a `T` must be followed by a
    /// time component.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDuration`] if the string is not a duration.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidDuration {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let pattern = (*DURATION_PATTERN).as_ref().map_err(|e| Error::OperationFailed {
            operation: "parse_duration".to_string(),
            cause: e.to_string(),
        })?;

        let trimmed = value.trim();
        if trimmed == "P" || trimmed.ends_with('T') {
            return Err(invalid("no components"));
        }

        let captures = pattern
            .captures(trimmed)
            .ok_or_else(|| invalid("not an ISO-8601 duration"))?;

        let component = |name: &str| -> Result<u32> {
            captures.name(name).map_or(Ok(0), |m| {
                m.as_str()
                    .parse::<u32>()
                    .map_err(|e| invalid(&e.to_string()))
            })
        };

        Ok(Self {
            years: component("y")?,
            months: component("mo")?,
            weeks: component("w")?,
            days: component("d")?,
            hours: component("h")?,
            minutes: component("mi")?,
            seconds: component("s")?,
        })
    }

    /// Returns the oldest instant still inside a window of this length ending at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDuration`] if the subtraction leaves the
    /// representable date range.
    pub fn cutoff_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let out_of_range = || Error::InvalidDuration {
            value: self.to_string(),
            reason: "window exceeds the representable date range".to_string(),
        };

        let total_months = self
            .years
            .checked_mul(12)
            .and_then(|m| m.checked_add(self.months))
            .ok_or_else(out_of_range)?;

        let calendar = now
            .checked_sub_months(Months::new(total_months))
            .ok_or_else(out_of_range)?;

        let fixed = [
            Duration::try_weeks(i64::from(self.weeks)),
            Duration::try_days(i64::from(self.days)),
            Duration::try_hours(i64::from(self.hours)),
            Duration::try_minutes(i64::from(self.minutes)),
            Duration::try_seconds(i64::from(self.seconds)),
        ]
        .into_iter()
        .try_fold(Duration::zero(), |total, part| part.and_then(|p| total.checked_add(&p)))
        .ok_or_else(out_of_range)?;

        calendar.checked_sub_signed(fixed).ok_or_else(out_of_range)
    }
}

impl FromStr for RuleDuration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RuleDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P")?;
        for (value, unit) in [
            (self.years, 'Y'),
            (self.months, 'M'),
            (self.weeks, 'W'),
            (self.days, 'D'),
        ] {
            if value > 0 {
                write!(f, "{value}{unit}")?;
            }
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            write!(f, "T")?;
            for (value, unit) in [(self.hours, 'H'), (self.minutes, 'M'), (self.seconds, 'S')] {
                if value > 0 {
                    write!(f, "{value}{unit}")?;
                }
            }
        }
        Ok(())
    }
}

/// Parses `duration` and subtracts it from `now`.
///
/// # Errors
///
/// Returns [`Error::InvalidDuration`] for malformed or out-of-range durations.
pub fn window_start(duration: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    RuleDuration::parse(duration)?.cutoff_from(now)
}
