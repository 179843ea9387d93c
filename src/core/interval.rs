//! ISO-8601 duration parsing for job intervals.
//!
//! An [`Interval`] is the minimum time between two successive starts of a
//! job. It is written as an ISO-8601 duration such as `PT5M`, `PT0.5S` or
//! `P1DT12H`. Calendar units are converted with fixed lengths: a year is 365
//! days, a month 30 days and a week 7 days.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const NANOS_PER_SECOND: u128 = 1_000_000_000;
const SECONDS_PER_MINUTE: u128 = 60;
const SECONDS_PER_HOUR: u128 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u128 = 24 * SECONDS_PER_HOUR;
const SECONDS_PER_WEEK: u128 = 7 * SECONDS_PER_DAY;
const SECONDS_PER_MONTH: u128 = 30 * SECONDS_PER_DAY;
const SECONDS_PER_YEAR: u128 = 365 * SECONDS_PER_DAY;

/// Longest run of digits accepted for either part of a component value.
const MAX_DIGITS: usize = 20;

/// Errors that can occur when parsing an interval.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    /// The string is not a valid ISO-8601 duration.
    #[error("\"{0}\" is not a valid ISO duration")]
    InvalidDuration(String),

    /// The duration is valid but too large to represent.
    #[error("\"{0}\" is too large to be used as an interval")]
    OutOfRange(String),
}

/// A validated minimum time between job starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    /// The original expression string.
    expression: String,
    /// The parsed duration.
    duration: Duration,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Date,
    Time,
}

impl Interval {
    /// Parse an ISO-8601 duration expression.
    pub fn parse(expression: impl Into<String>) -> Result<Self, IntervalError> {
        let expression = expression.into();
        let duration = parse_iso_duration(&expression)?;
        Ok(Self {
            expression,
            duration,
        })
    }

    /// Build an interval from a duration, rendering it as `PT<seconds>S`.
    pub fn from_duration(duration: Duration) -> Self {
        let expression = if duration.subsec_nanos() == 0 {
            format!("PT{}S", duration.as_secs())
        } else {
            let fraction = format!("{:09}", duration.subsec_nanos());
            format!("PT{}.{}S", duration.as_secs(), fraction.trim_end_matches('0'))
        };
        Self {
            expression,
            duration,
        }
    }

    /// Get the original expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Get the interval as a standard duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The earliest time a job last started at `last_started` may start again.
    ///
    /// Returns `None` when the result falls outside the representable range,
    /// in which case the job is never due again.
    pub fn next_start_after(&self, last_started: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let delta = TimeDelta::from_std(self.duration).ok()?;
        last_started.checked_add_signed(delta)
    }

    /// Check whether enough time has passed since `last_started`.
    pub fn has_elapsed(&self, last_started: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.next_start_after(last_started)
            .is_some_and(|next| next <= now)
    }
}

impl FromStr for Interval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Interval {
    type Error = IntervalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Interval> for String {
    fn from(interval: Interval) -> Self {
        interval.expression
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Parse `P[nY][nM][nW][nD][T[nH][nM][nS]]` into a duration.
fn parse_iso_duration(s: &str) -> Result<Duration, IntervalError> {
    let invalid = || IntervalError::InvalidDuration(s.to_string());

    let body = s.strip_prefix('P').ok_or_else(invalid)?;
    if body.is_empty() {
        return Err(invalid());
    }

    let mut section = Section::Date;
    // Index into the allowed unit order of the current section; units must
    // appear in order and at most once.
    let mut next_unit = 0;
    let mut components = 0;
    let mut time_components = 0;
    let mut total_nanos: u128 = 0;
    let mut number = String::new();

    for c in body.chars() {
        match c {
            '0'..='9' | '.' | ',' => number.push(c),
            'T' => {
                if section == Section::Time || !number.is_empty() {
                    return Err(invalid());
                }
                section = Section::Time;
                next_unit = 0;
            }
            unit => {
                let units: &[(char, u128)] = match section {
                    Section::Date => &[
                        ('Y', SECONDS_PER_YEAR),
                        ('M', SECONDS_PER_MONTH),
                        ('W', SECONDS_PER_WEEK),
                        ('D', SECONDS_PER_DAY),
                    ],
                    Section::Time => &[
                        ('H', SECONDS_PER_HOUR),
                        ('M', SECONDS_PER_MINUTE),
                        ('S', 1),
                    ],
                };
                let position = units[next_unit..]
                    .iter()
                    .position(|(u, _)| *u == unit)
                    .ok_or_else(invalid)?;
                let (_, unit_seconds) = units[next_unit + position];
                next_unit += position + 1;

                let nanos = component_nanos(&number, unit_seconds).ok_or_else(invalid)?;
                total_nanos = total_nanos
                    .checked_add(nanos)
                    .ok_or_else(|| IntervalError::OutOfRange(s.to_string()))?;
                number.clear();
                components += 1;
                if section == Section::Time {
                    time_components += 1;
                }
            }
        }
    }

    // Trailing digits without a unit, or a bare "T".
    if !number.is_empty() || components == 0 || (section == Section::Time && time_components == 0)
    {
        return Err(invalid());
    }

    let secs = u64::try_from(total_nanos / NANOS_PER_SECOND)
        .map_err(|_| IntervalError::OutOfRange(s.to_string()))?;
    let nanos = (total_nanos % NANOS_PER_SECOND) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Convert one numeric component (e.g. `"1.5"` of `1.5H`) to nanoseconds.
fn component_nanos(number: &str, unit_seconds: u128) -> Option<u128> {
    let (whole, fraction) = match number.find(['.', ',']) {
        Some(idx) => (&number[..idx], Some(&number[idx + 1..])),
        None => (number, None),
    };

    if whole.is_empty() || whole.len() > MAX_DIGITS || !whole.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let unit_nanos = unit_seconds * NANOS_PER_SECOND;
    let mut nanos = whole.parse::<u128>().ok()?.checked_mul(unit_nanos)?;

    if let Some(fraction) = fraction {
        if fraction.is_empty()
            || fraction.len() > MAX_DIGITS
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let numerator = fraction.parse::<u128>().ok()?;
        let denominator = 10u128.checked_pow(fraction.len() as u32)?;
        nanos = nanos.checked_add(numerator.checked_mul(unit_nanos)? / denominator)?;
    }

    Some(nanos)
}
