//! Fixed-width sortable timestamps.
//!
//! A [`Time`] serializes as 20 digits (`YYYYMMDDHHMMSSffffff`), so the
//! lexicographic order of the text equals the chronological order. The
//! `MIN`/`MAX` sentinels print as `"min"`/`"max"`; `"now"` is accepted on
//! input and resolves to the current local instant.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TshragError};

/// Width of the serialized digit form.
pub const TIME_WIDTH: usize = 20;

const FORMAT: &str = "%Y%m%d%H%M%S%6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Time(NaiveDateTime);

impl Time {
    pub const MIN_LITERAL: &'static str = "min";
    pub const MAX_LITERAL: &'static str = "max";
    pub const NOW_LITERAL: &'static str = "now";

    /// `0001-01-01 00:00:00.000000`
    pub fn min() -> Self {
        Self(
            NaiveDate::from_ymd_opt(1, 1, 1)
                .and_then(|d| d.and_hms_micro_opt(0, 0, 0, 0))
                .unwrap_or(NaiveDateTime::MIN),
        )
    }

    /// `9999-12-31 23:59:59.999999`
    pub fn max() -> Self {
        Self(
            NaiveDate::from_ymd_opt(9999, 12, 31)
                .and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999))
                .unwrap_or(NaiveDateTime::MAX),
        )
    }

    /// Current local time, truncated to microseconds.
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    pub fn from_naive(dt: NaiveDateTime) -> Self {
        let micros = dt.nanosecond() / 1_000 * 1_000;
        Self(dt.with_nanosecond(micros).unwrap_or(dt)).clamp(Self::min(), Self::max())
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }

    pub fn is_min(&self) -> bool {
        *self == Self::min()
    }

    pub fn is_max(&self) -> bool {
        *self == Self::max()
    }

    /// Parse the textual form. Shorter digit strings are right-padded with
    /// zeros, so `"20240101"` is midnight of that day.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case(Self::MIN_LITERAL) {
            return Ok(Self::min());
        }
        if trimmed.eq_ignore_ascii_case(Self::MAX_LITERAL) {
            return Ok(Self::max());
        }
        if trimmed.eq_ignore_ascii_case(Self::NOW_LITERAL) {
            return Ok(Self::now());
        }
        if trimmed.is_empty()
            || trimmed.len() > TIME_WIDTH
            || !trimmed.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(TshragError::InvalidTime(raw.to_string()));
        }

        let padded = format!("{trimmed:0<TIME_WIDTH$}");
        let field = |from: usize, to: usize| -> Result<u32> {
            padded[from..to]
                .parse::<u32>()
                .map_err(|_| TshragError::InvalidTime(raw.to_string()))
        };
        let year = field(0, 4)? as i32;
        // A bare year pads to month/day zero; treat those as the first.
        let month = field(4, 6)?.max(1);
        let day = field(6, 8)?.max(1);

        let (hour, minute, second, micro) =
            (field(8, 10)?, field(10, 12)?, field(12, 14)?, field(14, 20)?);

        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_micro_opt(hour, minute, second, micro))
            .map(Self)
            .filter(|t| *t >= Self::min())
            .ok_or_else(|| TshragError::InvalidTime(raw.to_string()))
    }

    /// The 20-digit form regardless of sentinels.
    pub fn digits(&self) -> String {
        self.0.format(FORMAT).to_string()
    }

    /// Leading `accuracy` digits of the timestamp, used as a bucket key.
    pub fn truncated(&self, accuracy: usize) -> String {
        let mut digits = self.digits();
        digits.truncate(accuracy.clamp(1, TIME_WIDTH));
        digits
    }

    pub fn saturating_add_secs(&self, secs: u64) -> Self {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        Duration::try_seconds(secs)
            .and_then(|d| self.0.checked_add_signed(d))
            .map(|dt| Self(dt).min(Self::max()))
            .unwrap_or_else(Self::max)
    }

    pub fn saturating_sub_secs(&self, secs: u64) -> Self {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        Duration::try_seconds(secs)
            .and_then(|d| self.0.checked_sub_signed(d))
            .map(|dt| Self(dt).max(Self::min()))
            .unwrap_or_else(Self::min)
    }

    /// Whole seconds from `self` to `later`, zero when `later` is earlier.
    pub fn secs_until(&self, later: &Time) -> u64 {
        u64::try_from((later.0 - self.0).num_seconds()).unwrap_or(0)
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::min()
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_min() {
            f.write_str(Self::MIN_LITERAL)
        } else if self.is_max() {
            f.write_str(Self::MAX_LITERAL)
        } else {
            write!(f, "{}", self.0.format(FORMAT))
        }
    }
}

impl FromStr for Time {
    type Err = TshragError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Time {
    type Error = TshragError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<Time> for String {
    fn from(t: Time) -> Self {
        t.to_string()
    }
}

impl From<NaiveDateTime> for Time {
    fn from(dt: NaiveDateTime) -> Self {
        Self::from_naive(dt)
    }
}

// ── Window ────────────────────────────────────────────────────

/// Closed time interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: Time,
    pub end: Time,
}

impl Window {
    /// Missing bounds default to `MIN`/`MAX`.
    pub fn new(start: Option<Time>, end: Option<Time>) -> Self {
        Self {
            start: start.unwrap_or_else(Time::min),
            end: end.unwrap_or_else(Time::max),
        }
    }

    pub fn all() -> Self {
        Self::new(None, None)
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, t: &Time) -> bool {
        self.start <= *t && *t <= self.end
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::all()
    }
}
