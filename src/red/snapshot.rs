//! Point-in-time copies of a RED triad, their arithmetic and wire formats.
//!
//! Two encodings are produced:
//!
//! - **Text**: `"<requests>, <errors>, <seconds>s"` with six decimals, e.g.
//!   `"3, 1, 1.500000s"`. For humans only; it is never parsed back.
//! - **Wire line**: the same without the unit, e.g. `"3, 1, 1.500000"`. This
//!   is what monitored processes serve and what [`FromStr`] reads.
//! - **JSON**: `{"requests":3,"errors":1,"duration":1500000000}`. The
//!   duration is always integer nanoseconds.

use std::fmt;
use std::ops::Sub;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::error::ParseError;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// An owned copy of aggregator state, or the difference between two copies.
///
/// Deltas may hold negative counters and a negative duration, so the
/// duration is kept as signed nanoseconds.
///
/// Equality ignores `start_time`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Snapshot {
    pub requests: i64,
    pub errors: i64,
    #[serde(rename = "duration")]
    pub duration_nanos: i64,
    /// Not part of either wire format
    #[serde(skip, default = "Instant::now")]
    pub start_time: Instant,
}

impl Snapshot {
    /// A zeroed snapshot starting now.
    pub fn zero() -> Self {
        Snapshot {
            requests: 0,
            errors: 0,
            duration_nanos: 0,
            start_time: Instant::now(),
        }
    }

    pub fn new(requests: i64, errors: i64, duration: Duration) -> Self {
        Snapshot {
            requests,
            errors,
            duration_nanos: duration_to_nanos(duration),
            start_time: Instant::now(),
        }
    }

    /// Duration as a std `Duration`. Negative deltas read as zero.
    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.duration_nanos.max(0) as u64)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_nanos as f64 / NANOS_PER_SEC
    }

    /// Replace the duration, typically to tag a delta with its sampling
    /// interval.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_nanos = duration_to_nanos(duration);
        self
    }

    /// `self - earlier`, element by element. Keeps `self`'s start time.
    ///
    /// Wraps on overflow, the same as the aggregator's counters, so a delta
    /// across a wrapped counter still comes out right.
    pub fn subtract(&self, earlier: &Snapshot) -> Snapshot {
        Snapshot {
            requests: self.requests.wrapping_sub(earlier.requests),
            errors: self.errors.wrapping_sub(earlier.errors),
            duration_nanos: self.duration_nanos.wrapping_sub(earlier.duration_nanos),
            start_time: self.start_time,
        }
    }

    /// True when requests, errors and duration are all zero.
    pub fn is_zero(&self) -> bool {
        self.requests == 0 && self.errors == 0 && self.duration_nanos == 0
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// The unsuffixed line read back by [`FromStr`].
    pub fn wire_line(&self) -> String {
        format!("{}, {}, {:.6}", self.requests, self.errors, self.duration_secs())
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.requests == other.requests
            && self.errors == other.errors
            && self.duration_nanos == other.duration_nanos
    }
}

impl Eq for Snapshot {}

impl Sub for Snapshot {
    type Output = Snapshot;

    fn sub(self, earlier: Snapshot) -> Snapshot {
        self.subtract(&earlier)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {:.6}s", self.requests, self.errors, self.duration_secs())
    }
}

impl FromStr for Snapshot {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(ParseError::FieldCount {
                actual: fields.len(),
                line: line.to_string(),
            });
        }

        let requests = parse_counter("requests", fields[0])?;
        let errors = parse_counter("errors", fields[1])?;

        let duration_nanos = parse_seconds(fields[2]).ok_or_else(|| ParseError::InvalidNumber {
            field: "duration",
            token: fields[2].to_string(),
        })?;

        Ok(Snapshot {
            requests,
            errors,
            duration_nanos,
            start_time: Instant::now(),
        })
    }
}

fn parse_counter(field: &'static str, token: &str) -> Result<i64, ParseError> {
    token.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        token: token.to_string(),
    })
}

/// Float seconds to whole nanoseconds, `None` unless the result fits an i64.
fn parse_seconds(token: &str) -> Option<i64> {
    let seconds: f64 = token.parse().ok()?;
    let nanos = (seconds * NANOS_PER_SEC).round();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if nanos.is_finite() && nanos >= i64::MIN as f64 && nanos < i64::MAX as f64 {
        Some(nanos as i64)
    } else {
        None
    }
}

pub(crate) fn duration_to_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}
