//! Timezone-aware bucketing of study events with a trailing moving average.
//!
//! Stages run strictly in order for a single query:
//! normalize the range, fetch events, bucket + reduce (ordered by period
//! start), then slide the window across the ordered buckets.

pub mod aggregate;
pub mod bucket;
pub mod moving_average;
pub mod normalize;
pub mod service;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE, MIN_WINDOW_SIZE};
use crate::store::StoreError;

pub use aggregate::{aggregate, BucketSummary};
pub use bucket::{bucket, Period};
pub use moving_average::{apply_moving_average, MovingAverage, SummaryRow};
pub use normalize::{normalize, parse_timezone, ClientTimestamp, NormalizedTimestamp};
pub use service::{record_event, summarize, EventSource, NewStudyEvent, SummaryQuery, UserSummary};

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),
    #[error("'fromDate' must be before 'toDate' (got {from} .. {to})")]
    InvalidDateRange { from: String, to: String },
    #[error("granularity must be one of hour, day, month (got {0})")]
    InvalidGranularity(String),
    #[error("windowSize must be between {min} and {max} (got {0})", min = MIN_WINDOW_SIZE, max = MAX_WINDOW_SIZE)]
    InvalidWindowSize(i64),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl SummaryError {
    /// Stable machine-readable code surfaced in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SummaryError::InvalidTimezone(_) => "INVALID_TIMEZONE",
            SummaryError::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            SummaryError::InvalidGranularity(_) => "INVALID_GRANULARITY",
            SummaryError::InvalidWindowSize(_) => "INVALID_WINDOW_SIZE",
            SummaryError::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            SummaryError::Storage(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    #[default]
    Day,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
        }
    }
}

impl FromStr for Granularity {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            "month" => Ok(Granularity::Month),
            _ => Err(SummaryError::InvalidGranularity(s.to_string())),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of trailing buckets averaged, always within 1..=365.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WindowSize(u32);

impl WindowSize {
    pub const DEFAULT: Self = Self(DEFAULT_WINDOW_SIZE);

    pub fn new(size: i64) -> Result<Self, SummaryError> {
        if size < i64::from(MIN_WINDOW_SIZE) || size > i64::from(MAX_WINDOW_SIZE) {
            return Err(SummaryError::InvalidWindowSize(size));
        }
        Ok(Self(size as u32))
    }

    pub fn get(&self) -> usize {
        self.0 as usize
    }
}
