use std::str::FromStr;

use chrono::{
    DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    SubsecRound, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::summary::SummaryError;

/// Canonical instants are kept at microsecond precision; it is also the
/// resolution of the storage key.
const CANONICAL_SUBSEC_DIGITS: u16 = 6;

/// How far back to look for the offset in effect before a DST gap.
const GAP_LOOKBACK_HOURS: i64 = 6;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A caller-supplied ISO-8601 timestamp, with or without a UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ClientTimestamp {
    /// Wall-clock time; its zone comes from the accompanying timezone name.
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl ClientTimestamp {
    /// The absolute instant this timestamp denotes when naive values are read in `tz`.
    pub fn resolve(&self, tz: &Tz) -> DateTime<FixedOffset> {
        match self {
            ClientTimestamp::Naive(local) => resolve_local(tz, *local).fixed_offset(),
            ClientTimestamp::Zoned(instant) => *instant,
        }
    }
}

impl FromStr for ClientTimestamp {
    type Err = SummaryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
            return Ok(ClientTimestamp::Zoned(instant));
        }
        for format in NAIVE_FORMATS {
            if let Ok(local) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(ClientTimestamp::Naive(local));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(ClientTimestamp::Naive(date.and_time(NaiveTime::default())));
        }
        Err(SummaryError::InvalidTimestamp(raw.to_string()))
    }
}

impl TryFrom<String> for ClientTimestamp {
    type Error = SummaryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTimestamp {
    pub timestamp_utc: DateTime<Utc>,
    pub client_timestamp: DateTime<FixedOffset>,
    pub timezone_name: String,
}

pub fn parse_timezone(name: &str) -> Result<Tz, SummaryError> {
    name.parse::<Tz>()
        .map_err(|_| SummaryError::InvalidTimezone(name.to_string()))
}

/// Maps a local wall-clock time in `tz` to an absolute instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times skipped by
/// a DST jump are read with the offset in effect just before the jump, which
/// lands them the same distance past the transition.
pub(crate) fn resolve_local(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(instant) => instant,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let before = local - Duration::hours(GAP_LOOKBACK_HOURS);
            let offset = tz
                .offset_from_local_datetime(&before)
                .earliest()
                .map(|o| o.fix())
                .unwrap_or_else(|| Utc.fix());
            let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
            tz.from_utc_datetime(&utc)
        }
    }
}

/// Converts an ingestion timestamp into its canonical UTC instant.
///
/// The zone name is validated before anything else. A missing timestamp
/// means "now". The original instant (with the caller's offset) and the zone
/// name are kept as supplied.
pub fn normalize(
    timestamp: Option<&ClientTimestamp>,
    timezone_name: &str,
    now: DateTime<Utc>,
) -> Result<NormalizedTimestamp, SummaryError> {
    let tz = parse_timezone(timezone_name)?;

    let client_timestamp = match timestamp {
        Some(ts) => ts.resolve(&tz),
        None => now.fixed_offset(),
    };
    let timestamp_utc = client_timestamp
        .with_timezone(&Utc)
        .trunc_subsecs(CANONICAL_SUBSEC_DIGITS);

    Ok(NormalizedTimestamp {
        timestamp_utc,
        client_timestamp,
        timezone_name: timezone_name.to_string(),
    })
}
