use chrono::{
    DateTime, Datelike, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

use crate::summary::normalize::resolve_local;
use crate::summary::{Granularity, SummaryError};

/// Half-open interval `[start, end)`, both ends carrying the bucket zone's offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Period {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.with_timezone(&Utc) <= instant && instant < self.end.with_timezone(&Utc)
    }
}

/// First day of the month after `date`'s month, rolling December into January.
fn next_month_start(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Truncates a wall-clock value to the start of its enclosing grain.
fn truncate_local(local: NaiveDateTime, granularity: Granularity) -> NaiveDateTime {
    let midnight = local.date().and_time(NaiveTime::default());
    match granularity {
        Granularity::Hour => midnight + Duration::hours(i64::from(local.hour())),
        Granularity::Day => midnight,
        Granularity::Month => midnight - Duration::days(i64::from(local.day0())),
    }
}

/// Resolves a truncated boundary to an instant.
///
/// A repeated wall-clock hour (DST fall-back) forms two hour periods, so the
/// hour boundary is the later occurrence once the instant is past it. Day and
/// month boundaries always take the first occurrence.
fn resolve_boundary(
    tz: &Tz,
    boundary: NaiveDateTime,
    instant_utc: DateTime<Utc>,
    granularity: Granularity,
) -> DateTime<Tz> {
    match (tz.from_local_datetime(&boundary), granularity) {
        (LocalResult::Ambiguous(earliest, latest), Granularity::Hour) => {
            if latest.with_timezone(&Utc) <= instant_utc {
                latest
            } else {
                earliest
            }
        }
        _ => resolve_local(tz, boundary),
    }
}

/// The period of `granularity` in `tz` that contains `instant_utc`.
///
/// Truncation happens on the local wall clock, so day and month boundaries
/// follow the zone's own calendar across DST changes. Hour and day periods
/// are a fixed 1h / 24h long; a month period ends at local midnight on the
/// 1st of the following month.
pub fn bucket(
    instant_utc: DateTime<Utc>,
    tz: &Tz,
    granularity: Granularity,
) -> Result<Period, SummaryError> {
    let local = instant_utc.with_timezone(tz).naive_local();
    let start = resolve_boundary(tz, truncate_local(local, granularity), instant_utc, granularity);

    let end = match granularity {
        Granularity::Hour => start + Duration::hours(1),
        Granularity::Day => start + Duration::days(1),
        Granularity::Month => {
            let next = next_month_start(start.date_naive()).ok_or_else(|| {
                SummaryError::InvalidTimestamp(format!("{instant_utc} is out of range"))
            })?;
            resolve_local(tz, next.and_time(NaiveTime::default()))
        }
    };

    Ok(Period {
        start: start.fixed_offset(),
        end: end.fixed_offset(),
    })
}
