use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::store::operations::events::StudyEvent;
use crate::summary::bucket::{bucket, Period};
use crate::summary::{Granularity, SummaryError};

/// Reduced statistics for one non-empty period.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSummary {
    pub period: Period,
    pub event_count: u64,
    pub total_word_count: u64,
    pub total_study_minutes: u64,
    pub average_word_count: f64,
    pub average_study_minutes: f64,
}

#[derive(Debug)]
struct Accumulator {
    period: Period,
    count: u64,
    words: u64,
    minutes: u64,
}

/// Groups events in `[from_utc, to_utc]` into periods and reduces each group.
///
/// Output is ascending by period start with no entries for empty periods.
pub fn aggregate<'a, I>(
    events: I,
    from_utc: DateTime<Utc>,
    to_utc: DateTime<Utc>,
    tz: &Tz,
    granularity: Granularity,
) -> Result<Vec<BucketSummary>, SummaryError>
where
    I: IntoIterator<Item = &'a StudyEvent>,
{
    let mut groups: BTreeMap<DateTime<Utc>, Accumulator> = BTreeMap::new();

    for event in events {
        let ts = event.timestamp_utc;
        if ts < from_utc || ts > to_utc {
            continue;
        }

        let period = bucket(ts, tz, granularity)?;
        let acc = groups
            .entry(period.start.with_timezone(&Utc))
            .or_insert(Accumulator {
                period,
                count: 0,
                words: 0,
                minutes: 0,
            });
        acc.count += 1;
        acc.words += u64::from(event.word_count);
        acc.minutes += u64::from(event.study_minutes);
    }

    Ok(groups
        .into_values()
        .map(|acc| BucketSummary {
            period: acc.period,
            event_count: acc.count,
            total_word_count: acc.words,
            total_study_minutes: acc.minutes,
            average_word_count: acc.words as f64 / acc.count as f64,
            average_study_minutes: acc.minutes as f64 / acc.count as f64,
        })
        .collect())
}
