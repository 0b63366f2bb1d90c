use std::collections::VecDeque;

use chrono::{DateTime, FixedOffset};
use serde::{Serialize, Serializer};

use crate::summary::aggregate::BucketSummary;
use crate::summary::WindowSize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    #[serde(serialize_with = "serialize_with_offset")]
    pub period_start: DateTime<FixedOffset>,
    #[serde(serialize_with = "serialize_with_offset")]
    pub period_end: DateTime<FixedOffset>,
    pub event_count: u64,
    pub total_word_count: u64,
    pub total_study_minutes: u64,
    pub average_word_count: f64,
    pub average_study_minutes: f64,
    pub moving_average_word_count: Option<f64>,
    pub moving_average_study_minutes: Option<f64>,
}

/// Period bounds always carry a numeric offset, `+00:00` included, so
/// clients see the zone's offset the same way for every zone.
fn serialize_with_offset<S>(value: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339())
}

/// Trailing simple moving average over the last `W` bucket totals.
///
/// Keeps running sums so each push is O(1); the oldest totals are evicted
/// once more than `W` have been seen.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    totals: VecDeque<(u64, u64)>,
    word_sum: u64,
    minute_sum: u64,
}

impl MovingAverage {
    pub fn new(window: WindowSize) -> Self {
        Self {
            window: window.get(),
            totals: VecDeque::with_capacity(window.get() + 1),
            word_sum: 0,
            minute_sum: 0,
        }
    }

    /// Adds one bucket's totals and returns `(words, minutes)` averages, or
    /// `None` while fewer than `W` buckets have been pushed.
    pub fn push(&mut self, words: u64, minutes: u64) -> Option<(f64, f64)> {
        self.totals.push_back((words, minutes));
        self.word_sum += words;
        self.minute_sum += minutes;

        if self.totals.len() > self.window {
            if let Some((old_words, old_minutes)) = self.totals.pop_front() {
                self.word_sum -= old_words;
                self.minute_sum -= old_minutes;
            }
        }

        if self.totals.len() < self.window {
            return None;
        }

        let w = self.window as f64;
        Some((self.word_sum as f64 / w, self.minute_sum as f64 / w))
    }
}

/// Attaches trailing averages to buckets already ordered by period start.
pub fn apply_moving_average(buckets: Vec<BucketSummary>, window: WindowSize) -> Vec<SummaryRow> {
    let mut sma = MovingAverage::new(window);

    buckets
        .into_iter()
        .map(|b| {
            let averages = sma.push(b.total_word_count, b.total_study_minutes);
            SummaryRow {
                period_start: b.period.start,
                period_end: b.period.end,
                event_count: b.event_count,
                total_word_count: b.total_word_count,
                total_study_minutes: b.total_study_minutes,
                average_word_count: b.average_word_count,
                average_study_minutes: b.average_study_minutes,
                moving_average_word_count: averages.map(|(words, _)| words),
                moving_average_study_minutes: averages.map(|(_, minutes)| minutes),
            }
        })
        .collect()
}
