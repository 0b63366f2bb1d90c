use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::operations::events::{IngestOutcome, StudyEvent};
use crate::store::{Store, StoreError};
use crate::summary::{
    aggregate, apply_moving_average, normalize, parse_timezone, ClientTimestamp, Granularity,
    SummaryError, SummaryRow, WindowSize,
};

/// Read side of the event log as the summary pipeline sees it.
pub trait EventSource {
    /// Events of `user_id` with `from <= timestamp_utc <= to`.
    fn fetch_events_in_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StudyEvent>, StoreError>;
}

impl EventSource for Store {
    fn fetch_events_in_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StudyEvent>, StoreError> {
        self.get_user_events_in_range(user_id, from, to)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudyEvent {
    #[serde(alias = "word_count")]
    pub word_count: u32,
    #[serde(alias = "study_minutes", alias = "study_time", alias = "studyTime")]
    pub study_minutes: u32,
    /// ISO-8601, with or without offset; parsed in [`record_event`] so a bad
    /// value surfaces as `InvalidTimestamp`.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, alias = "timezone_name", alias = "timezone")]
    pub timezone_name: Option<String>,
}

/// Normalizes and stores one event. Resubmitting the same (user, instant)
/// returns the stored event instead of writing a second one.
pub fn record_event(
    store: &Store,
    user_id: &str,
    input: NewStudyEvent,
    default_timezone: &str,
    now: DateTime<Utc>,
) -> Result<IngestOutcome, SummaryError> {
    let timezone_name = input
        .timezone_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(default_timezone);
    parse_timezone(timezone_name)?;

    let timestamp = input
        .timestamp
        .as_deref()
        .map(str::parse::<ClientTimestamp>)
        .transpose()?;
    let normalized = normalize(timestamp.as_ref(), timezone_name, now)?;
    let event = StudyEvent::new(
        user_id,
        input.word_count,
        input.study_minutes,
        normalized.timestamp_utc,
        Some(normalized.client_timestamp),
        &normalized.timezone_name,
        now,
    );

    let outcome = store.create_event(event.clone())?;
    match &outcome {
        IngestOutcome::Created(created) => {
            tracing::info!(
                user_id = %user_id,
                event_id = %created.id,
                timestamp_utc = %created.timestamp_utc,
                "Study event recorded"
            );
        }
        IngestOutcome::AlreadyExists { existing } if !existing.same_measurements(&event) => {
            tracing::warn!(
                user_id = %user_id,
                event_id = %existing.id,
                timestamp_utc = %existing.timestamp_utc,
                stored_word_count = existing.word_count,
                submitted_word_count = event.word_count,
                stored_study_minutes = existing.study_minutes,
                submitted_study_minutes = event.study_minutes,
                "Conflicting resubmission ignored; stored event kept"
            );
        }
        IngestOutcome::AlreadyExists { existing } => {
            tracing::debug!(user_id = %user_id, event_id = %existing.id, "Duplicate study event");
        }
    }

    Ok(outcome)
}

#[derive(Debug, Clone)]
pub struct SummaryQuery {
    pub from: ClientTimestamp,
    pub to: ClientTimestamp,
    pub granularity: Granularity,
    pub timezone_name: String,
    pub window_size: WindowSize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: String,
    pub granularity: Granularity,
    pub timezone_name: String,
    pub window_size: WindowSize,
    pub total_periods: usize,
    pub periods: Vec<SummaryRow>,
}

/// Builds the bucketed summary for `user_id` over `[from, to]`.
///
/// Naive range bounds are read in the query's zone. The zone and the range are
/// both checked before the event source is touched.
pub fn summarize<S>(source: &S, user_id: &str, query: &SummaryQuery) -> Result<UserSummary, SummaryError>
where
    S: EventSource + ?Sized,
{
    let tz = parse_timezone(&query.timezone_name)?;
    let from_utc = query.from.resolve(&tz).with_timezone(&Utc);
    let to_utc = query.to.resolve(&tz).with_timezone(&Utc);

    if from_utc >= to_utc {
        return Err(SummaryError::InvalidDateRange {
            from: from_utc.to_rfc3339(),
            to: to_utc.to_rfc3339(),
        });
    }

    let events = source.fetch_events_in_range(user_id, from_utc, to_utc)?;
    let buckets = aggregate(&events, from_utc, to_utc, &tz, query.granularity)?;
    let periods = apply_moving_average(buckets, query.window_size);

    tracing::debug!(
        user_id = %user_id,
        granularity = %query.granularity,
        timezone = %query.timezone_name,
        events = events.len(),
        periods = periods.len(),
        "Summary computed"
    );

    Ok(UserSummary {
        user_id: user_id.to_string(),
        granularity: query.granularity,
        timezone_name: query.timezone_name.clone(),
        window_size: query.window_size,
        total_periods: periods.len(),
        periods,
    })
}
