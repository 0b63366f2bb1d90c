use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// One recorded study session. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyEvent {
    pub id: String,
    pub user_id: String,
    pub word_count: u32,
    pub study_minutes: u32,
    pub timestamp_utc: DateTime<Utc>,
    /// The instant as the client sent it, offset included. Informational only.
    pub client_timestamp: Option<DateTime<FixedOffset>>,
    pub timezone_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudyEvent {
    pub fn new(
        user_id: &str,
        word_count: u32,
        study_minutes: u32,
        timestamp_utc: DateTime<Utc>,
        client_timestamp: Option<DateTime<FixedOffset>>,
        timezone_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            word_count,
            study_minutes,
            timestamp_utc,
            client_timestamp,
            timezone_name: timezone_name.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `other` records the same counts, ignoring identity and audit fields.
    pub fn same_measurements(&self, other: &StudyEvent) -> bool {
        self.word_count == other.word_count && self.study_minutes == other.study_minutes
    }
}

/// Result of an idempotent insert keyed by (user, timestamp_utc).
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Created(StudyEvent),
    /// The key was already taken; the stored event is returned untouched.
    AlreadyExists { existing: StudyEvent },
}

impl IngestOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, IngestOutcome::Created(_))
    }

    pub fn event(&self) -> &StudyEvent {
        match self {
            IngestOutcome::Created(event) => event,
            IngestOutcome::AlreadyExists { existing } => existing,
        }
    }
}

fn ceil_micros(instant: DateTime<Utc>) -> i64 {
    let micros = instant.timestamp_micros();
    if instant.timestamp_subsec_nanos() % 1_000 == 0 {
        micros
    } else {
        micros + 1
    }
}

impl Store {
    /// Inserts `event` unless its (user, timestamp_utc) key is taken.
    ///
    /// Uniqueness is enforced by sled's atomic compare-and-swap, so of two
    /// racing submissions with the same key exactly one is `Created`.
    pub fn create_event(&self, event: StudyEvent) -> Result<IngestOutcome, StoreError> {
        let key = keys::event_key(&event.user_id, event.timestamp_utc.timestamp_micros())?;
        let bytes = Self::serialize(&event)?;

        let cas_result = self
            .study_events
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(bytes))
            .map_err(StoreError::Sled)?;

        match cas_result {
            Ok(()) => Ok(IngestOutcome::Created(event)),
            Err(cas_error) => match cas_error.current {
                Some(current) => Ok(IngestOutcome::AlreadyExists {
                    existing: Self::deserialize(&current)?,
                }),
                None => Err(StoreError::Conflict {
                    entity: "study_event".to_string(),
                    key,
                }),
            },
        }
    }

    /// Events of `user_id` with `from <= timestamp_utc <= to`, ascending by timestamp.
    pub fn get_user_events_in_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StudyEvent>, StoreError> {
        let from_micros = ceil_micros(from);
        let to_micros = to.timestamp_micros();
        if from_micros > to_micros {
            return Ok(Vec::new());
        }

        let start = keys::event_key(user_id, from_micros)?;
        let end = keys::event_key(user_id, to_micros)?;

        let mut events = Vec::new();
        for item in self.study_events.range(start.as_bytes()..=end.as_bytes()) {
            let (_, value) = item?;
            events.push(Self::deserialize::<StudyEvent>(&value)?);
        }
        Ok(events)
    }

    /// Newest-first page of a user's events.
    pub fn get_user_events_page(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StudyEvent>, StoreError> {
        let prefix = keys::event_prefix(user_id)?;
        let mut events = Vec::new();
        for item in self.study_events.scan_prefix(prefix.as_bytes()).rev().skip(offset) {
            let (_, value) = item?;
            events.push(Self::deserialize::<StudyEvent>(&value)?);
            if events.len() >= limit {
                break;
            }
        }
        Ok(events)
    }

    pub fn count_user_events(&self, user_id: &str) -> Result<usize, StoreError> {
        let prefix = keys::event_prefix(user_id)?;
        let mut count = 0usize;
        for item in self.study_events.scan_prefix(prefix.as_bytes()) {
            let _ = item?;
            count += 1;
        }
        Ok(count)
    }
}
