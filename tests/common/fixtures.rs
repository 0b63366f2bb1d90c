use chrono::{DateTime, Utc};

use study_summary::store::operations::events::StudyEvent;
use study_summary::store::Store;

/// Writes an event straight to the store, bypassing the HTTP layer.
pub fn seed_event(
    store: &Store,
    user_id: &str,
    word_count: u32,
    study_minutes: u32,
    timestamp_utc: DateTime<Utc>,
) -> StudyEvent {
    let event = StudyEvent::new(
        user_id,
        word_count,
        study_minutes,
        timestamp_utc,
        None,
        "UTC",
        Utc::now(),
    );
    let outcome = store.create_event(event).expect("create seed event");
    assert!(outcome.is_created(), "seed event collided with an existing one");
    outcome.event().clone()
}

pub fn utc(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .expect("valid rfc3339")
        .with_timezone(&Utc)
}
