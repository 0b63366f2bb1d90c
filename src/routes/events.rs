use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::extractors::{JsonBody, QueryParams};
use crate::response::{created, ok, paginated, AppError};
use crate::state::AppState;
use crate::store::operations::events::{IngestOutcome, StudyEvent};
use crate::summary::{record_event, NewStudyEvent};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_events).post(create_event))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEventsQuery {
    page: Option<u64>,
    #[serde(alias = "per_page")]
    per_page: Option<u64>,
}

impl ListEventsQuery {
    fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }
    fn per_page(&self) -> u64 {
        self.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

async fn list_events(
    auth: AuthUser,
    QueryParams(q): QueryParams<ListEventsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let page = q.page();
    let per_page = q.per_page();
    let offset = page.saturating_sub(1).saturating_mul(per_page) as usize;

    let events = state
        .store()
        .get_user_events_page(&auth.user_id, per_page as usize, offset)?;
    let total = state.store().count_user_events(&auth.user_id)? as u64;
    Ok(paginated(events, total, page, per_page))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventResponse {
    event: StudyEvent,
    duplicate: bool,
}

/// 201 for a new event; 200 with `duplicate: true` and the stored event when
/// the (user, instant) pair was already recorded.
async fn create_event(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<NewStudyEvent>,
) -> Result<Response, AppError> {
    let outcome = record_event(
        state.store(),
        &auth.user_id,
        req,
        &state.config().summary.timezone_name,
        Utc::now(),
    )?;

    Ok(match outcome {
        IngestOutcome::Created(event) => created(CreateEventResponse {
            event,
            duplicate: false,
        })
        .into_response(),
        IngestOutcome::AlreadyExists { existing } => ok(CreateEventResponse {
            event: existing,
            duplicate: true,
        })
        .into_response(),
    })
}
