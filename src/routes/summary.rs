use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::extractors::QueryParams;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::summary::{
    parse_timezone, summarize, ClientTimestamp, Granularity, SummaryError, SummaryQuery,
    WindowSize,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/:user_id/summary", get(get_user_summary))
}

/// Raw query string; every field is parsed by hand so each failure maps to
/// its own error code instead of a generic query rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryParams {
    #[serde(alias = "from_date", alias = "from")]
    from_date: Option<String>,
    #[serde(alias = "to_date", alias = "to")]
    to_date: Option<String>,
    granularity: Option<String>,
    #[serde(alias = "timezone_name", alias = "timezone")]
    timezone_name: Option<String>,
    #[serde(alias = "window_size")]
    window_size: Option<String>,
}

fn parse_bound(raw: Option<&str>, name: &str) -> Result<ClientTimestamp, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::bad_request("INVALID_DATE_RANGE", &format!("'{name}' is required"))
        })?;
    Ok(raw.parse::<ClientTimestamp>()?)
}

fn build_query(params: &SummaryParams, state: &AppState) -> Result<SummaryQuery, AppError> {
    let defaults = &state.config().summary;

    let timezone_name = params
        .timezone_name
        .clone()
        .unwrap_or_else(|| defaults.timezone_name.clone());
    parse_timezone(&timezone_name)?;

    let from = parse_bound(params.from_date.as_deref(), "fromDate")?;
    let to = parse_bound(params.to_date.as_deref(), "toDate")?;

    let granularity = match params.granularity.as_deref() {
        Some(raw) => raw.parse::<Granularity>()?,
        None => Granularity::default(),
    };

    let window_size = match params.window_size.as_deref() {
        Some(raw) => {
            let size = raw.trim().parse::<i64>().map_err(|_| {
                AppError::bad_request(
                    "INVALID_WINDOW_SIZE",
                    &format!("windowSize must be an integer (got {raw})"),
                )
            })?;
            WindowSize::new(size)?
        }
        None => defaults.window_size,
    };

    Ok(SummaryQuery {
        from,
        to,
        granularity,
        timezone_name,
        window_size,
    })
}

async fn get_user_summary(
    auth: AuthUser,
    Path(user_id): Path<String>,
    QueryParams(params): QueryParams<SummaryParams>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    if user_id != auth.user_id {
        return Err(AppError::forbidden("Cannot read another user's summary"));
    }

    let query = build_query(&params, &state)?;
    let summary = summarize(state.store(), &user_id, &query).map_err(|e| {
        if let SummaryError::Storage(ref source) = e {
            tracing::error!(user_id = %user_id, error = %source, "Summary query failed");
        }
        AppError::from(e)
    })?;

    Ok(ok(summary))
}
