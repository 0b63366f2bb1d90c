use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::{dummy_password_hash, hash_password, sign_jwt_for_user, verify_password, AuthUser};
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::users::User;
use crate::store::StoreError;
use crate::validation::{is_valid_email, validate_password, validate_username};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
}

impl From<&User> for UserProfile {
    fn from(value: &User) -> Self {
        Self {
            id: value.id.clone(),
            email: value.email.clone(),
            username: value.username.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserProfile,
}

fn issue_token(user: &User, state: &AppState) -> Result<AuthResponse, AppError> {
    let access_token = sign_jwt_for_user(
        &user.id,
        &state.config().jwt_secret,
        state.config().jwt_expires_in_hours,
    )?;
    Ok(AuthResponse {
        access_token,
        user: UserProfile::from(user),
    })
}

async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<Response, AppError> {
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request(
            "AUTH_INVALID_EMAIL",
            "Invalid email format",
        ));
    }
    let username = req.username.trim();
    if let Err(msg) = validate_username(username) {
        return Err(AppError::bad_request("AUTH_INVALID_USERNAME", msg));
    }
    if let Err(msg) = validate_password(&req.password) {
        return Err(AppError::bad_request("AUTH_WEAK_PASSWORD", msg));
    }

    let now = Utc::now();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        username: username.to_string(),
        password_hash: hash_password(&req.password)?,
        created_at: now,
        updated_at: now,
    };

    match state.store().create_user(&user) {
        Ok(()) => {}
        Err(StoreError::Conflict { .. }) => {
            return Err(AppError::conflict(
                "AUTH_EMAIL_EXISTS",
                "Email already registered",
            ));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = %user.id, "User registered");
    Ok(created(issue_token(&user, &state)?).into_response())
}

async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Response, AppError> {
    let email = req.email.trim().to_lowercase();
    let user = state.store().get_user_by_email(&email)?;

    let hash = user
        .as_ref()
        .map(|u| u.password_hash.as_str())
        .unwrap_or(dummy_password_hash());
    let password_ok = verify_password(&req.password, hash)?;

    let Some(user) = user.filter(|_| password_ok) else {
        tracing::info!("Login rejected");
        return Err(AppError::unauthorized("Invalid email or password"));
    };

    Ok(ok(issue_token(&user, &state)?).into_response())
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Response, AppError> {
    let user = state
        .store()
        .get_user_by_id(&auth.user_id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ok(UserProfile::from(&user)).into_response())
}
