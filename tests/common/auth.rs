use axum::http::Method;
use axum::Router;

use super::http::{request, response_json};

pub const TEST_PASSWORD: &str = "Passw0rd!";

/// A freshly registered user.
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub token: String,
}

pub async fn register_user(app: &Router) -> TestUser {
    let email = format!("user-{}@test.com", uuid::Uuid::new_v4());
    let username = format!("user-{}", uuid::Uuid::new_v4().simple());

    let response = request(
        app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": email,
            "username": username,
            "password": TEST_PASSWORD,
        })),
        &[],
    )
    .await;

    let (status, _headers, body) = response_json(response).await;
    assert!(status.is_success(), "register failed: {body}");

    TestUser {
        id: body["data"]["user"]["id"]
            .as_str()
            .expect("user id in register response")
            .to_string(),
        email,
        token: body["data"]["accessToken"]
            .as_str()
            .expect("access token in register response")
            .to_string(),
    }
}

pub fn auth_header(token: &str) -> String {
    format!("Bearer {token}")
}
