mod common;

use axum::http::{Method, StatusCode};

use common::app::{spawn_test_server_with_limits, uniform_limits};
use common::auth::register_user;
use common::http::{assert_json_error, call, request, response_json};
use study_summary::config::RateLimitConfig;

const SUMMARY: &str = "fromDate=2024-01-01&toDate=2024-01-02";

#[tokio::test]
async fn it_summary_budget_is_separate_from_ingestion() {
    let app = spawn_test_server_with_limits(RateLimitConfig {
        summary_max: 2,
        ..uniform_limits(10)
    })
    .await;
    let user = register_user(&app.app).await;
    let path = format!("/api/users/{}/summary?{SUMMARY}", user.id);

    for _ in 0..2 {
        let (status, headers, _) = call(&app.app, Method::GET, &path, None, &user.token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["ratelimit-limit"], "2");
        assert_eq!(headers["ratelimit-policy"], "2;w=60");
    }

    let (status, headers, body) = call(&app.app, Method::GET, &path, None, &user.token).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_json_error(&body, "RATE_LIMITED");
    assert_eq!(headers["ratelimit-remaining"], "0");
    assert_eq!(headers["retry-after"], "30");
    assert!(headers.get("ratelimit-reset").is_some());

    let payload = serde_json::json!({ "wordCount": 3, "studyMinutes": 1 });
    let (status, headers, _) =
        call(&app.app, Method::POST, "/api/events", Some(payload), &user.token).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers["ratelimit-limit"], "10");
    assert_eq!(headers["ratelimit-remaining"], "9");
}

#[tokio::test]
async fn it_zero_budget_leaves_class_unlimited() {
    let app = spawn_test_server_with_limits(RateLimitConfig {
        summary_max: 0,
        ..uniform_limits(1)
    })
    .await;
    let user = register_user(&app.app).await;
    let path = format!("/api/users/{}/summary?{SUMMARY}", user.id);

    for _ in 0..5 {
        let (status, headers, _) = call(&app.app, Method::GET, &path, None, &user.token).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.get("ratelimit-limit").is_none());
    }
}

#[tokio::test]
async fn it_health_is_not_rate_limited() {
    let app = spawn_test_server_with_limits(uniform_limits(1)).await;

    for _ in 0..5 {
        let (status, _, _) =
            response_json(request(&app.app, Method::GET, "/health/live", None, &[]).await).await;
        assert_eq!(status, StatusCode::OK);
    }
}
