mod common;

use axum::http::{Method, StatusCode};

use common::app::spawn_test_server;
use common::auth::register_user;
use common::http::{assert_json_error, call};

#[tokio::test]
async fn it_event_created_then_duplicate_reported() {
    let app = spawn_test_server().await;
    let user = register_user(&app.app).await;

    let payload = serde_json::json!({
        "wordCount": 120,
        "studyMinutes": 35,
        "timestamp": "2024-01-15T23:30:00",
        "timezoneName": "America/Los_Angeles"
    });

    let (status, _, body) =
        call(&app.app, Method::POST, "/api/events", Some(payload.clone()), &user.token).await;
    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert_eq!(body["data"]["duplicate"], false);
    let event = &body["data"]["event"];
    assert_eq!(event["timestampUtc"], "2024-01-16T07:30:00Z");
    assert_eq!(event["clientTimestamp"], "2024-01-15T23:30:00-08:00");
    assert_eq!(event["timezoneName"], "America/Los_Angeles");
    assert_eq!(event["userId"], user.id.as_str());
    let first_id = event["id"].as_str().unwrap().to_string();

    let (status, _, body) =
        call(&app.app, Method::POST, "/api/events", Some(payload), &user.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["duplicate"], true);
    assert_eq!(body["data"]["event"]["id"], first_id.as_str());

    assert_eq!(app.state.store().count_user_events(&user.id).unwrap(), 1);
}

#[tokio::test]
async fn it_event_same_instant_other_offset_is_duplicate() {
    let app = spawn_test_server().await;
    let user = register_user(&app.app).await;

    let first = serde_json::json!({
        "wordCount": 10, "studyMinutes": 5, "timestamp": "2024-03-01T12:00:00Z"
    });
    // Same instant written with +02:00, different counts: stored event wins.
    let second = serde_json::json!({
        "wordCount": 99, "studyMinutes": 1, "timestamp": "2024-03-01T14:00:00+02:00"
    });

    let (status, _, _) = call(&app.app, Method::POST, "/api/events", Some(first), &user.token).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) =
        call(&app.app, Method::POST, "/api/events", Some(second), &user.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["duplicate"], true);
    assert_eq!(body["data"]["event"]["wordCount"], 10);
}

#[tokio::test]
async fn it_event_snake_case_fields_and_default_zone() {
    let app = spawn_test_server().await;
    let user = register_user(&app.app).await;

    let (status, _, body) = call(
        &app.app,
        Method::POST,
        "/api/events",
        Some(serde_json::json!({
            "word_count": 40,
            "study_time": 12,
            "timestamp": "2024-05-01T08:00:00"
        })),
        &user.token,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert_eq!(body["data"]["event"]["timezoneName"], "UTC");
    assert_eq!(body["data"]["event"]["timestampUtc"], "2024-05-01T08:00:00Z");
    assert_eq!(body["data"]["event"]["studyMinutes"], 12);
}

#[tokio::test]
async fn it_event_missing_timestamp_uses_now() {
    let app = spawn_test_server().await;
    let user = register_user(&app.app).await;

    let (status, _, body) = call(
        &app.app,
        Method::POST,
        "/api/events",
        Some(serde_json::json!({ "wordCount": 1, "studyMinutes": 1 })),
        &user.token,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"]["event"]["timestampUtc"].is_string());
}

#[tokio::test]
async fn it_event_validation_errors() {
    let app = spawn_test_server().await;
    let user = register_user(&app.app).await;

    let cases = [
        (
            serde_json::json!({ "wordCount": 1, "studyMinutes": 1, "timezoneName": "Mars/Base" }),
            "INVALID_TIMEZONE",
        ),
        (
            serde_json::json!({ "wordCount": -5, "studyMinutes": 1 }),
            "INVALID_REQUEST_BODY",
        ),
        (
            serde_json::json!({ "wordCount": 1, "studyMinutes": 1, "timestamp": "tomorrow" }),
            "INVALID_TIMESTAMP",
        ),
        (
            serde_json::json!({ "studyMinutes": 1 }),
            "INVALID_REQUEST_BODY",
        ),
    ];

    for (payload, code) in cases {
        let (status, _, body) =
            call(&app.app, Method::POST, "/api/events", Some(payload), &user.token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_json_error(&body, code);
    }
    assert_eq!(app.state.store().count_user_events(&user.id).unwrap(), 0);
}

#[tokio::test]
async fn it_event_list_is_paginated_newest_first() {
    let app = spawn_test_server().await;
    let user = register_user(&app.app).await;
    let other = register_user(&app.app).await;

    for day in 1..=5 {
        let payload = serde_json::json!({
            "wordCount": day,
            "studyMinutes": 1,
            "timestamp": format!("2024-02-0{day}T10:00:00Z"),
        });
        let (status, _, _) =
            call(&app.app, Method::POST, "/api/events", Some(payload), &user.token).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    call(
        &app.app,
        Method::POST,
        "/api/events",
        Some(serde_json::json!({ "wordCount": 77, "studyMinutes": 1 })),
        &other.token,
    )
    .await;

    let (status, _, body) =
        call(&app.app, Method::GET, "/api/events?page=2&perPage=2", None, &user.token).await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["data"];
    assert_eq!(page["total"], 5);
    assert_eq!(page["totalPages"], 3);
    let words: Vec<i64> = page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["wordCount"].as_i64().unwrap())
        .collect();
    assert_eq!(words, vec![3, 2]);
}
