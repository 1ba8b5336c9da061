//! End-to-end tests for the REST API, driving the real router over the
//! in-memory record store.

use api_lib::web::{api_router, state::AppState};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use learning_log_core::memory::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const WORD_COUNT_PLACEHOLDER: &str = "word count less than 1";
const STUDY_MINUTES_PLACEHOLDER: &str = "study minutes less than a minute";

fn test_app() -> Router {
    let state = Arc::new(AppState {
        store: Arc::new(MemoryStore::new()),
    });
    api_router(state)
}

async fn do_post(app: &Router, body: Value) -> (StatusCode, Value) {
    do_post_with_header(app, body, None).await
}

async fn do_post_with_header(
    app: &Router,
    body: Value,
    idempotency_header: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/api/records")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = idempotency_header {
        request = request.header("Idempotency-Key", key);
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn do_get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Post one record with a 60-minute duration starting at `start`.
async fn post_session(app: &Router, user_id: &str, key: &str, word_count: i64, start: &str, end: &str) {
    let (status, _) = do_post(
        app,
        json!({
            "user_id": user_id,
            "idempotency_key": key,
            "word_count": word_count,
            "start_at": start,
            "end_at": end,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

//=========================================================================================
// Idempotent writes
//=========================================================================================

#[tokio::test]
async fn idempotent_create_then_replay_returns_same_record() {
    let app = test_app();
    let payload = json!({
        "user_id": "u-idem",
        "idempotency_key": "idem-1",
        "word_count": 10,
        "end_at": "2025-10-27T10:00:00Z",
    });

    let (status, first) = do_post(&app, payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["user_id"], "u-idem");
    assert_eq!(first["idempotency_key"], "idem-1");
    assert_eq!(first["word_count"], 10);
    assert!(first["start_at"].is_null());
    assert!(!first["end_at"].is_null());
    assert!(!first["created_at"].is_null());

    let (status, second) = do_post(&app, payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], first["id"]);
}

#[tokio::test]
async fn same_key_different_payload_is_conflict() {
    let app = test_app();
    let base = json!({
        "user_id": "u-conf",
        "idempotency_key": "idem-x",
        "word_count": 5,
        "end_at": "2025-10-27T10:00:00Z",
    });
    let (status, _) = do_post(&app, base.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let mut conflicting = base;
    conflicting["word_count"] = json!(6);
    let (status, body) = do_post(&app, conflicting).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("Idempotency-Key reused"));

    // The original record is untouched.
    let (_, summary) = do_get(
        &app,
        "/api/users/u-conf/summary?from=2025-10-27T00:00:00Z&to=2025-10-28T00:00:00Z&granularity=day&tz=UTC",
    )
    .await;
    assert_eq!(summary["totals"]["word_count"], 5.0);
}

#[tokio::test]
async fn header_key_takes_precedence_over_body_field() {
    let app = test_app();
    let body = json!({
        "user_id": "u-hdr",
        "idempotency_key": "body-key",
        "word_count": 7,
        "end_at": "2025-10-27T10:00:00Z",
    });

    let (status, first) = do_post_with_header(&app, body.clone(), Some("header-key")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["idempotency_key"], "header-key");

    // Replaying via the header hits the same record; the body field alone
    // creates a distinct one.
    let (status, replay) = do_post_with_header(&app, body.clone(), Some("header-key")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["id"], first["id"]);

    let (status, separate) = do_post(&app, body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(separate["id"], first["id"]);
}

#[tokio::test]
async fn missing_timestamps_default_to_a_point_in_time_event() {
    let app = test_app();
    let (status, body) = do_post(
        &app,
        json!({
            "user_id": "u-default",
            "idempotency_key": "d-1",
            "word_count": 3,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["start_at"].is_null());
    assert!(!body["end_at"].is_null());
    assert_eq!(body["study_minutes"], 0);
}

#[tokio::test]
async fn validation_failures_are_400() {
    let app = test_app();
    let cases = [
        // missing user_id
        json!({"idempotency_key": "k", "word_count": 1}),
        // missing idempotency key
        json!({"user_id": "u", "word_count": 1}),
        // missing word_count
        json!({"user_id": "u", "idempotency_key": "k"}),
        // non-integer word_count
        json!({"user_id": "u", "idempotency_key": "k", "word_count": "ten"}),
        json!({"user_id": "u", "idempotency_key": "k", "word_count": 1.5}),
        // negative word_count
        json!({"user_id": "u", "idempotency_key": "k", "word_count": -1}),
        // key too long
        json!({"user_id": "u", "idempotency_key": "k".repeat(65), "word_count": 1}),
        // unparseable timestamp
        json!({"user_id": "u", "idempotency_key": "k", "word_count": 1, "end_at": "yesterday"}),
        // start after end
        json!({
            "user_id": "u", "idempotency_key": "k", "word_count": 1,
            "start_at": "2025-10-27T11:00:00Z", "end_at": "2025-10-27T10:00:00Z",
        }),
    ];
    for payload in cases {
        let (status, body) = do_post(&app, payload.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload: {}", payload);
        assert!(body["detail"].is_string());
    }
}

//=========================================================================================
// Summaries
//=========================================================================================

#[tokio::test]
async fn same_day_session_counts_words_and_minutes() {
    let app = test_app();
    let (status, body) = do_post(
        &app,
        json!({
            "user_id": "u-dur",
            "idempotency_key": "dur-1",
            "word_count": 20,
            "start_at": "2025-10-27T10:00:00Z",
            "end_at": "2025-10-27T10:45:00Z",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["study_minutes"], 45);

    // Both instants stay on the 27th in Tokyo as well.
    let (status, data) = do_get(
        &app,
        "/api/users/u-dur/summary?from=2025-10-27T00:00:00Z&to=2025-10-28T00:00:00Z&granularity=day&tz=Asia/Tokyo&include_empty=true",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["totals"]["word_count"], 20.0);
    assert_eq!(data["totals"]["study_minutes"], 45.0);
    assert_eq!(data["averages_per_bucket"]["word_count"], 20.0);
    assert_eq!(data["averages_per_bucket"]["study_minutes"], 45.0);
}

#[tokio::test]
async fn cross_local_day_session_drops_minutes_but_keeps_words() {
    let app = test_app();
    // 14:30-15:30 UTC crosses midnight in Tokyo (23:30 -> 00:30).
    post_session(
        &app,
        "u-cross",
        "cross-1",
        100,
        "2025-10-27T14:30:00Z",
        "2025-10-27T15:30:00Z",
    )
    .await;

    let (status, data) = do_get(
        &app,
        "/api/users/u-cross/summary?from=2025-10-27T00:00:00Z&to=2025-10-29T00:00:00Z&granularity=day&tz=Asia/Tokyo&include_empty=true",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["totals"]["word_count"], 100.0);
    assert_eq!(data["totals"]["study_minutes"], STUDY_MINUTES_PLACEHOLDER);
    // Two local days enumerated; words land in the end-time bucket.
    assert_eq!(data["averages_per_bucket"]["word_count"], 50.0);
    assert_eq!(
        data["averages_per_bucket"]["study_minutes"],
        STUDY_MINUTES_PLACEHOLDER
    );
}

#[tokio::test]
async fn include_empty_switches_the_averages_denominator() {
    let app = test_app();
    // One 50-minute, 30-word session inside a 3-hour window.
    post_session(
        &app,
        "u-active",
        "active-1",
        30,
        "2025-10-27T11:10:00Z",
        "2025-10-27T12:00:00Z",
    )
    .await;

    let base = "/api/users/u-active/summary?from=2025-10-27T10:00:00Z&to=2025-10-27T13:00:00Z&granularity=hour&tz=Asia/Tokyo";
    let (_, with_empty) = do_get(&app, &format!("{base}&include_empty=true")).await;
    let (_, active_only) = do_get(&app, &format!("{base}&include_empty=false")).await;

    assert_eq!(with_empty["averages_per_bucket"]["word_count"], 10.0);
    assert_eq!(active_only["averages_per_bucket"]["word_count"], 30.0);
    assert_eq!(with_empty["totals"]["word_count"], 30.0);
    assert_eq!(with_empty["totals"]["study_minutes"], 50.0);
}

#[tokio::test]
async fn small_totals_and_averages_become_placeholder_strings() {
    let app = test_app();
    // Zero words, 30 seconds of study.
    post_session(
        &app,
        "u-small",
        "small-1",
        0,
        "2025-10-27T09:00:00Z",
        "2025-10-27T09:00:30Z",
    )
    .await;

    let (status, data) = do_get(
        &app,
        "/api/users/u-small/summary?from=2025-10-27T09:00:00Z&to=2025-10-27T10:00:00Z&granularity=hour&tz=Asia/Tokyo&include_empty=true",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["totals"]["word_count"], WORD_COUNT_PLACEHOLDER);
    assert_eq!(data["totals"]["study_minutes"], STUDY_MINUTES_PLACEHOLDER);
    assert_eq!(
        data["averages_per_bucket"]["word_count"],
        WORD_COUNT_PLACEHOLDER
    );
    assert_eq!(
        data["averages_per_bucket"]["study_minutes"],
        STUDY_MINUTES_PLACEHOLDER
    );
}

#[tokio::test]
async fn five_consecutive_days_of_sessions() {
    let app = test_app();
    // One 60-minute session per day, 2025-10-01 through 2025-10-05.
    for (i, wc) in [10, 20, 30, 40, 50].into_iter().enumerate() {
        let day = i + 1;
        post_session(
            &app,
            "u-5days",
            &format!("k-{i}"),
            wc,
            &format!("2025-10-{day:02}T09:00:00Z"),
            &format!("2025-10-{day:02}T10:00:00Z"),
        )
        .await;
    }

    let window = "from=2025-10-01T00:00:00Z&to=2025-10-06T00:00:00Z";
    let (_, daily) = do_get(
        &app,
        &format!("/api/users/u-5days/summary?{window}&granularity=day&tz=UTC&include_empty=true"),
    )
    .await;
    assert_eq!(daily["totals"]["word_count"], 150.0);
    assert_eq!(daily["totals"]["study_minutes"], 300.0);
    assert_eq!(daily["averages_per_bucket"]["word_count"], 30.0);
    assert_eq!(daily["averages_per_bucket"]["study_minutes"], 60.0);

    // Hourly with include_empty=false: five active hours.
    let (_, hourly) = do_get(
        &app,
        &format!("/api/users/u-5days/summary?{window}&granularity=hour&tz=UTC&include_empty=false"),
    )
    .await;
    assert_eq!(hourly["totals"]["word_count"], 150.0);
    assert_eq!(hourly["averages_per_bucket"]["word_count"], 30.0);
    assert_eq!(hourly["averages_per_bucket"]["study_minutes"], 60.0);
}

#[tokio::test]
async fn months_scattered_across_an_eight_month_window() {
    let app = test_app();
    for (i, (month, wc)) in [(2, 10), (4, 20), (8, 30), (9, 40)].into_iter().enumerate() {
        post_session(
            &app,
            "u-scatter",
            &format!("m-{i}"),
            wc,
            &format!("2025-{month:02}-10T12:00:00Z"),
            &format!("2025-{month:02}-10T13:00:00Z"),
        )
        .await;
    }

    let window = "from=2025-02-01T00:00:00Z&to=2025-10-01T00:00:00Z";
    let (_, with_empty) = do_get(
        &app,
        &format!("/api/users/u-scatter/summary?{window}&granularity=month&tz=UTC&include_empty=true"),
    )
    .await;
    assert_eq!(with_empty["totals"]["word_count"], 100.0);
    assert_eq!(with_empty["totals"]["study_minutes"], 240.0);
    // Eight enumerated months, four of them active.
    assert_eq!(with_empty["averages_per_bucket"]["word_count"], 12.5);
    assert_eq!(with_empty["averages_per_bucket"]["study_minutes"], 30.0);

    let (_, active_only) = do_get(
        &app,
        &format!("/api/users/u-scatter/summary?{window}&granularity=month&tz=UTC&include_empty=false"),
    )
    .await;
    assert_eq!(active_only["averages_per_bucket"]["word_count"], 25.0);
    assert_eq!(active_only["averages_per_bucket"]["study_minutes"], 60.0);
}

#[tokio::test]
async fn empty_and_inverted_windows_are_valid_queries() {
    let app = test_app();
    post_session(
        &app,
        "u-empty",
        "e-1",
        10,
        "2025-10-27T10:00:00Z",
        "2025-10-27T11:00:00Z",
    )
    .await;

    for window in [
        "from=2025-10-27T00:00:00Z&to=2025-10-27T00:00:00Z",
        "from=2025-10-28T00:00:00Z&to=2025-10-27T00:00:00Z",
    ] {
        let (status, data) = do_get(
            &app,
            &format!("/api/users/u-empty/summary?{window}&granularity=day&tz=UTC"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        // All-zero results present as the sub-1 placeholders.
        assert_eq!(data["totals"]["word_count"], WORD_COUNT_PLACEHOLDER);
        assert_eq!(data["totals"]["study_minutes"], STUDY_MINUTES_PLACEHOLDER);
        assert_eq!(
            data["averages_per_bucket"]["word_count"],
            WORD_COUNT_PLACEHOLDER
        );
    }
}

#[tokio::test]
async fn summary_defaults_and_echoed_fields() {
    let app = test_app();
    let (status, data) = do_get(
        &app,
        "/api/users/u-echo/summary?from=2025-10-27T00:00:00Z&to=2025-10-28T00:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["user_id"], "u-echo");
    assert_eq!(data["granularity"], "day");
    assert_eq!(data["tz"], "UTC");
    assert_eq!(data["include_empty"], true);
    assert_eq!(data["from"], "2025-10-27T00:00:00Z");
    assert_eq!(data["to"], "2025-10-28T00:00:00Z");
}

#[tokio::test]
async fn summary_parameter_errors_are_400() {
    let app = test_app();
    let window = "from=2025-10-27T00:00:00Z&to=2025-10-28T00:00:00Z";
    let cases = [
        // missing from/to
        "/api/users/u/summary".to_string(),
        "/api/users/u/summary?from=2025-10-27T00:00:00Z".to_string(),
        // invalid granularity
        format!("/api/users/u/summary?{window}&granularity=week"),
        // unknown timezone
        format!("/api/users/u/summary?{window}&tz=Mars/Olympus"),
        // unparseable bounds
        "/api/users/u/summary?from=yesterday&to=today".to_string(),
    ];
    for uri in cases {
        let (status, body) = do_get(&app, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri: {}", uri);
        assert!(body["detail"].is_string());
    }
}
