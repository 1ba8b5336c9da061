//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Handlers parse and type-check the wire format themselves (every failure
//! is a 400 with a `detail` message); semantic validation and the
//! idempotent-write protocol live in `learning_log_core`. The small-value
//! presentation rule is applied here, after all numeric computation.

use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use learning_log_core::{
    aggregate::{summarize_user, SummaryQuery, SummaryValues},
    domain::{study_minutes, Granularity, LearningRecord},
    write::{submit_record, NewRecord, WriteError, WriteOutcome},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

/// Shown instead of a word-count total or average strictly below 1.
const WORD_COUNT_PLACEHOLDER: &str = "word count less than 1";
/// Shown instead of a study-minutes total or average strictly below 1.
const STUDY_MINUTES_PLACEHOLDER: &str = "study minutes less than a minute";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_record_handler,
        user_summary_handler,
    ),
    components(
        schemas(RecordResponse, SummaryResponse, SummaryBlock, SummaryValue, ErrorDetail)
    ),
    tags(
        (name = "Learning Log API", description = "API endpoints for recording learning sessions and summarizing them.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The error body used by every non-2xx response.
#[derive(Serialize, ToSchema)]
pub struct ErrorDetail {
    pub detail: String,
}

/// A stored record echoed back to the caller, plus the derived
/// `study_minutes` (no cross-day rule applies to this echo).
#[derive(Serialize, ToSchema)]
pub struct RecordResponse {
    id: Uuid,
    user_id: String,
    idempotency_key: String,
    word_count: i64,
    start_at: Option<DateTime<Utc>>,
    end_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    study_minutes: i64,
}

impl RecordResponse {
    fn from_record(record: &LearningRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id.clone(),
            idempotency_key: record.idempotency_key.clone(),
            word_count: record.word_count,
            start_at: record.start_at,
            end_at: record.end_at,
            created_at: record.created_at,
            study_minutes: study_minutes(record.start_at, record.end_at),
        }
    }
}

/// A numeric summary value, or its placeholder string when below 1.
#[derive(Serialize, ToSchema)]
#[serde(untagged)]
pub enum SummaryValue {
    Number(f64),
    Text(String),
}

#[derive(Serialize, ToSchema)]
pub struct SummaryBlock {
    word_count: SummaryValue,
    study_minutes: SummaryValue,
}

impl SummaryBlock {
    fn present(values: SummaryValues) -> Self {
        Self {
            word_count: present_value(values.word_count, WORD_COUNT_PLACEHOLDER),
            study_minutes: present_value(values.study_minutes, STUDY_MINUTES_PLACEHOLDER),
        }
    }
}

fn present_value(value: f64, placeholder: &str) -> SummaryValue {
    if value < 1.0 {
        SummaryValue::Text(placeholder.to_string())
    } else {
        SummaryValue::Number(value)
    }
}

#[derive(Serialize, ToSchema)]
pub struct SummaryResponse {
    user_id: String,
    from: String,
    to: String,
    granularity: String,
    tz: String,
    include_empty: bool,
    totals: SummaryBlock,
    averages_per_bucket: SummaryBlock,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorDetail>)>;

fn bad_request(detail: impl Into<String>) -> (StatusCode, Json<ErrorDetail>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorDetail {
            detail: detail.into(),
        }),
    )
}

//=========================================================================================
// Timestamp Parsing
//=========================================================================================

/// Parse an ISO-8601 timestamp; naive timestamps are assumed UTC.
fn parse_iso_utc(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    Err("invalid datetime format".to_string())
}

fn parse_optional_datetime(
    body: &Value,
    field: &str,
) -> ApiResult<Option<DateTime<Utc>>> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => parse_iso_utc(raw).map(Some).map_err(|e| bad_request(e)),
        Some(_) => Err(bad_request(format!("{field} must be an ISO-8601 string."))),
    }
}

/// An unencoded `+00:00` offset loses its `+` to URL decoding and arrives
/// as a space; put the `+` back before parsing.
fn fix_unencoded_offset(raw: String) -> String {
    if raw.contains(' ') && !raw.contains("+00:00") && !raw.contains('Z') {
        raw.replacen(' ', "+", 1)
    } else {
        raw
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Record a learning session (idempotent).
///
/// The idempotency key is read from the `Idempotency-Key` header, falling
/// back to the `idempotency_key` body field. Replaying the same key with
/// an identical payload echoes the original record with a 200; replaying
/// it with a different payload is a 409.
#[utoipa::path(
    post,
    path = "/api/records",
    request_body(content_type = "application/json", description = "user_id, idempotency_key, word_count, optional start_at/end_at (ISO-8601)."),
    responses(
        (status = 201, description = "Record created", body = RecordResponse),
        (status = 200, description = "Idempotent replay of an existing record", body = RecordResponse),
        (status = 400, description = "Validation failure", body = ErrorDetail),
        (status = 409, description = "Idempotency-Key reused with a different payload", body = ErrorDetail)
    ),
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Takes precedence over the idempotency_key body field.")
    )
)]
pub async fn create_record_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<RecordResponse>)> {
    let user_id = body
        .get("user_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if user_id.is_empty() {
        return Err(bad_request("user_id is required."));
    }

    let word_count = match body.get("word_count").and_then(Value::as_i64) {
        Some(v) => v,
        None => return Err(bad_request("word_count must be an integer.")),
    };

    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            body.get("idempotency_key")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default();

    let start_at = parse_optional_datetime(&body, "start_at")?;
    let end_at = parse_optional_datetime(&body, "end_at")?;

    let input = NewRecord {
        user_id,
        idempotency_key,
        word_count,
        start_at,
        end_at,
    };
    match submit_record(state.store.as_ref(), input, Utc::now()).await {
        Ok(outcome) => {
            let status = match outcome {
                WriteOutcome::Created(_) => StatusCode::CREATED,
                WriteOutcome::Replayed(_) => StatusCode::OK,
            };
            Ok((status, Json(RecordResponse::from_record(outcome.record()))))
        }
        Err(WriteError::Validation(detail)) => Err((StatusCode::BAD_REQUEST, Json(ErrorDetail { detail }))),
        Err(WriteError::Conflict) => Err((
            StatusCode::CONFLICT,
            Json(ErrorDetail {
                detail: "Idempotency-Key reused with different payload.".to_string(),
            }),
        )),
        Err(WriteError::Port(e)) => {
            error!("Failed to create record: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorDetail {
                    detail: "Failed to create record".to_string(),
                }),
            ))
        }
    }
}

/// Query parameters accepted by the summary endpoint. `include_empty` is
/// kept as a raw string so anything other than `true` (case-insensitive)
/// reads as `false`.
#[derive(Deserialize)]
pub struct SummaryParams {
    from: Option<String>,
    to: Option<String>,
    granularity: Option<String>,
    tz: Option<String>,
    include_empty: Option<String>,
}

/// Summarize a user's learning records over `[from, to)`.
///
/// Returns totals and per-bucket averages at the requested granularity in
/// the requested timezone; no per-bucket breakdown is exposed.
#[utoipa::path(
    get,
    path = "/api/users/{user_id}/summary",
    responses(
        (status = 200, description = "Totals and per-bucket averages for the window", body = SummaryResponse),
        (status = 400, description = "Missing or invalid query parameter", body = ErrorDetail)
    ),
    params(
        ("user_id" = String, Path, description = "The owner of the records."),
        ("from" = String, Query, description = "Window start, ISO-8601, inclusive."),
        ("to" = String, Query, description = "Window end, ISO-8601, exclusive."),
        ("granularity" = Option<String>, Query, description = "hour | day | month (default day)."),
        ("tz" = Option<String>, Query, description = "IANA timezone name (default UTC)."),
        ("include_empty" = Option<String>, Query, description = "true divides averages by every bucket in the window, false by active buckets only (default true).")
    )
)]
pub async fn user_summary_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<SummaryParams>,
) -> ApiResult<Json<SummaryResponse>> {
    let (raw_from, raw_to) = match (params.from, params.to) {
        (Some(from), Some(to)) => (from, to),
        _ => return Err(bad_request("from and to are required (ISO-8601).")),
    };
    let raw_from = fix_unencoded_offset(raw_from);
    let raw_to = fix_unencoded_offset(raw_to);

    let granularity_str = params.granularity.unwrap_or_else(|| "day".to_string());
    let granularity: Granularity = granularity_str
        .parse()
        .map_err(|_| bad_request("granularity must be hour|day|month."))?;

    let tz_name = params.tz.unwrap_or_else(|| "UTC".to_string());
    let tz: Tz = tz_name.parse().map_err(|_| bad_request("invalid tz."))?;

    let include_empty = params
        .include_empty
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(true);

    let from = parse_iso_utc(&raw_from).map_err(|_| bad_request("from/to must be ISO-8601"))?;
    let to = parse_iso_utc(&raw_to).map_err(|_| bad_request("from/to must be ISO-8601"))?;

    let query = SummaryQuery {
        from,
        to,
        granularity,
        tz,
        include_empty,
    };
    let summary = summarize_user(state.store.as_ref(), &user_id, &query)
        .await
        .map_err(|e| {
            error!("Failed to summarize records for {}: {:?}", user_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorDetail {
                    detail: "Failed to summarize records".to_string(),
                }),
            )
        })?;

    Ok(Json(SummaryResponse {
        user_id,
        from: raw_from,
        to: raw_to,
        granularity: granularity_str,
        tz: tz_name,
        include_empty,
        totals: SummaryBlock::present(summary.totals),
        averages_per_bucket: SummaryBlock::present(summary.averages_per_bucket),
    }))
}

//=========================================================================================
// Router
//=========================================================================================

/// Build the API router over the shared state. Used by the binary and the
/// HTTP tests alike.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/records", post(create_record_handler))
        .route("/api/users/{user_id}/summary", get(user_summary_handler))
        .with_state(state)
}
