//! Route handlers.
//!
//! Store reads and writes are synchronous, so every handler hops onto the
//! blocking pool before touching a service.

use super::AppState;
use crate::models::{
    DashboardSummary, DataResponse, DateBucket, HourlyBucket, LogEntry, NewLogRequest,
    WeekdayBucket,
};
use crate::services::RecentLogsQuery;
use crate::{Error, Result};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

/// Error rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// HTTP status for the wrapped error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self.0 {
            Error::InvalidInput(_) | Error::DegenerateInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Query string of `GET /api/logs`.
///
/// Kept as raw strings so malformed values produce the JSON error body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsParams {
    /// Maximum number of entries.
    pub limit: Option<String>,
    /// Inclusive lower bound, RFC 3339 or `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Inclusive upper bound, RFC 3339 or `YYYY-MM-DD`.
    pub end_date: Option<String>,
}

async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::operation("spawn_blocking", e))?
        .map_err(ApiError)
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

pub(super) async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(super) async fn stats(State(state): State<AppState>) -> ApiResult<Json<DashboardSummary>> {
    let service = state.aggregation.clone();
    blocking(move || service.summary()).await.map(Json)
}

pub(super) async fn today(
    State(state): State<AppState>,
) -> ApiResult<Json<DataResponse<HourlyBucket>>> {
    let service = state.aggregation.clone();
    blocking(move || service.today())
        .await
        .map(|rows| Json(DataResponse::new(rows)))
}

pub(super) async fn week(
    State(state): State<AppState>,
) -> ApiResult<Json<DataResponse<WeekdayBucket>>> {
    let service = state.aggregation.clone();
    blocking(move || service.week())
        .await
        .map(|rows| Json(DataResponse::new(rows)))
}

pub(super) async fn month(
    State(state): State<AppState>,
) -> ApiResult<Json<DataResponse<DateBucket>>> {
    let service = state.aggregation.clone();
    blocking(move || service.month())
        .await
        .map(|rows| Json(DataResponse::new(rows)))
}

pub(super) async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<LogsParams>,
) -> ApiResult<Json<DataResponse<LogEntry>>> {
    let service = state.aggregation.clone();

    let limit = non_empty(params.limit.as_ref())
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|_| Error::InvalidInput(format!("invalid limit '{raw}'")))
        })
        .transpose()?;
    let start = non_empty(params.start_date.as_ref())
        .map(|raw| service.parse_date_bound(raw))
        .transpose()?;
    let end = non_empty(params.end_date.as_ref())
        .map(|raw| service.parse_date_bound(raw))
        .transpose()?;

    let request = RecentLogsQuery { limit, start, end };
    blocking(move || service.recent_logs(request))
        .await
        .map(|rows| Json(DataResponse::new(rows)))
}

pub(super) async fn create_log(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewLogRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<LogEntry>)> {
    let Json(request) = body.map_err(|e| Error::InvalidInput(e.body_text()))?;
    let service = state.manual_logs.clone();
    let entry = blocking(move || service.create(&request)).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{PostureEvent, PostureStatus};
    use crate::server::router;
    use crate::services::{AggregationService, ManualLogService};
    use crate::storage::{InMemoryPostureStore, LogQuery, PageCursor, PostureLogStore};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Monday 2024-03-04 15:00 UTC.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap()
    }

    fn state_with(events: &[PostureEvent]) -> (Arc<InMemoryPostureStore>, AppState) {
        let store = Arc::new(InMemoryPostureStore::new());
        for event in events {
            store.append(event).unwrap();
        }
        let clock = Arc::new(ManualClock::new(now()));
        let state = AppState::new(
            AggregationService::new(store.clone(), clock.clone()),
            ManualLogService::new(store.clone(), clock),
        );
        (store, state)
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_, state) = state_with(&[]);
        let (status, body) = send(state, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_stats_on_empty_store() {
        let (_, state) = state_with(&[]);
        let (status, body) = send(state, get("/api/dashboard/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "currentScore": 90.0, "weeklyAverage": 90.0, "weeklyChange": 0.0 })
        );
    }

    #[tokio::test]
    async fn test_week_always_has_seven_rows() {
        let (_, state) = state_with(&[PostureEvent::new(
            now() - Duration::hours(2),
            PostureStatus::Good,
            100.0,
            10,
        )]);
        let (status, body) = send(state, get("/api/dashboard/week")).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0], json!({ "day": "Mon", "score": 100.0, "sessions": 1 }));
    }

    #[tokio::test]
    async fn test_list_logs_newest_first_with_limit() {
        let events: Vec<_> = (1..=5)
            .map(|i| {
                PostureEvent::new(
                    now() - Duration::minutes(10 * i),
                    PostureStatus::Bad,
                    80.0,
                    5,
                )
                .with_id(format!("evt-{i}"))
            })
            .collect();
        let (_, state) = state_with(&events);

        let (status, body) = send(state, get("/api/logs?limit=2")).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["_id"], "evt-1");
        assert_eq!(rows[1]["_id"], "evt-2");
        assert_eq!(rows[0]["postureType"], "bad");
        assert_eq!(rows[0]["notes"], "80.0° for 5s");
    }

    #[tokio::test]
    async fn test_list_logs_date_filters() {
        let (_, state) = state_with(&[
            PostureEvent::new(now() - Duration::days(3), PostureStatus::Good, 95.0, 5),
            PostureEvent::new(now(), PostureStatus::Good, 96.0, 5),
        ]);
        let (status, body) = send(state, get("/api/logs?startDate=2024-03-04")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_logs_rejects_bad_params() {
        let (_, state) = state_with(&[]);
        let (status, body) = send(state.clone(), get("/api/logs?limit=ten")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid input: invalid limit 'ten'");

        let (status, _) = send(
            state,
            get("/api/logs?startDate=2024-03-05&endDate=2024-03-01"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_log() {
        let (store, state) = state_with(&[]);
        let (status, body) = send(
            state,
            post_json(
                "/api/logs",
                r#"{"postureType":"good","angle":101.5,"duration":20}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["postureType"], "good");
        assert_eq!(body["timestamp"], now().to_rfc3339());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_log_validation() {
        let (store, state) = state_with(&[]);
        let (status, body) = send(
            state.clone(),
            post_json("/api/logs", r#"{"postureType":"good","angle":250,"duration":20}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("angle"));

        let (status, _) = send(
            state,
            post_json("/api/logs", r#"{"postureType":"slouching","angle":90,"duration":20}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.is_empty());
    }

    struct BrokenStore;

    impl PostureLogStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn append(&self, _event: &PostureEvent) -> Result<()> {
            Err(Error::write("append", "disk full"))
        }

        fn fetch_page(
            &self,
            _query: &LogQuery,
            _after: Option<&PageCursor>,
            _page_size: usize,
        ) -> Result<Vec<PostureEvent>> {
            Err(Error::query("fetch_page", "database is locked"))
        }
    }

    #[tokio::test]
    async fn test_store_failures_are_500() {
        let store: Arc<dyn PostureLogStore> = Arc::new(BrokenStore);
        let clock = Arc::new(ManualClock::new(now()));
        let state = AppState::new(
            AggregationService::new(store.clone(), clock.clone()),
            ManualLogService::new(store, clock),
        );

        let (status, body) = send(state.clone(), get("/api/dashboard/month")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "query 'fetch_page' failed: database is locked"
        );

        let (status, _) = send(
            state,
            post_json("/api/logs", r#"{"postureType":"bad","angle":80,"duration":5}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
