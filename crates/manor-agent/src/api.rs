//! REST API for the agent.
//!
//! The dashboard pages read everything they render from here: the health
//! banner signal, feed snapshots, poller stats, and light state. Light
//! control requests come back through the same surface and get debounced
//! before anything leaves the house.
//!
//! All endpoints return structured JSON errors via [`AppError`]. Client
//! errors (not found, bad request) return appropriate 4xx status codes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use manor_backend::LightGroup;
use manor_poll::{HealthSnapshot, HealthStatus, PollerSnapshot};

use crate::config::FeedKind;
use crate::control::LightAction;
use crate::state::{AppState, FeedSnapshot, Notice};

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Health and status
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        // Collector control (visibility pause/resume hooks)
        .route("/api/collector/start", post(collector_start))
        .route("/api/collector/stop", post(collector_stop))
        // Feed snapshots
        .route("/api/feeds", get(list_feeds))
        .route("/api/feeds/{name}", get(get_feed))
        // Light state and control
        .route("/api/lights", get(get_lights))
        .route("/api/lights/{id}", post(set_light))
        // User-visible notices
        .route("/api/notices", get(get_notices))
}

/// Health check response; drives the "connection degraded" banner.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Streak detail behind the coarse status.
    pub backend: HealthSnapshot,
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let backend = state.health.snapshot();
    Json(HealthResponse {
        status: match backend.status {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
        },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        backend,
    })
}

/// Service status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Agent version.
    pub version: &'static str,
    /// Current timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Collector status.
    pub collector: CollectorStatus,
    /// Per-feed poller statistics.
    pub pollers: Vec<PollerSnapshot>,
}

/// Collector status.
#[derive(Debug, Serialize)]
pub struct CollectorStatus {
    /// Whether the collector is running.
    pub running: bool,
    /// When the collector was started (if running).
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    /// How long the collector has been running (in seconds).
    pub uptime_seconds: Option<u64>,
}

/// Get agent status including collector state and poller stats.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let collector = state.collector.lock().await;
    let running = collector.is_running();
    let started_at = collector.started_at();
    let uptime_seconds = started_at.map(|s| {
        let now = OffsetDateTime::now_utc();
        (now - s).whole_seconds().max(0) as u64
    });
    let pollers = collector.snapshots();
    drop(collector);

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        collector: CollectorStatus {
            running,
            started_at,
            uptime_seconds,
        },
        pollers,
    })
}

/// Response for collector control actions.
#[derive(Debug, Serialize)]
pub struct CollectorActionResponse {
    pub success: bool,
    pub message: String,
    pub running: bool,
}

/// Start the collector (page became visible again).
async fn collector_start(State(state): State<Arc<AppState>>) -> Json<CollectorActionResponse> {
    let mut collector = state.collector.lock().await;
    if collector.is_running() {
        return Json(CollectorActionResponse {
            success: false,
            message: "Collector is already running".to_string(),
            running: true,
        });
    }

    collector.start();
    Json(CollectorActionResponse {
        success: true,
        message: "Collector started".to_string(),
        running: true,
    })
}

/// Stop the collector (pages hidden).
async fn collector_stop(State(state): State<Arc<AppState>>) -> Json<CollectorActionResponse> {
    let mut collector = state.collector.lock().await;
    if !collector.is_running() {
        return Json(CollectorActionResponse {
            success: false,
            message: "Collector is not running".to_string(),
            running: false,
        });
    }

    collector.stop();
    Json(CollectorActionResponse {
        success: true,
        message: "Collector stopped".to_string(),
        running: false,
    })
}

/// One line per feed in the feed listing.
#[derive(Debug, Serialize)]
pub struct FeedSummary {
    pub name: String,
    pub kind: FeedKind,
    pub row_count: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

/// List feeds with a snapshot summary.
async fn list_feeds(State(state): State<Arc<AppState>>) -> Json<Vec<FeedSummary>> {
    let feeds = state.feeds.read().await;
    let mut summaries: Vec<FeedSummary> = feeds
        .iter()
        .map(|(name, snapshot)| FeedSummary {
            name: name.clone(),
            kind: snapshot.kind,
            row_count: snapshot.row_count,
            fetched_at: snapshot.fetched_at,
        })
        .collect();
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    Json(summaries)
}

/// Get the latest snapshot for one feed.
async fn get_feed(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<FeedSnapshot>, AppError> {
    let feeds = state.feeds.read().await;
    feeds
        .get(&name)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Feed not found: {}", name)))
}

/// Desired and confirmed light state.
#[derive(Debug, Serialize)]
pub struct LightsView {
    /// What the resident asked for (optimistic).
    pub desired: Vec<LightGroup>,
    /// What the backend last acknowledged.
    pub confirmed: Vec<LightGroup>,
}

/// Get light group state.
async fn get_lights(State(state): State<Arc<AppState>>) -> Json<LightsView> {
    let lights = state.lights.read().await;
    let mut desired: Vec<LightGroup> = lights.desired.values().cloned().collect();
    let mut confirmed: Vec<LightGroup> = lights.confirmed.values().cloned().collect();
    desired.sort_by_key(|g| g.id);
    confirmed.sort_by_key(|g| g.id);
    Json(LightsView { desired, confirmed })
}

/// A light control request; any subset of fields may be present.
#[derive(Debug, Default, Deserialize)]
pub struct LightRequest {
    pub power: Option<bool>,
    pub brightness: Option<u8>,
    pub color: Option<String>,
}

impl LightRequest {
    /// Validate the request and return the actions to apply.
    pub fn actions(&self) -> Result<Vec<LightAction>, AppError> {
        let mut actions = Vec::new();

        if let Some(power) = self.power {
            actions.push(LightAction::Power(power));
        }
        if let Some(brightness) = self.brightness {
            if brightness > 100 {
                return Err(AppError::BadRequest(format!(
                    "brightness {} out of range (0-100)",
                    brightness
                )));
            }
            actions.push(LightAction::Brightness(brightness));
        }
        if let Some(color) = &self.color {
            if !is_hex_color(color) {
                return Err(AppError::BadRequest(format!(
                    "invalid color '{}': expected #rrggbb",
                    color
                )));
            }
            actions.push(LightAction::Color(color.clone()));
        }

        if actions.is_empty() {
            return Err(AppError::BadRequest(
                "request must set power, brightness or color".to_string(),
            ));
        }
        Ok(actions)
    }
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7
        && s.starts_with('#')
        && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Apply a control request to one light group.
///
/// The desired state updates immediately; the outbound command is debounced
/// per control, so dragging a slider produces one write.
async fn set_light(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<LightRequest>,
) -> Result<Json<LightGroup>, AppError> {
    let actions = request.actions()?;

    let mut commander = state.commander.lock().await;
    for action in actions {
        if !commander.apply(id, action).await {
            return Err(AppError::NotFound(format!("Light group not found: {}", id)));
        }
    }
    drop(commander);

    let lights = state.lights.read().await;
    let group = lights
        .desired
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Light group not found: {}", id)))?;
    Ok(Json(group))
}

/// Get recent notices.
async fn get_notices(State(state): State<Arc<AppState>>) -> Json<Vec<Notice>> {
    Json(state.notices.read().await.clone())
}

/// API error type with JSON responses.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found (404).
    NotFound(String),
    /// Invalid request (400).
    BadRequest(String),
    /// Internal error (500).
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use time::macros::datetime;
    use tower::ServiceExt;

    use manor_backend::BackendClient;

    use crate::config::Config;

    fn create_test_state() -> Arc<AppState> {
        let mut config = Config::default();
        // Keep debounced sends from firing mid-test.
        config.control.quiet_period_ms = 60_000;
        let backend = BackendClient::new("http://127.0.0.1:1", "test-key").unwrap();
        AppState::new(config, backend).unwrap()
    }

    async fn response_body(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
        let app = router().with_state(state);
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response_body(response).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    async fn post_json(
        state: Arc<AppState>,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let app = router().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response_body(response).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    fn test_group(id: i64, brightness: u8) -> LightGroup {
        LightGroup {
            id,
            name: format!("Group {id}"),
            power: true,
            brightness,
            color: None,
            updated_at: datetime!(2026-08-01 20:00:00 UTC),
        }
    }

    async fn seed_group(state: &Arc<AppState>, group: LightGroup) {
        let mut lights = state.lights.write().await;
        lights.desired.insert(group.id, group.clone());
        lights.confirmed.insert(group.id, group);
    }

    #[tokio::test]
    async fn test_health_initially_healthy() {
        let state = create_test_state();
        let (status, json) = get_json(state, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["backend"]["failure_streak"], 0);
    }

    #[tokio::test]
    async fn test_health_degraded_after_failures() {
        let state = create_test_state();
        state.health.record_failure();
        state.health.record_failure();

        let (status, json) = get_json(state, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["backend"]["failure_streak"], 2);
    }

    #[tokio::test]
    async fn test_status_initially_idle() {
        let state = create_test_state();
        let (status, json) = get_json(state, "/api/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["collector"]["running"], false);
        assert!(json["pollers"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collector_start_stop_routes() {
        let state = create_test_state();

        let (status, json) =
            post_json(Arc::clone(&state), "/api/collector/start", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["running"], true);

        let (_, json) =
            post_json(Arc::clone(&state), "/api/collector/start", serde_json::json!({})).await;
        assert_eq!(json["success"], false);

        let (_, json) =
            post_json(Arc::clone(&state), "/api/collector/stop", serde_json::json!({})).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["running"], false);

        let (_, json) = post_json(state, "/api/collector/stop", serde_json::json!({})).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_get_feed_not_found() {
        let state = create_test_state();
        let (status, json) = get_json(state, "/api/feeds/laundry").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_get_feed_after_snapshot() {
        let state = create_test_state();
        state.feeds.write().await.insert(
            "laundry".to_string(),
            FeedSnapshot {
                kind: FeedKind::Laundry,
                rows: serde_json::json!([{"id": 1, "name": "Washer"}]),
                row_count: 1,
                fetched_at: datetime!(2026-08-01 10:00:00 UTC),
            },
        );

        let (status, json) = get_json(Arc::clone(&state), "/api/feeds/laundry").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["row_count"], 1);
        assert_eq!(json["rows"][0]["name"], "Washer");

        let (status, json) = get_json(state, "/api/feeds").await;
        assert_eq!(status, StatusCode::OK);
        let summaries = json.as_array().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0]["name"], "laundry");
    }

    #[tokio::test]
    async fn test_set_light_unknown_group() {
        let state = create_test_state();
        let (status, json) = post_json(
            state,
            "/api/lights/42",
            serde_json::json!({"brightness": 50}),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("42"));
    }

    #[tokio::test]
    async fn test_set_light_updates_desired_state() {
        let state = create_test_state();
        seed_group(&state, test_group(1, 50)).await;

        let (status, json) = post_json(
            Arc::clone(&state),
            "/api/lights/1",
            serde_json::json!({"brightness": 70}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["brightness"], 70);
        assert_eq!(state.lights.read().await.desired[&1].brightness, 70);
        // The outbound command is debounced; confirmed state is untouched.
        assert_eq!(state.lights.read().await.confirmed[&1].brightness, 50);
    }

    #[tokio::test]
    async fn test_set_light_validates_brightness() {
        let state = create_test_state();
        seed_group(&state, test_group(1, 50)).await;

        let (status, json) = post_json(
            state,
            "/api/lights/1",
            serde_json::json!({"brightness": 150}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("out of range"));
    }

    #[tokio::test]
    async fn test_set_light_validates_color() {
        let state = create_test_state();
        seed_group(&state, test_group(1, 50)).await;

        let (status, _) = post_json(
            Arc::clone(&state),
            "/api/lights/1",
            serde_json::json!({"color": "red"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(
            state,
            "/api/lights/1",
            serde_json::json!({"color": "#ffcc88"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_light_requires_action() {
        let state = create_test_state();
        seed_group(&state, test_group(1, 50)).await;

        let (status, json) = post_json(state, "/api/lights/1", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("must set"));
    }

    #[tokio::test]
    async fn test_get_lights_sorted() {
        let state = create_test_state();
        seed_group(&state, test_group(2, 30)).await;
        seed_group(&state, test_group(1, 50)).await;

        let (status, json) = get_json(state, "/api/lights").await;
        assert_eq!(status, StatusCode::OK);
        let desired = json["desired"].as_array().unwrap();
        assert_eq!(desired.len(), 2);
        assert_eq!(desired[0]["id"], 1);
        assert_eq!(desired[1]["id"], 2);
    }

    #[tokio::test]
    async fn test_notices_empty() {
        let state = create_test_state();
        let (status, json) = get_json(state, "/api/notices").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.as_array().unwrap().is_empty());
    }
}
