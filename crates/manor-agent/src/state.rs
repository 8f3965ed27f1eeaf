//! Application state shared across handlers.
//!
//! One `AppState` exists per agent process. The health tracker is the single
//! shared signal every poller reports into (the "connection degraded" banner
//! source); feed snapshots are last-fetch-wins with no persistence behind
//! them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};

use manor_backend::{BackendClient, LightGroup};
use manor_poll::HealthTracker;

use crate::collector::Collector;
use crate::config::{Config, FeedKind};
use crate::control::{FunctionSink, LightCommander};

/// Maximum retained notices; older ones are dropped.
pub const MAX_NOTICES: usize = 50;

/// Shared application state.
pub struct AppState {
    /// Configuration (RwLock for runtime reads from handlers).
    pub config: RwLock<Config>,
    /// The single shared backend health signal.
    pub health: Arc<HealthTracker>,
    /// Latest snapshot per feed, last fetch wins.
    pub feeds: Arc<RwLock<HashMap<String, FeedSnapshot>>>,
    /// Desired and confirmed light group state.
    pub lights: Arc<RwLock<LightsState>>,
    /// Recent user-visible notices (failed control writes).
    pub notices: Arc<RwLock<Vec<Notice>>>,
    /// The feed collector and its pollers.
    pub collector: Mutex<Collector>,
    /// Debounced light command submission.
    pub commander: Mutex<LightCommander>,
}

impl AppState {
    /// Create new application state with a collector built from `config`.
    pub fn new(config: Config, backend: BackendClient) -> manor_poll::Result<Arc<Self>> {
        let health = HealthTracker::shared(config.health.thresholds());
        let feeds = Arc::new(RwLock::new(HashMap::new()));
        let lights = Arc::new(RwLock::new(LightsState::default()));
        let notices = Arc::new(RwLock::new(Vec::new()));

        let collector = Collector::new(
            &config,
            backend.clone(),
            Arc::clone(&feeds),
            Arc::clone(&lights),
            Arc::clone(&health),
        )?;

        let sink = FunctionSink::new(backend, config.control.function.clone());
        let commander = LightCommander::new(
            Arc::new(sink),
            Duration::from_millis(config.control.quiet_period_ms),
            Arc::clone(&lights),
            Arc::clone(&notices),
        );

        Ok(Arc::new(Self {
            config: RwLock::new(config),
            health,
            feeds,
            lights,
            notices,
            collector: Mutex::new(collector),
            commander: Mutex::new(commander),
        }))
    }
}

/// Latest rows fetched for one feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSnapshot {
    /// Row interpretation.
    pub kind: FeedKind,
    /// The rows exactly as the query returned them.
    pub rows: serde_json::Value,
    /// Number of rows in the snapshot.
    pub row_count: usize,
    /// When the fetch completed; countdown interpolation anchors here.
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

/// Desired (optimistic) and confirmed light group state.
///
/// `desired` tracks what the resident asked for and updates immediately on
/// input; `confirmed` is the last state the backend acknowledged, either via
/// the lights feed or a successful command. A failed command snaps `desired`
/// back to `confirmed`.
#[derive(Debug, Default)]
pub struct LightsState {
    /// Optimistic per-group state keyed by group id.
    pub desired: HashMap<i64, LightGroup>,
    /// Last backend-acknowledged per-group state.
    pub confirmed: HashMap<i64, LightGroup>,
}

/// A user-visible notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    /// What happened.
    pub message: String,
    /// When it happened.
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

/// Append a notice, dropping the oldest beyond [`MAX_NOTICES`].
pub async fn push_notice(notices: &RwLock<Vec<Notice>>, message: String) {
    let mut list = notices.write().await;
    list.push(Notice {
        message,
        at: OffsetDateTime::now_utc(),
    });
    let overflow = list.len().saturating_sub(MAX_NOTICES);
    if overflow > 0 {
        list.drain(..overflow);
    }
}
