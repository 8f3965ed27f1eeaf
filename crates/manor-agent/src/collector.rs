//! Background feed collector.
//!
//! One poller per configured feed, all reporting into the shared health
//! tracker. Starting and stopping the collector is also the hosting
//! surface's visibility hook: stop when every page is hidden, start again
//! (which refreshes immediately) when one becomes visible.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info};

use manor_backend::{BackendClient, BackendError, LaundryMachine, LightGroup, SensorSample};
use manor_poll::{HealthTracker, PollManager, PollOptions, PollerSnapshot};

use crate::config::{Config, FeedConfig, FeedKind};
use crate::state::{FeedSnapshot, LightsState};

/// Everything a feed refresh needs, cloneable into the poller closures.
#[derive(Clone)]
struct FeedDeps {
    backend: BackendClient,
    feeds: Arc<RwLock<HashMap<String, FeedSnapshot>>>,
    lights: Arc<RwLock<LightsState>>,
}

/// Owns the per-feed pollers.
pub struct Collector {
    pollers: Vec<PollManager>,
    feed_configs: Vec<FeedConfig>,
    deps: FeedDeps,
    health: Arc<HealthTracker>,
    running: bool,
    started_at: Option<OffsetDateTime>,
}

impl Collector {
    /// Build one poller per configured feed. Does not start polling.
    pub fn new(
        config: &Config,
        backend: BackendClient,
        feeds: Arc<RwLock<HashMap<String, FeedSnapshot>>>,
        lights: Arc<RwLock<LightsState>>,
        health: Arc<HealthTracker>,
    ) -> manor_poll::Result<Self> {
        let deps = FeedDeps {
            backend,
            feeds,
            lights,
        };

        let mut pollers = Vec::with_capacity(config.feeds.len());
        for feed in &config.feeds {
            let options = PollOptions::new(Duration::from_secs(feed.poll_interval))
                .backoff(config.backoff.policy());

            let closure_deps = deps.clone();
            let closure_feed = feed.clone();
            let poller = PollManager::new(feed.name.clone(), options, move || {
                let deps = closure_deps.clone();
                let feed = closure_feed.clone();
                async move { refresh_feed(&deps, &feed).await }
            })?
            .with_health(Arc::clone(&health));

            pollers.push(poller);
        }

        Ok(Self {
            pollers,
            feed_configs: config.feeds.clone(),
            deps,
            health,
            running: false,
            started_at: None,
        })
    }

    /// Start every poller. Idempotent.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        if self.pollers.is_empty() {
            info!("No feeds configured for collection");
        } else {
            info!("Starting collector for {} feed(s)", self.pollers.len());
        }

        for poller in &mut self.pollers {
            poller.start();
        }
        self.running = true;
        self.started_at = Some(OffsetDateTime::now_utc());
    }

    /// Stop every poller. Idempotent; in-flight refreshes complete.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        info!("Stopping collector");
        for poller in &mut self.pollers {
            poller.stop();
        }
        self.running = false;
    }

    /// Whether the collector is running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// When the collector was last started.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        self.started_at
    }

    /// Snapshots of every poller for the status API.
    pub fn snapshots(&self) -> Vec<PollerSnapshot> {
        self.pollers.iter().map(|p| p.snapshot()).collect()
    }

    /// Refresh every feed exactly once, outside the polling cadence.
    ///
    /// Used by the `once` subcommand. Outcomes are reported into the shared
    /// health tracker the same way scheduled refreshes are.
    pub async fn refresh_once(&self) -> Vec<(String, Result<(), BackendError>)> {
        let mut outcomes = Vec::with_capacity(self.feed_configs.len());
        for feed in &self.feed_configs {
            let outcome = refresh_feed(&self.deps, feed).await;
            match &outcome {
                Ok(()) => self.health.record_success(),
                Err(_) => self.health.record_failure(),
            }
            outcomes.push((feed.name.clone(), outcome));
        }
        outcomes
    }
}

/// Fetch one feed's rows and store the snapshot.
async fn refresh_feed(deps: &FeedDeps, feed: &FeedConfig) -> Result<(), BackendError> {
    let rows = match feed.kind {
        FeedKind::Laundry => {
            let machines: Vec<LaundryMachine> = deps
                .backend
                .fetch_rows(feed.table(), &[("select", "*"), ("order", "id")])
                .await?;
            to_rows(&machines)
        }
        FeedKind::Lights => {
            let groups: Vec<LightGroup> = deps
                .backend
                .fetch_rows(feed.table(), &[("select", "*"), ("order", "id")])
                .await?;

            let mut lights = deps.lights.write().await;
            for group in &groups {
                lights.confirmed.insert(group.id, group.clone());
                // Desired state only seeds from the backend; a pending
                // optimistic change must not be clobbered by the poll.
                lights
                    .desired
                    .entry(group.id)
                    .or_insert_with(|| group.clone());
            }
            drop(lights);

            to_rows(&groups)
        }
        FeedKind::Sensors => {
            let samples: Vec<SensorSample> = deps
                .backend
                .fetch_rows(
                    feed.table(),
                    &[
                        ("select", "*"),
                        ("order", "captured_at.desc"),
                        ("limit", "50"),
                    ],
                )
                .await?;
            to_rows(&samples)
        }
    };

    let row_count = rows.as_array().map(|a| a.len()).unwrap_or(0);
    debug!(feed = %feed.name, rows = row_count, "Feed refreshed");

    deps.feeds.write().await.insert(
        feed.name.clone(),
        FeedSnapshot {
            kind: feed.kind,
            rows,
            row_count,
            fetched_at: OffsetDateTime::now_utc(),
        },
    );

    Ok(())
}

fn to_rows<T: serde::Serialize>(rows: &[T]) -> serde_json::Value {
    serde_json::to_value(rows).expect("feed rows serialize to JSON")
}
