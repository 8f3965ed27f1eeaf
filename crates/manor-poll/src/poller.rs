//! Repeating refresh scheduling with failure backoff.
//!
//! A [`PollManager`] owns one repeating asynchronous refresh operation: a
//! dashboard feed fetch, a device state read, anything that either completes
//! or fails. Refreshes are strictly sequential; the next one is scheduled
//! `interval` after the previous one *completes*, never from wall-clock
//! slots, so a slow backend can never stack up overlapping requests.
//!
//! Scheduling is modeled as an explicit state machine rather than a bare
//! timer handle:
//!
//! ```text
//!          start                    timer fire
//! Idle ----------> Refreshing <---------------- Scheduled
//!   ^                   |                           ^
//!   |     stop          | refresh complete          |
//!   +-------------------+---------------------------+
//! ```
//!
//! Refresh errors never escape the loop; they increment the
//! consecutive-failure counter, stretch the interval per the
//! [`BackoffPolicy`], and are forwarded to the shared [`HealthTracker`] if
//! one is attached. The first success snaps the cadence back to the base
//! interval.
//!
//! Pausing on page-hide (or any other visibility signal) is the caller's
//! job: call [`PollManager::stop`] when the surface goes away and
//! [`PollManager::start`] when it returns, which also performs the
//! immediate catch-up refresh.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::backoff::BackoffPolicy;
use crate::error::{BoxError, Error, Result};
use crate::health::HealthTracker;

/// Lifecycle state of a poll manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    /// Not running; no refresh scheduled.
    Idle,
    /// Waiting out the interval until the next refresh.
    Scheduled,
    /// A refresh is in flight.
    Refreshing,
}

/// Options for a poll manager.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Base interval between refresh completion and the next refresh.
    pub interval: Duration,
    /// Backoff policy applied under sustained failure.
    pub backoff: BackoffPolicy,
}

impl PollOptions {
    /// Create options with the given base interval and a default backoff
    /// policy.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Set the backoff policy.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::InvalidOptions("interval must be > 0".to_string()));
        }
        self.backoff.validate()
    }
}

type RefreshFn = Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync>;

#[derive(Debug)]
struct PollStats {
    state: PollState,
    consecutive_failures: u32,
    current_interval: Duration,
    refresh_count: u64,
    failure_count: u64,
    last_error: Option<String>,
}

struct Shared {
    name: String,
    options: PollOptions,
    health: Option<Arc<HealthTracker>>,
    stats: Mutex<PollStats>,
}

impl Shared {
    fn set_state(&self, state: PollState) {
        self.stats.lock().expect("poll stats poisoned").state = state;
    }

    /// Record a successful refresh and return the next interval.
    fn on_success(&self) -> Duration {
        if let Some(health) = &self.health {
            health.record_success();
        }
        let mut stats = self.stats.lock().expect("poll stats poisoned");
        stats.refresh_count += 1;
        stats.consecutive_failures = 0;
        stats.last_error = None;
        stats.current_interval = self.options.interval;
        self.options.interval
    }

    /// Record a failed refresh and return the backed-off next interval.
    fn on_failure(&self, err: &BoxError) -> Duration {
        if let Some(health) = &self.health {
            health.record_failure();
        }
        let mut stats = self.stats.lock().expect("poll stats poisoned");
        stats.refresh_count += 1;
        stats.failure_count += 1;
        stats.consecutive_failures += 1;
        stats.last_error = Some(err.to_string());

        let failures = stats.consecutive_failures;
        if failures <= 3 {
            warn!(
                poller = %self.name,
                "Refresh failed (attempt {}): {}",
                failures, err
            );
        } else if failures == 4 {
            error!(
                poller = %self.name,
                "Refresh failed {} times in a row, will keep retrying quietly",
                failures
            );
        }

        let delay = self.options.backoff.interval_for(self.options.interval, failures);
        stats.current_interval = delay;
        delay
    }
}

/// Owns a single repeating refresh operation with backoff and health
/// reporting.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use manor_poll::{PollManager, PollOptions};
///
/// # fn example() -> manor_poll::Result<()> {
/// let mut poller = PollManager::new(
///     "laundry",
///     PollOptions::new(Duration::from_secs(15)),
///     || async {
///         // fetch rows, update the view
///         Ok::<_, std::io::Error>(())
///     },
/// )?;
///
/// poller.start();
/// // ... later, when the page is hidden:
/// poller.stop();
/// # Ok(())
/// # }
/// ```
pub struct PollManager {
    shared: Arc<Shared>,
    refresh: RefreshFn,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl PollManager {
    /// Create a new manager around `refresh`. Does not start polling.
    pub fn new<F, Fut, E>(
        name: impl Into<String>,
        options: PollOptions,
        refresh: F,
    ) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        options.validate()?;

        let interval = options.interval;
        let refresh: RefreshFn = Arc::new(
            move || -> BoxFuture<'static, std::result::Result<(), BoxError>> {
                let fut = refresh();
                Box::pin(async move { fut.await.map_err(Into::into) })
            },
        );

        Ok(Self {
            shared: Arc::new(Shared {
                name: name.into(),
                options,
                health: None,
                stats: Mutex::new(PollStats {
                    state: PollState::Idle,
                    consecutive_failures: 0,
                    current_interval: interval,
                    refresh_count: 0,
                    failure_count: 0,
                    last_error: None,
                }),
            }),
            refresh,
            cancel: None,
            task: None,
        })
    }

    /// Attach a shared health tracker; every refresh outcome is reported
    /// into it.
    ///
    /// Must be called before [`start`](Self::start).
    #[must_use]
    pub fn with_health(mut self, health: Arc<HealthTracker>) -> Self {
        let shared = Arc::get_mut(&mut self.shared)
            .expect("with_health called after the poller was started");
        shared.health = Some(health);
        self
    }

    /// Get the poller name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether the poller is currently running.
    pub fn is_running(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| !c.is_cancelled())
            && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start polling: one immediate refresh, then the regular cadence.
    ///
    /// Idempotent; calling `start` on a running poller is a no-op. Calling
    /// it after [`stop`](Self::stop) while a refresh is still in flight
    /// waits for that refresh to settle before the immediate refresh, so
    /// refreshes stay strictly sequential.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let previous = self.task.take();
        let shared = Arc::clone(&self.shared);
        let refresh = Arc::clone(&self.refresh);

        self.task = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            run_loop(shared, refresh, cancel).await;
        }));
    }

    /// Stop polling: no further scheduled refresh will fire.
    ///
    /// Idempotent. An already-in-flight refresh is not aborted; it completes
    /// and its outcome is still recorded, but nothing further is scheduled.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        // The task handle is kept so a subsequent start() can drain the
        // in-flight refresh before firing its own.
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PollState {
        self.shared.stats.lock().expect("poll stats poisoned").state
    }

    /// Current consecutive-failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.shared
            .stats
            .lock()
            .expect("poll stats poisoned")
            .consecutive_failures
    }

    /// The interval that will separate the most recent refresh from the next
    /// one (base interval, or backed off under sustained failure).
    pub fn current_interval(&self) -> Duration {
        self.shared
            .stats
            .lock()
            .expect("poll stats poisoned")
            .current_interval
    }

    /// Get a serializable snapshot of the poller state for status surfaces.
    pub fn snapshot(&self) -> PollerSnapshot {
        let stats = self.shared.stats.lock().expect("poll stats poisoned");
        PollerSnapshot {
            name: self.shared.name.clone(),
            state: stats.state,
            consecutive_failures: stats.consecutive_failures,
            current_interval_ms: stats.current_interval.as_millis() as u64,
            refresh_count: stats.refresh_count,
            failure_count: stats.failure_count,
            last_error: stats.last_error.clone(),
        }
    }
}

impl Drop for PollManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Serializable snapshot of a poller for status surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerSnapshot {
    /// Poller name (feed name on the dashboards).
    pub name: String,
    /// Lifecycle state.
    pub state: PollState,
    /// Current consecutive-failure count.
    pub consecutive_failures: u32,
    /// Effective interval in milliseconds.
    pub current_interval_ms: u64,
    /// Total refreshes attempted.
    pub refresh_count: u64,
    /// Total refreshes failed.
    pub failure_count: u64,
    /// Most recent error message, cleared on success.
    pub last_error: Option<String>,
}

async fn run_loop(shared: Arc<Shared>, refresh: RefreshFn, cancel: CancellationToken) {
    debug!(poller = %shared.name, "Poller started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        shared.set_state(PollState::Refreshing);
        let outcome = (refresh)().await;
        let delay = match outcome {
            Ok(()) => shared.on_success(),
            Err(e) => shared.on_failure(&e),
        };

        // stop() during the refresh: the outcome above is still recorded,
        // but nothing further is scheduled.
        if cancel.is_cancelled() {
            break;
        }

        shared.set_state(PollState::Scheduled);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    shared.set_state(PollState::Idle);
    debug!(poller = %shared.name, "Poller stopped");
}
