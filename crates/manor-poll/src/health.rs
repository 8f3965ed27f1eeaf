//! Shared backend health tracking.
//!
//! Every poller and one-off query in the process reports into a single
//! [`HealthTracker`] so any surface can decide whether to show a
//! "connection degraded" banner. The tracker is an explicitly constructed
//! object: create one at application start and hand an `Arc` to everything
//! that wants to report into or read from it.
//!
//! A single failed request does not flip the status; the streak thresholds
//! make the signal coarse on the way down and fast on the way back up.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Coarse backend health derived from recent success/failure streaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Recent backend interactions are succeeding.
    Healthy,
    /// The backend has failed repeatedly; surfaces should show a banner.
    Degraded,
}

/// Streak thresholds for flipping the health status.
#[derive(Debug, Clone)]
pub struct HealthThresholds {
    /// Consecutive failures required before the status becomes degraded.
    pub degraded_after: u32,
    /// Consecutive successes required before the status becomes healthy again.
    pub healthy_after: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_after: 2,
            healthy_after: 1,
        }
    }
}

impl HealthThresholds {
    /// Validate the thresholds and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.degraded_after == 0 {
            return Err(Error::InvalidOptions(
                "degraded_after must be >= 1".to_string(),
            ));
        }
        if self.healthy_after == 0 {
            return Err(Error::InvalidOptions(
                "healthy_after must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct HealthState {
    success_streak: u32,
    failure_streak: u32,
    status: HealthStatus,
}

/// Process-wide record of whether recent backend interactions are succeeding.
///
/// Updates are interleaved but never lost: the state sits behind a mutex held
/// only for the duration of a counter update.
#[derive(Debug)]
pub struct HealthTracker {
    thresholds: HealthThresholds,
    state: Mutex<HealthState>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(HealthThresholds::default())
    }
}

impl HealthTracker {
    /// Create a new tracker. The initial status is healthy.
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            thresholds,
            state: Mutex::new(HealthState {
                success_streak: 0,
                failure_streak: 0,
                status: HealthStatus::Healthy,
            }),
        }
    }

    /// Create a shared tracker ready to hand to pollers.
    pub fn shared(thresholds: HealthThresholds) -> Arc<Self> {
        Arc::new(Self::new(thresholds))
    }

    /// Record a successful backend interaction.
    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("health state poisoned");
        state.failure_streak = 0;
        state.success_streak = state.success_streak.saturating_add(1);
        if state.success_streak >= self.thresholds.healthy_after {
            state.status = HealthStatus::Healthy;
        }
    }

    /// Record a failed backend interaction.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("health state poisoned");
        state.success_streak = 0;
        state.failure_streak = state.failure_streak.saturating_add(1);
        if state.failure_streak >= self.thresholds.degraded_after {
            state.status = HealthStatus::Degraded;
        }
    }

    /// Get the current status.
    pub fn status(&self) -> HealthStatus {
        self.state.lock().expect("health state poisoned").status
    }

    /// Get a serializable snapshot of the current state.
    pub fn snapshot(&self) -> HealthSnapshot {
        let state = self.state.lock().expect("health state poisoned");
        HealthSnapshot {
            status: state.status,
            success_streak: state.success_streak,
            failure_streak: state.failure_streak,
        }
    }
}

/// Serializable snapshot of the tracker state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Current coarse status.
    pub status: HealthStatus,
    /// Current consecutive-success count.
    pub success_streak: u32,
    /// Current consecutive-failure count.
    pub failure_streak: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initially_healthy() {
        let tracker = HealthTracker::default();
        assert_eq!(tracker.status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_single_failure_does_not_degrade() {
        let tracker = HealthTracker::default();
        tracker.record_failure();
        assert_eq!(tracker.status(), HealthStatus::Healthy);
        assert_eq!(tracker.snapshot().failure_streak, 1);
    }

    #[test]
    fn test_degraded_at_exactly_two_failures() {
        let tracker = HealthTracker::default();
        tracker.record_failure();
        tracker.record_failure();
        assert_eq!(tracker.status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_healthy_after_exactly_one_success() {
        let tracker = HealthTracker::default();
        for _ in 0..5 {
            tracker.record_failure();
        }
        assert_eq!(tracker.status(), HealthStatus::Degraded);

        tracker.record_success();
        assert_eq!(tracker.status(), HealthStatus::Healthy);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.failure_streak, 0);
        assert_eq!(snapshot.success_streak, 1);
    }

    #[test]
    fn test_success_interrupts_failure_streak() {
        let tracker = HealthTracker::default();
        tracker.record_failure();
        tracker.record_success();
        tracker.record_failure();
        // Two failures total, but never two consecutive.
        assert_eq!(tracker.status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_custom_thresholds() {
        let tracker = HealthTracker::new(HealthThresholds {
            degraded_after: 4,
            healthy_after: 2,
        });
        for _ in 0..3 {
            tracker.record_failure();
        }
        assert_eq!(tracker.status(), HealthStatus::Healthy);
        tracker.record_failure();
        assert_eq!(tracker.status(), HealthStatus::Degraded);

        tracker.record_success();
        assert_eq!(tracker.status(), HealthStatus::Degraded);
        tracker.record_success();
        assert_eq!(tracker.status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_thresholds_validate() {
        assert!(HealthThresholds::default().validate().is_ok());
        assert!(HealthThresholds {
            degraded_after: 0,
            healthy_after: 1
        }
        .validate()
        .is_err());
        assert!(HealthThresholds {
            degraded_after: 2,
            healthy_after: 0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_snapshot_serialization() {
        let tracker = HealthTracker::default();
        tracker.record_failure();
        tracker.record_failure();

        let json = serde_json::to_string(&tracker.snapshot()).unwrap();
        assert!(json.contains("\"degraded\""));
        assert!(json.contains("\"failure_streak\":2"));
    }

    #[test]
    fn test_shared_across_reporters() {
        let tracker = HealthTracker::shared(HealthThresholds::default());
        let a = Arc::clone(&tracker);
        let b = Arc::clone(&tracker);
        a.record_failure();
        b.record_failure();
        // Two pollers reporting into the same tracker combine into one streak.
        assert_eq!(tracker.status(), HealthStatus::Degraded);
    }
}
