//! Backoff policy for repeated refresh failures.
//!
//! A poller tolerates a short run of failures at its normal cadence, then
//! stretches the interval once the failure streak crosses a threshold. The
//! interval snaps back to the base value on the first success so recovery is
//! immediate once the backend is healthy again.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use manor_poll::BackoffPolicy;
//!
//! let policy = BackoffPolicy::default();
//! let base = Duration::from_secs(10);
//!
//! // Transient blips keep the normal cadence.
//! assert_eq!(policy.interval_for(base, 2), base);
//! // Sustained failure stretches it.
//! assert_eq!(policy.interval_for(base, 3), base * 2);
//! ```

use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};

/// Policy controlling how the polling interval stretches under failure.
///
/// The exact threshold, multiplier and cap are deployment tuning knobs, not
/// constants; the defaults match the values the dashboards shipped with.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Consecutive failures tolerated at the base interval before backing off.
    pub failure_threshold: u32,
    /// Interval multiplier applied per failure at and beyond the threshold.
    pub multiplier: f64,
    /// Maximum interval as a multiple of the base interval.
    pub max_scale: f64,
    /// Whether to add up to 25% jitter to backed-off intervals.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            multiplier: 2.0,
            max_scale: 8.0,
            jitter: false,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// No backoff: the base interval is used regardless of failures.
    pub fn none() -> Self {
        Self {
            failure_threshold: u32::MAX,
            multiplier: 1.0,
            max_scale: 1.0,
            jitter: false,
        }
    }

    /// Set the consecutive-failure threshold.
    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the interval multiplier.
    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the maximum scale relative to the base interval.
    #[must_use]
    pub fn max_scale(mut self, max_scale: f64) -> Self {
        self.max_scale = max_scale;
        self
    }

    /// Enable or disable jitter on backed-off intervals.
    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Validate the policy and return an error if invalid.
    ///
    /// Checks that:
    /// - `failure_threshold` is >= 1
    /// - `multiplier` is >= 1.0
    /// - `max_scale` is >= 1.0
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::InvalidOptions(
                "failure_threshold must be >= 1".to_string(),
            ));
        }
        if self.multiplier < 1.0 {
            return Err(Error::InvalidOptions(
                "multiplier must be >= 1.0".to_string(),
            ));
        }
        if self.max_scale < 1.0 {
            return Err(Error::InvalidOptions(
                "max_scale must be >= 1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// Compute the polling interval for a given consecutive-failure count.
    ///
    /// Below the threshold the base interval is returned unchanged. At and
    /// beyond it, the interval is `base * multiplier^(failures - threshold + 1)`,
    /// capped at `max_scale * base`. Zero failures always yields the base
    /// interval.
    pub fn interval_for(&self, base: Duration, consecutive_failures: u32) -> Duration {
        let scale = self.scale_for(consecutive_failures);

        let interval = base.as_secs_f64() * scale;
        let interval = if self.jitter && scale > 1.0 {
            interval * (1.0 + rand::rng().random::<f64>() * 0.25)
        } else {
            interval
        };

        Duration::from_secs_f64(interval)
    }

    fn scale_for(&self, consecutive_failures: u32) -> f64 {
        if consecutive_failures < self.failure_threshold {
            return 1.0;
        }
        // Clamp the exponent so powi cannot overflow to infinity for
        // pathological failure streaks.
        let exponent = (consecutive_failures - self.failure_threshold + 1).min(64);
        self.multiplier.powi(exponent as i32).min(self.max_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE: Duration = Duration::from_secs(10);

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.failure_threshold, 3);
        assert_eq!(policy.multiplier, 2.0);
        assert_eq!(policy.max_scale, 8.0);
        assert!(!policy.jitter);
    }

    #[test]
    fn test_below_threshold_keeps_base() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.interval_for(BASE, 0), BASE);
        assert_eq!(policy.interval_for(BASE, 1), BASE);
        assert_eq!(policy.interval_for(BASE, 2), BASE);
    }

    #[test]
    fn test_doubling_beyond_threshold() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.interval_for(BASE, 3), BASE * 2);
        assert_eq!(policy.interval_for(BASE, 4), BASE * 4);
        assert_eq!(policy.interval_for(BASE, 5), BASE * 8);
        // Capped at 8x base.
        assert_eq!(policy.interval_for(BASE, 6), BASE * 8);
        assert_eq!(policy.interval_for(BASE, 100), BASE * 8);
    }

    #[test]
    fn test_tight_cap() {
        // The dashboards' laundry page shipped with a 2x cap.
        let policy = BackoffPolicy::default().max_scale(2.0);
        assert_eq!(policy.interval_for(BASE, 2), BASE);
        assert_eq!(policy.interval_for(BASE, 3), BASE * 2);
        assert_eq!(policy.interval_for(BASE, 4), BASE * 2);
        assert_eq!(policy.interval_for(BASE, 5), BASE * 2);
    }

    #[test]
    fn test_none_policy() {
        let policy = BackoffPolicy::none();
        assert_eq!(policy.interval_for(BASE, 1000), BASE);
    }

    #[test]
    fn test_validate() {
        assert!(BackoffPolicy::default().validate().is_ok());
        assert!(BackoffPolicy::default()
            .failure_threshold(0)
            .validate()
            .is_err());
        assert!(BackoffPolicy::default().multiplier(0.5).validate().is_err());
        assert!(BackoffPolicy::default().max_scale(0.9).validate().is_err());
    }

    #[test]
    fn test_huge_streak_does_not_overflow() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.interval_for(BASE, u32::MAX), BASE * 8);
    }

    proptest! {
        #[test]
        fn prop_interval_bounded(failures in 0u32..10_000) {
            let policy = BackoffPolicy::default();
            let interval = policy.interval_for(BASE, failures);
            prop_assert!(interval >= BASE);
            prop_assert!(interval <= BASE * 8);
        }

        #[test]
        fn prop_interval_monotonic(failures in 0u32..1_000) {
            let policy = BackoffPolicy::default();
            let a = policy.interval_for(BASE, failures);
            let b = policy.interval_for(BASE, failures + 1);
            prop_assert!(b >= a);
        }
    }
}
