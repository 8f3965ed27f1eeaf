//! Keyed trailing-edge debounce for user-driven control writes.
//!
//! Dragging a brightness slider or scrubbing a color picker produces a burst
//! of values per control; only the final one should reach the device. Each
//! call for a key cancels the pending submission for that key and re-arms the
//! quiet period, so exactly one submission fires per burst, carrying the last
//! value seen. Intermediate values are discarded by design.
//!
//! Submission outcomes are the caller's responsibility: a failed write is
//! surfaced to the user and the control reverted, never silently retried.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use manor_poll::Debouncer;
//!
//! # async fn example() {
//! let mut debouncer: Debouncer<String> = Debouncer::new(Duration::from_millis(400));
//!
//! // Each drag event replaces the pending submission for "living-room".
//! for level in [10u8, 40, 70] {
//!     debouncer.submit("living-room".to_string(), level, |level| async move {
//!         // send the command; only the last level ever gets here
//!         let _ = level;
//!     });
//! }
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Default quiet period between the last input event and the submission.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(400);

struct Pending {
    seq: u64,
    token: CancellationToken,
}

/// Coalesces rapid-fire values per control key into one trailing submission.
pub struct Debouncer<K> {
    quiet_period: Duration,
    next_seq: u64,
    pending: Arc<Mutex<HashMap<K, Pending>>>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    /// Create a debouncer with the given quiet period.
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            next_seq: 0,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get the configured quiet period.
    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Schedule `submit(value)` to run after the quiet period, replacing any
    /// pending submission for `key`.
    ///
    /// Cancellation of a superseded submission is immediate and synchronous:
    /// by the time this returns, the previous value for the key can no longer
    /// fire.
    pub fn submit<V, F, Fut>(&mut self, key: K, value: V, submit: F)
    where
        V: Send + 'static,
        F: FnOnce(V) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.next_seq += 1;
        let seq = self.next_seq;
        let token = CancellationToken::new();

        if let Some(prev) = self
            .pending
            .lock()
            .expect("debounce state poisoned")
            .insert(
                key.clone(),
                Pending {
                    seq,
                    token: token.clone(),
                },
            )
        {
            prev.token.cancel();
        }

        let quiet = self.quiet_period;
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(quiet) => {}
            }

            // A newer value may have been scheduled between the timer firing
            // and this task running; the sequence check makes replacement
            // win deterministically.
            {
                let mut map = pending.lock().expect("debounce state poisoned");
                if !map.get(&key).is_some_and(|p| p.seq == seq) {
                    return;
                }
                map.remove(&key);
            }

            submit(value).await;
        });
    }

    /// Cancel the pending submission for `key`, if any.
    pub fn cancel(&mut self, key: &K) {
        if let Some(prev) = self
            .pending
            .lock()
            .expect("debounce state poisoned")
            .remove(key)
        {
            prev.token.cancel();
        }
    }

    /// Cancel every pending submission.
    pub fn cancel_all(&mut self) {
        let mut map = self.pending.lock().expect("debounce state poisoned");
        for (_, prev) in map.drain() {
            prev.token.cancel();
        }
    }

    /// Number of submissions currently waiting out their quiet period.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("debounce state poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Instant, advance};

    type Log = Arc<Mutex<Vec<(u8, Duration)>>>;

    fn recorder(log: Log, start: Instant) -> impl Fn(u8) -> futures::future::BoxFuture<'static, ()> {
        move |value| -> futures::future::BoxFuture<'static, ()> {
            let log = Arc::clone(&log);
            let at = Instant::now() - start;
            Box::pin(async move {
                log.lock().unwrap().push((value, at));
            })
        }
    }

    async fn settle() {
        // Let spawned debounce tasks observe the advanced clock.
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_with_last_value() {
        let start = Instant::now();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut debouncer: Debouncer<&str> = Debouncer::new(Duration::from_millis(400));

        // Input events at t=0, 100, 200, 300ms.
        for (offset, value) in [(0u64, 1u8), (100, 2), (200, 3), (300, 4)] {
            if offset > 0 {
                advance(Duration::from_millis(100)).await;
                settle().await;
            }
            debouncer.submit("lamp", value, recorder(Arc::clone(&log), start));
        }

        advance(Duration::from_millis(400)).await;
        settle().await;

        // Exactly one submission, at t=700ms, carrying the t=300 value.
        let fired = log.lock().unwrap().clone();
        assert_eq!(fired, vec![(4, Duration::from_millis(700))]);
        assert_eq!(debouncer.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_value_fires_after_quiet_period() {
        let start = Instant::now();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut debouncer: Debouncer<u32> = Debouncer::new(DEFAULT_QUIET_PERIOD);

        debouncer.submit(7, 42, recorder(Arc::clone(&log), start));
        assert_eq!(debouncer.pending_len(), 1);

        advance(Duration::from_millis(399)).await;
        settle().await;
        assert!(log.lock().unwrap().is_empty());

        advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(
            log.lock().unwrap().clone(),
            vec![(42, Duration::from_millis(400))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let start = Instant::now();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut debouncer: Debouncer<&str> = Debouncer::new(Duration::from_millis(100));

        debouncer.submit("a", 1, recorder(Arc::clone(&log), start));
        debouncer.submit("b", 2, recorder(Arc::clone(&log), start));
        assert_eq!(debouncer.pending_len(), 2);

        advance(Duration::from_millis(100)).await;
        settle().await;

        let mut fired = log.lock().unwrap().clone();
        fired.sort();
        assert_eq!(
            fired,
            vec![
                (1, Duration::from_millis(100)),
                (2, Duration::from_millis(100))
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let start = Instant::now();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut debouncer: Debouncer<&str> = Debouncer::new(Duration::from_millis(100));

        debouncer.submit("lamp", 1, recorder(Arc::clone(&log), start));
        debouncer.cancel(&"lamp");
        assert_eq!(debouncer.pending_len(), 0);

        advance(Duration::from_millis(500)).await;
        settle().await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let start = Instant::now();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut debouncer: Debouncer<&str> = Debouncer::new(Duration::from_millis(100));

        debouncer.submit("a", 1, recorder(Arc::clone(&log), start));
        debouncer.submit("b", 2, recorder(Arc::clone(&log), start));
        debouncer.cancel_all();

        advance(Duration::from_millis(500)).await;
        settle().await;
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(debouncer.pending_len(), 0);
    }
}
