//! Polling, health tracking and debounce core for the manor dashboards.
//!
//! Every dashboard surface in the house — laundry, lighting, sensors —
//! repeats the same pattern: fetch rows from the hosted backend on a cadence,
//! render them, back off when the backend is struggling, and share a single
//! "is the connection healthy" signal across pages. This crate is that
//! pattern, extracted:
//!
//! - **[`PollManager`]**: one repeating asynchronous refresh with an explicit
//!   Idle/Scheduled/Refreshing state machine, strictly sequential refreshes,
//!   and failure backoff via [`BackoffPolicy`]
//! - **[`HealthTracker`]**: an explicitly constructed, shared
//!   success/failure-streak tracker behind the "connection degraded" banner
//! - **[`Debouncer`]**: per-control trailing-edge debounce that turns a slider
//!   drag into a single outbound command
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use manor_poll::{HealthThresholds, HealthTracker, PollManager, PollOptions};
//!
//! # fn example() -> manor_poll::Result<()> {
//! let health = HealthTracker::shared(HealthThresholds::default());
//!
//! let mut poller = PollManager::new(
//!     "laundry",
//!     PollOptions::new(Duration::from_secs(15)),
//!     || async {
//!         // fetch current machine rows and update the view
//!         Ok::<_, std::io::Error>(())
//!     },
//! )?
//! .with_health(Arc::clone(&health));
//!
//! poller.start();
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod debounce;
pub mod error;
pub mod health;
pub mod poller;

pub use backoff::BackoffPolicy;
pub use debounce::{DEFAULT_QUIET_PERIOD, Debouncer};
pub use error::{BoxError, Error, Result};
pub use health::{HealthSnapshot, HealthStatus, HealthThresholds, HealthTracker};
pub use poller::{PollManager, PollOptions, PollState, PollerSnapshot};
