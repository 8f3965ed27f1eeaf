//! Feed collector and local status API for the manor dashboards.
//!
//! This crate provides the headless agent that:
//! - Polls the configured dashboard feeds (laundry, lights, sensors) from
//!   the hosted backend on their own cadences
//! - Reports every outcome into one shared health tracker (the
//!   "connection degraded" banner signal)
//! - Keeps the latest snapshot per feed in memory, last fetch wins
//! - Debounces light control requests into single outbound commands, with
//!   optimistic reversion on failure
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Health banner signal
//! - `GET /api/status` - Collector state and per-feed poller stats
//! - `POST /api/collector/start` - Resume polling (page visible)
//! - `POST /api/collector/stop` - Pause polling (pages hidden)
//! - `GET /api/feeds` - Feed snapshot summaries
//! - `GET /api/feeds/{name}` - Latest rows for one feed
//! - `GET /api/lights` - Desired and confirmed light state
//! - `POST /api/lights/{id}` - Debounced light control
//! - `GET /api/notices` - Recent failed-write notices
//!
//! # Configuration
//!
//! The agent reads configuration from `~/.config/manor/agent.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8090"
//!
//! [backend]
//! url = "https://example.backend.co"
//! # api_key usually comes from MANOR_BACKEND_KEY instead
//!
//! [[feeds]]
//! name = "laundry"
//! kind = "laundry"
//! poll_interval = 15
//!
//! [[feeds]]
//! name = "lights"
//! kind = "lights"
//! poll_interval = 10
//! ```

pub mod api;
pub mod collector;
pub mod config;
pub mod control;
pub mod state;

pub use collector::Collector;
pub use config::{
    BackendConfig, BackoffConfig, Config, ConfigError, ControlConfig, FeedConfig, FeedKind,
    HealthConfig, ServerConfig,
};
pub use control::{CommandSink, FunctionSink, LightAction, LightCommand, LightCommander};
pub use state::{AppState, FeedSnapshot, LightsState, Notice};
