//! Agent configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable consulted when the config file carries no API key.
pub const API_KEY_ENV: &str = "MANOR_BACKEND_KEY";

/// Agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local status API settings.
    pub server: ServerConfig,
    /// Hosted backend settings.
    pub backend: BackendConfig,
    /// Health banner thresholds.
    pub health: HealthConfig,
    /// Backoff policy under sustained refresh failure.
    pub backoff: BackoffConfig,
    /// Light control settings.
    pub control: ControlConfig,
    /// Feeds to poll.
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format)
    /// - Backend URL is http(s)
    /// - Feed names are non-empty and unique
    /// - Feed poll intervals are within reasonable bounds
    /// - Threshold and quiet-period values are sane
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.backend.validate());
        errors.extend(self.health.validate());
        errors.extend(self.backoff.validate());
        errors.extend(self.control.validate());

        let mut seen_names = std::collections::HashSet::new();
        for (i, feed) in self.feeds.iter().enumerate() {
            let prefix = format!("feeds[{}]", i);
            errors.extend(feed.validate(&prefix));

            if !seen_names.insert(feed.name.to_lowercase()) {
                errors.push(ValidationError {
                    field: format!("{}.name", prefix),
                    message: format!("duplicate feed name '{}'", feed.name),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Local status API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8090").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8090".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: "bind address cannot be empty".to_string(),
            });
        } else {
            let parts: Vec<&str> = self.bind.rsplitn(2, ':').collect();
            if parts.len() != 2 {
                errors.push(ValidationError {
                    field: "server.bind".to_string(),
                    message: format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                });
            } else {
                match parts[0].parse::<u16>() {
                    Ok(0) => {
                        errors.push(ValidationError {
                            field: "server.bind".to_string(),
                            message: "port cannot be 0".to_string(),
                        });
                    }
                    Err(_) => {
                        errors.push(ValidationError {
                            field: "server.bind".to_string(),
                            message: format!(
                                "invalid port '{}': must be a number 1-65535",
                                parts[0]
                            ),
                        });
                    }
                    Ok(_) => {}
                }
            }
        }

        errors
    }
}

/// Hosted backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project base URL.
    pub url: String,
    /// API key. Usually left out of the file and supplied via
    /// `MANOR_BACKEND_KEY` instead.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            api_key: None,
        }
    }
}

impl BackendConfig {
    /// Validate backend configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            errors.push(ValidationError {
                field: "backend.url".to_string(),
                message: format!(
                    "invalid URL '{}': must start with http:// or https://",
                    self.url
                ),
            });
        }

        errors
    }

    /// The API key from the config file or the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
    }
}

/// Health banner thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failures before the banner shows.
    pub degraded_after: u32,
    /// Consecutive successes before it clears.
    pub healthy_after: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            degraded_after: 2,
            healthy_after: 1,
        }
    }
}

impl HealthConfig {
    /// Validate health configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.degraded_after == 0 {
            errors.push(ValidationError {
                field: "health.degraded_after".to_string(),
                message: "must be >= 1".to_string(),
            });
        }
        if self.healthy_after == 0 {
            errors.push(ValidationError {
                field: "health.healthy_after".to_string(),
                message: "must be >= 1".to_string(),
            });
        }
        errors
    }

    /// Convert to poller thresholds.
    pub fn thresholds(&self) -> manor_poll::HealthThresholds {
        manor_poll::HealthThresholds {
            degraded_after: self.degraded_after,
            healthy_after: self.healthy_after,
        }
    }
}

/// Backoff policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Consecutive failures tolerated at the base interval.
    pub failure_threshold: u32,
    /// Interval multiplier once the threshold is crossed.
    pub multiplier: f64,
    /// Maximum interval as a multiple of the base.
    pub max_scale: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            multiplier: 2.0,
            max_scale: 8.0,
        }
    }
}

impl BackoffConfig {
    /// Validate backoff configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.failure_threshold == 0 {
            errors.push(ValidationError {
                field: "backoff.failure_threshold".to_string(),
                message: "must be >= 1".to_string(),
            });
        }
        if self.multiplier < 1.0 {
            errors.push(ValidationError {
                field: "backoff.multiplier".to_string(),
                message: "must be >= 1.0".to_string(),
            });
        }
        if self.max_scale < 1.0 {
            errors.push(ValidationError {
                field: "backoff.max_scale".to_string(),
                message: "must be >= 1.0".to_string(),
            });
        }
        errors
    }

    /// Convert to a poller backoff policy.
    pub fn policy(&self) -> manor_poll::BackoffPolicy {
        manor_poll::BackoffPolicy::default()
            .failure_threshold(self.failure_threshold)
            .multiplier(self.multiplier)
            .max_scale(self.max_scale)
    }
}

/// Light control configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Quiet period in milliseconds between the last slider event and the
    /// outbound command.
    pub quiet_period_ms: u64,
    /// Serverless function that applies light commands.
    pub function: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 400,
            function: "light-control".to_string(),
        }
    }
}

impl ControlConfig {
    /// Validate control configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.quiet_period_ms == 0 {
            errors.push(ValidationError {
                field: "control.quiet_period_ms".to_string(),
                message: "must be >= 1".to_string(),
            });
        }
        if self.function.is_empty() {
            errors.push(ValidationError {
                field: "control.function".to_string(),
                message: "function name cannot be empty".to_string(),
            });
        }
        errors
    }
}

/// Which table a feed reads and how the agent interprets the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Washer/dryer status rows.
    Laundry,
    /// Light group state rows.
    Lights,
    /// Environmental sensor samples.
    Sensors,
}

impl FeedKind {
    /// The default backend table for this feed kind.
    pub fn default_table(&self) -> &'static str {
        match self {
            FeedKind::Laundry => "laundry_status",
            FeedKind::Lights => "light_groups",
            FeedKind::Sensors => "sensor_samples",
        }
    }
}

/// Configuration for one polled feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed name; keys the snapshot and the status API.
    pub name: String,
    /// Row interpretation.
    pub kind: FeedKind,
    /// Backend table override; defaults per kind.
    #[serde(default)]
    pub table: Option<String>,
    /// Poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

/// Minimum poll interval in seconds.
pub const MIN_POLL_INTERVAL: u64 = 5;
/// Maximum poll interval in seconds (1 hour).
pub const MAX_POLL_INTERVAL: u64 = 3600;

fn default_poll_interval() -> u64 {
    30
}

impl FeedConfig {
    /// The table this feed reads.
    pub fn table(&self) -> &str {
        self.table.as_deref().unwrap_or(self.kind.default_table())
    }

    /// Validate feed configuration.
    pub fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.name.is_empty() {
            errors.push(ValidationError {
                field: format!("{}.name", prefix),
                message: "feed name cannot be empty".to_string(),
            });
        }

        if let Some(table) = &self.table
            && table.is_empty()
        {
            errors.push(ValidationError {
                field: format!("{}.table", prefix),
                message: "table cannot be empty string (use null/omit instead)".to_string(),
            });
        }

        if self.poll_interval < MIN_POLL_INTERVAL {
            errors.push(ValidationError {
                field: format!("{}.poll_interval", prefix),
                message: format!(
                    "poll interval {} is too short (minimum {} seconds)",
                    self.poll_interval, MIN_POLL_INTERVAL
                ),
            });
        } else if self.poll_interval > MAX_POLL_INTERVAL {
            errors.push(ValidationError {
                field: format!("{}.poll_interval", prefix),
                message: format!(
                    "poll interval {} is too long (maximum {} seconds / 1 hour)",
                    self.poll_interval, MAX_POLL_INTERVAL
                ),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `feeds[0].name`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("manor")
        .join("agent.toml")
}
