//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `autorule.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Upper bound on the scheduler cadence in seconds.
const MAX_CADENCE_SECS: u64 = 30;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Job queue and worker pool sizing.
    pub engine: EngineConfig,
    /// Cron scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Rules loaded at start-up.
    pub rules: RulesConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Jobs run concurrently.
    pub workers: usize,
    /// Jobs waiting for a worker before producers are held back.
    pub queue_capacity: usize,
    /// Upper bound on a single action handler call.
    pub action_timeout_secs: u64,
    /// Notifications buffered per change feed subscriber.
    pub feed_capacity: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Seconds between two cron evaluations. At most half a minute, so timer
    /// drift never skips a whole minute.
    pub cadence_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// JSON array of rule definitions upserted by name at start-up.
    pub seed_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `autorule.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("autorule.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AUTORULE_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("AUTORULE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(workers) = std::env::var("AUTORULE_WORKERS")
            .ok()
            .and_then(|val| val.parse().ok())
        {
            self.engine.workers = workers;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("engine.workers", self.engine.workers),
            ("engine.queue_capacity", self.engine.queue_capacity),
            ("engine.feed_capacity", self.engine.feed_capacity),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be non-zero")));
            }
        }
        if self.engine.action_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "engine.action_timeout_secs must be non-zero".to_string(),
            ));
        }
        if !(1..=MAX_CADENCE_SECS).contains(&self.scheduler.cadence_secs) {
            return Err(ConfigError::Validation(format!(
                "scheduler.cadence_secs must be between 1 and {MAX_CADENCE_SECS}"
            )));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl EngineConfig {
    #[must_use]
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:autorule.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "autoruled=info,autorule_app=info,autorule_adapter_storage_sqlite_sqlx=info"
                .to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            action_timeout_secs: 30,
            feed_capacity: 256,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cadence_secs: 30,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
