//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the evaluation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on a single condition-check command (default: 10s).
    #[serde(with = "duration_secs")]
    pub condition_timeout: Duration,
    /// Completed/expired/deleted records older than this are eligible for
    /// maintenance garbage collection (default: 30 days).
    pub retention_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            condition_timeout: Duration::from_secs(10),
            retention_days: 30,
        }
    }
}

impl EngineConfig {
    /// Set the condition-check timeout.
    pub fn with_condition_timeout(mut self, timeout: Duration) -> Self {
        self.condition_timeout = timeout;
        self
    }

    /// Set the maintenance retention window in days.
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Create config from environment variables.
    ///
    /// Reads:
    /// - `TICKLER_CONDITION_TIMEOUT_SECS` (default: 10)
    /// - `TICKLER_RETENTION_DAYS` (default: 30)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secs) = std::env::var("TICKLER_CONDITION_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.condition_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(days) = std::env::var("TICKLER_RETENTION_DAYS") {
            if let Ok(days) = days.parse() {
                config.retention_days = days;
            }
        }

        config
    }
}

/// Default location of the reminder database, under the platform data dir.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tickler")
        .join("tickler.db")
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
