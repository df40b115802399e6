//! Runtime configuration for the scheduling core.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tunables for identity resolution and scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Appointment length when a request does not specify one
    pub default_duration_minutes: u32,
    /// Longest appointment accepted
    pub max_duration_minutes: u32,
    /// How long a writer waits for another writer before giving up
    pub busy_timeout_ms: u64,
    /// Scores at or above this are flagged "likely duplicate, review required"
    pub likely_duplicate_threshold: f64,
    /// Scores below this are discarded
    pub possible_duplicate_threshold: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: 30,
            max_duration_minutes: 720,
            busy_timeout_ms: 5000,
            likely_duplicate_threshold: 0.9,
            possible_duplicate_threshold: 0.6,
        }
    }
}

impl CoreConfig {
    /// Read overrides from `CLINIC_*` environment variables, falling back to
    /// defaults for anything missing or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            default_duration_minutes: env_or(
                "CLINIC_DEFAULT_DURATION_MINUTES",
                defaults.default_duration_minutes,
            ),
            max_duration_minutes: env_or("CLINIC_MAX_DURATION_MINUTES", defaults.max_duration_minutes),
            busy_timeout_ms: env_or("CLINIC_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms),
            likely_duplicate_threshold: env_or(
                "CLINIC_LIKELY_DUPLICATE_THRESHOLD",
                defaults.likely_duplicate_threshold,
            ),
            possible_duplicate_threshold: env_or(
                "CLINIC_POSSIBLE_DUPLICATE_THRESHOLD",
                defaults.possible_duplicate_threshold,
            ),
        };

        if let Err(reason) = config.validate() {
            warn!("Invalid clinic configuration ({}), using defaults", reason);
            return defaults;
        }
        config
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_duration_minutes == 0 {
            return Err("default duration must be positive".into());
        }
        if self.default_duration_minutes > self.max_duration_minutes {
            return Err("default duration exceeds maximum duration".into());
        }
        if !(0.0..=1.0).contains(&self.possible_duplicate_threshold)
            || !(0.0..=1.0).contains(&self.likely_duplicate_threshold)
        {
            return Err("duplicate thresholds must be within [0, 1]".into());
        }
        if self.possible_duplicate_threshold > self.likely_duplicate_threshold {
            return Err("possible threshold above likely threshold".into());
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has unparseable value {:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
