//! updater.toml configuration parser.
//!
//! ```toml
//! [disruption]
//! min_replicas = 2
//! eviction_tolerance_fraction = 0.5
//! in_place_skip_disruption_budget = false
//!
//! [fallback]
//! deferred_timeout = "5m"
//! in_progress_timeout = "1h"
//! attempt_retention = "30m"
//!
//! [features]
//! in_place = true
//! in_place_or_recreate = true
//!
//! [state]
//! path = "/var/lib/vpa-updater/attempts.redb"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpdaterConfig {
    pub disruption: DisruptionSettings,
    pub fallback: FallbackSettings,
    pub features: FeatureGates,
    pub state: StateSettings,
}

/// Budget parameters for the group-stats builder and arbiters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisruptionSettings {
    /// Global floor on live pods per group; overridden per policy.
    pub min_replicas: u32,
    /// Fraction of configured replicas a group may lose, in [0, 1].
    pub eviction_tolerance_fraction: f64,
    /// Let resizes that restart no container bypass the disruption budget.
    pub in_place_skip_disruption_budget: bool,
    /// Keep groups below minReplicas (eviction-blocked) instead of dropping them.
    pub retain_below_min_replicas: bool,
}

impl Default for DisruptionSettings {
    fn default() -> Self {
        Self {
            min_replicas: 2,
            eviction_tolerance_fraction: 0.5,
            in_place_skip_disruption_budget: false,
            retain_below_min_replicas: false,
        }
    }
}

/// Timeouts for converting a stalled resize into an eviction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FallbackSettings {
    pub deferred_timeout: String,
    pub in_progress_timeout: String,
    /// How long attempt records outlive their pod before being pruned.
    pub attempt_retention: String,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            deferred_timeout: "5m".to_string(),
            in_progress_timeout: "1h".to_string(),
            attempt_retention: "30m".to_string(),
        }
    }
}

impl FallbackSettings {
    pub fn deferred_timeout(&self) -> ConfigResult<Duration> {
        parse_duration("fallback.deferred_timeout", &self.deferred_timeout)
    }

    pub fn in_progress_timeout(&self) -> ConfigResult<Duration> {
        parse_duration("fallback.in_progress_timeout", &self.in_progress_timeout)
    }

    pub fn attempt_retention(&self) -> ConfigResult<Duration> {
        parse_duration("fallback.attempt_retention", &self.attempt_retention)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureGates {
    pub in_place: bool,
    pub in_place_or_recreate: bool,
}

impl Default for FeatureGates {
    fn default() -> Self {
        Self {
            in_place: true,
            in_place_or_recreate: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StateSettings {
    /// redb file for attempt times; in-memory when unset.
    pub path: Option<PathBuf>,
}

impl UpdaterConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: UpdaterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let fraction = self.disruption.eviction_tolerance_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ConfigError::Invalid {
                field: "disruption.eviction_tolerance_fraction",
                reason: format!("{fraction} is outside [0, 1]"),
            });
        }
        self.fallback.deferred_timeout()?;
        if self.fallback.in_progress_timeout()?.is_zero() {
            return Err(ConfigError::Invalid {
                field: "fallback.in_progress_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.fallback.attempt_retention()?;
        Ok(())
    }
}

/// Parse a duration string like "30s", "5m", "1h" (bare numbers are seconds).
pub fn parse_duration(field: &'static str, value: &str) -> ConfigResult<Duration> {
    let s = value.trim();
    let (digits, multiplier) = if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else {
        (s, 1)
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Duration {
            field,
            value: value.to_string(),
        })
}
