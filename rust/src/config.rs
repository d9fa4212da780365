//! Configuration types for the playout conductor.

use serde::Deserialize;

/// Timing and verbosity settings of the conductor.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Window in which resource changes coalesce into one auto-fill pass
    pub autofill_rate_limit_ms: u64,
    /// Window in which resource updates are batched towards observers
    pub resource_batch_ms: u64,
    /// A device refresh older than this no longer blocks auto-refresh
    pub refresh_liveness_ms: u64,
    /// Consecutive idle samples before a group auto-stops
    pub auto_stop_confirm_samples: u32,
    /// Period of the driver loop
    pub tick_interval_ms: u64,
    /// Length of auto-filled parts whose resource has no duration
    pub default_part_duration_ms: i64,
    /// Logging verbosity (0-3)
    pub verbosity: u8,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            autofill_rate_limit_ms: 100,
            resource_batch_ms: 100,
            refresh_liveness_ms: 10_000,
            auto_stop_confirm_samples: 2,
            tick_interval_ms: 20,
            default_part_duration_ms: 5_000,
            verbosity: 0,
        }
    }
}

impl ConductorConfig {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ConductorConfig::from_json_str(r#"{"verbosity": 2, "tick_interval_ms": 40}"#)
            .unwrap();
        assert_eq!(config.verbosity, 2);
        assert_eq!(config.tick_interval_ms, 40);
        assert_eq!(config.autofill_rate_limit_ms, 100);
        assert_eq!(config.auto_stop_confirm_samples, 2);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(ConductorConfig::from_json_str(r#"{"verbosity": "loud"}"#).is_err());
    }
}
