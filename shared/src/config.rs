// Config Module
// Runtime tunables with firmware defaults, optionally overlaid from JSON

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;

use crate::error::VaultError;
use crate::reset::ResetPolicy;

/// Durations expressed as integer milliseconds in JSON
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    #[serde(with = "millis")]
    pub tick_interval: Duration,
    /// Minimum continuous hold before a press counts
    #[serde(with = "millis")]
    pub min_hold: Duration,
    pub heartbeat_url: String,
    #[serde(with = "millis")]
    pub heartbeat_interval: Duration,
    #[serde(with = "millis")]
    pub http_timeout: Duration,
    /// How long boot waits for the link after starting association
    #[serde(with = "millis")]
    pub link_timeout: Duration,
    pub ntp_server: String,
    /// Offset applied to wall-clock times in logs
    pub utc_offset_minutes: i32,
    pub reset: ResetPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            min_hold: Duration::from_millis(100),
            heartbeat_url: "http://example.com".to_string(),
            heartbeat_interval: Duration::from_secs(60),
            http_timeout: Duration::from_secs(5),
            link_timeout: Duration::from_secs(20),
            ntp_server: "ntp.nict.jp".to_string(),
            utc_offset_minutes: 9 * 60,
            reset: ResetPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Overlay a JSON document onto the defaults; absent keys keep their default
    pub fn from_json(json: &str) -> Result<Self, VaultError> {
        serde_json::from_str(json).map_err(|e| VaultError::ConfigMalformed(e.to_string()))
    }

    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_cadence() {
        let config = RuntimeConfig::default();
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.reset.entry_presses, 5);
        assert_eq!(config.reset.confirm_presses, 3);
    }

    #[test]
    fn partial_json_overlays_defaults() {
        let config = RuntimeConfig::from_json(
            r#"{"heartbeat_url":"https://status.example.org/ping","http_timeout":2500,
                "reset":{"confirm_presses":4}}"#,
        )
        .unwrap();

        assert_eq!(config.heartbeat_url, "https://status.example.org/ping");
        assert_eq!(config.http_timeout, Duration::from_millis(2_500));
        assert_eq!(config.reset.confirm_presses, 4);
        assert_eq!(config.reset.entry_presses, 5);
        assert_eq!(config.tick_interval, Duration::from_millis(100));
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(RuntimeConfig::from_json(r#"{"tick_interval":"fast"}"#).is_err());
    }

    #[test]
    fn utc_offset_defaults_to_jst() {
        let config = RuntimeConfig::default();
        assert_eq!(config.utc_offset().local_minus_utc(), 9 * 3600);

        let broken = RuntimeConfig {
            utc_offset_minutes: 100 * 60,
            ..RuntimeConfig::default()
        };
        assert_eq!(broken.utc_offset().local_minus_utc(), 0);
    }
}
