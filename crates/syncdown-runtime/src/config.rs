//! Context configuration
//!
//! Loaded from defaults, a JSON document, or `SYNCDOWN_*` environment
//! variables. Durations are written the humantime way (`"16ms"`, `"1s"`).

use std::time::Duration;

use serde::Deserialize;

use syncdown_core::{
    SyncdownError, SyncdownResult, TimerEnvelope, WallTime, DEFAULT_CONFIGURED_MINUTES,
    MAX_CONFIGURED_MINUTES, MIN_CONFIGURED_MINUTES,
};
use syncdown_time::CountdownConfig;

/// Shared storage key the envelope lives under
pub const DEFAULT_STORAGE_KEY: &str = "timer-app-state-v2";

pub const ENV_STORAGE_KEY: &str = "SYNCDOWN_STORAGE_KEY";
pub const ENV_DEFAULT_MINUTES: &str = "SYNCDOWN_DEFAULT_MINUTES";
pub const ENV_FRAME_INTERVAL: &str = "SYNCDOWN_FRAME_INTERVAL";
pub const ENV_OVERTIME_FLOOR: &str = "SYNCDOWN_OVERTIME_FLOOR_SECS";

/// Per-context configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextConfig {
    /// Storage key shared by every context of one timer session
    pub storage_key: String,
    /// Duration used when no state is persisted yet
    pub default_minutes: u32,
    /// Countdown cadence
    pub countdown: CountdownConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_minutes: DEFAULT_CONFIGURED_MINUTES,
            countdown: CountdownConfig::default(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    storage_key: Option<String>,
    default_minutes: Option<u32>,
    frame_interval: Option<String>,
    overtime_floor_secs: Option<i64>,
}

impl ContextConfig {
    /// Parse a JSON configuration document; absent keys keep their defaults
    pub fn from_json(raw: &str) -> SyncdownResult<Self> {
        let raw: RawConfig =
            serde_json::from_str(raw).map_err(|e| SyncdownError::InvalidConfig(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Read `SYNCDOWN_*` environment variables over the defaults
    pub fn from_env() -> SyncdownResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source (environment, test table)
    pub fn from_lookup<F>(lookup: F) -> SyncdownResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_minutes = lookup(ENV_DEFAULT_MINUTES)
            .map(|v| {
                v.trim().parse::<u32>().map_err(|e| {
                    SyncdownError::InvalidConfig(format!("{ENV_DEFAULT_MINUTES}={v:?}: {e}"))
                })
            })
            .transpose()?;
        let overtime_floor_secs = lookup(ENV_OVERTIME_FLOOR)
            .map(|v| {
                v.trim().parse::<i64>().map_err(|e| {
                    SyncdownError::InvalidConfig(format!("{ENV_OVERTIME_FLOOR}={v:?}: {e}"))
                })
            })
            .transpose()?;

        Self::from_raw(RawConfig {
            storage_key: lookup(ENV_STORAGE_KEY),
            default_minutes,
            frame_interval: lookup(ENV_FRAME_INTERVAL),
            overtime_floor_secs,
        })
    }

    fn from_raw(raw: RawConfig) -> SyncdownResult<Self> {
        let mut config = ContextConfig::default();
        if let Some(key) = raw.storage_key {
            config.storage_key = key;
        }
        if let Some(minutes) = raw.default_minutes {
            config.default_minutes = minutes;
        }
        if let Some(interval) = raw.frame_interval {
            config.countdown.frame_interval = parse_interval(&interval)?;
        }
        if let Some(floor) = raw.overtime_floor_secs {
            config.countdown.overtime_floor_secs = floor;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the runtime relies on
    pub fn validate(&self) -> SyncdownResult<()> {
        if self.storage_key.trim().is_empty() {
            return Err(SyncdownError::InvalidConfig("storage key is empty".into()));
        }
        if !(MIN_CONFIGURED_MINUTES..=MAX_CONFIGURED_MINUTES).contains(&self.default_minutes) {
            return Err(SyncdownError::InvalidConfig(format!(
                "default minutes {} outside {}..={}",
                self.default_minutes, MIN_CONFIGURED_MINUTES, MAX_CONFIGURED_MINUTES
            )));
        }
        if self.countdown.frame_interval.is_zero() {
            return Err(SyncdownError::InvalidConfig("frame interval must be non-zero".into()));
        }
        if self.countdown.overtime_floor_secs > 0 {
            return Err(SyncdownError::InvalidConfig(format!(
                "overtime floor {} must not be positive",
                self.countdown.overtime_floor_secs
            )));
        }
        Ok(())
    }

    /// Envelope a fresh session starts from
    pub fn defaults_envelope(&self, now: WallTime) -> TimerEnvelope {
        TimerEnvelope::idle(self.default_minutes, now)
    }
}

fn parse_interval(raw: &str) -> SyncdownResult<Duration> {
    humantime::parse_duration(raw.trim())
        .map_err(|e| SyncdownError::InvalidConfig(format!("frame interval {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ContextConfig::default();
        assert_eq!(config.storage_key, "timer-app-state-v2");
        assert_eq!(config.default_minutes, 5);
        assert!(config.validate().is_ok());
        assert_eq!(config.defaults_envelope(WallTime::ZERO).remaining_secs(), 300);
    }

    #[test]
    fn test_from_json() {
        let config = ContextConfig::from_json(
            r#"{"storage_key":"kitchen-timer","default_minutes":12,"frame_interval":"250ms"}"#,
        )
        .unwrap();
        assert_eq!(config.storage_key, "kitchen-timer");
        assert_eq!(config.default_minutes, 12);
        assert_eq!(config.countdown.frame_interval, Duration::from_millis(250));
        assert_eq!(config.countdown.overtime_floor_secs, -3600);

        assert_eq!(ContextConfig::from_json("{}").unwrap(), ContextConfig::default());
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        for raw in [
            r#"{"storage_key":""}"#,
            r#"{"default_minutes":0}"#,
            r#"{"frame_interval":"soon"}"#,
            r#"{"frame_interval":"0s"}"#,
            r#"{"overtime_floor_secs":10}"#,
            r#"{"storag_key":"typo"}"#,
            "nope",
        ] {
            assert!(
                matches!(ContextConfig::from_json(raw), Err(SyncdownError::InvalidConfig(_))),
                "accepted {raw}"
            );
        }
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_STORAGE_KEY, "hall-b"),
            (ENV_DEFAULT_MINUTES, " 20 "),
            (ENV_FRAME_INTERVAL, "1s"),
            (ENV_OVERTIME_FLOOR, "-600"),
        ]
        .into_iter()
        .collect();
        let config = ContextConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.storage_key, "hall-b");
        assert_eq!(config.default_minutes, 20);
        assert_eq!(config.countdown, CountdownConfig { frame_interval: Duration::from_secs(1), overtime_floor_secs: -600 });

        let bad = ContextConfig::from_lookup(|k| (k == ENV_DEFAULT_MINUTES).then(|| "ten".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var(ENV_STORAGE_KEY, "env-timer");
        std::env::remove_var(ENV_DEFAULT_MINUTES);
        std::env::remove_var(ENV_FRAME_INTERVAL);
        std::env::remove_var(ENV_OVERTIME_FLOOR);

        let config = ContextConfig::from_env().unwrap();
        assert_eq!(config.storage_key, "env-timer");
        assert_eq!(config.default_minutes, DEFAULT_CONFIGURED_MINUTES);

        std::env::remove_var(ENV_STORAGE_KEY);
    }
}
