//! Engine configuration
//!
//! Loaded from a JSON file, then overridden by `SECOPS_*` environment
//! variables. Values only matter at initialization time except
//! `journal_enabled`; an opened instance keeps the settings it was
//! created with.

use chrono::Duration;
use secops_core::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Longest accepted time lock period (100 years)
pub const MAX_TIME_LOCK_PERIOD_SECS: u64 = 3_155_760_000;

/// Delay for a time lock period, `None` outside `1..=MAX_TIME_LOCK_PERIOD_SECS`
pub fn time_lock_delay(secs: u64) -> Option<Duration> {
    if secs == 0 || secs > MAX_TIME_LOCK_PERIOD_SECS {
        return None;
    }
    Duration::try_seconds(i64::try_from(secs).ok()?)
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay between request and earliest delayed approval
    #[serde(default = "default_time_lock_period_secs")]
    pub time_lock_period_secs: u64,

    /// Chain context signatures must be bound to
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Handler address of this instance
    #[serde(default = "default_instance_address")]
    pub instance_address: Address,

    /// Append notifications to the JSONL journal
    #[serde(default = "default_journal_enabled")]
    pub journal_enabled: bool,
}

fn default_time_lock_period_secs() -> u64 {
    86_400 // 1 day
}

fn default_chain_id() -> u64 {
    1
}

fn default_instance_address() -> Address {
    Address::from_low_u64(0x5ec0)
}

fn default_journal_enabled() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_lock_period_secs: default_time_lock_period_secs(),
            chain_id: default_chain_id(),
            instance_address: default_instance_address(),
            journal_enabled: default_journal_enabled(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply `SECOPS_*` overrides from the process environment
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("SECOPS_TIME_LOCK_PERIOD_SECS") {
            self.time_lock_period_secs = parse_env("SECOPS_TIME_LOCK_PERIOD_SECS", value)?;
        }
        if let Some(value) = lookup("SECOPS_CHAIN_ID") {
            self.chain_id = parse_env("SECOPS_CHAIN_ID", value)?;
        }
        if let Some(value) = lookup("SECOPS_INSTANCE_ADDRESS") {
            self.instance_address = parse_env("SECOPS_INSTANCE_ADDRESS", value)?;
        }
        if let Some(value) = lookup("SECOPS_JOURNAL_ENABLED") {
            self.journal_enabled = parse_env("SECOPS_JOURNAL_ENABLED", value)?;
        }
        Ok(self)
    }

    /// Configured delay, `None` when the period is out of range
    pub fn time_lock(&self) -> Option<Duration> {
        time_lock_delay(self.time_lock_period_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.time_lock_period_secs, 86_400);
        assert_eq!(config.chain_id, 1);
        assert!(config.journal_enabled);
        assert!(!config.instance_address.is_zero());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"chain_id": 5}"#).unwrap();
        assert_eq!(config.chain_id, 5);
        assert_eq!(config.time_lock_period_secs, 86_400);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("SECOPS_TIME_LOCK_PERIOD_SECS", "60"),
            ("SECOPS_INSTANCE_ADDRESS", "0x00000000000000000000000000000000000000aa"),
            ("SECOPS_JOURNAL_ENABLED", "false"),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.time_lock_period_secs, 60);
        assert_eq!(config.instance_address, Address::from_low_u64(0xaa));
        assert!(!config.journal_enabled);
        assert_eq!(config.chain_id, 1);
    }

    #[test]
    fn test_bad_override_rejected() {
        let result = EngineConfig::default().apply_overrides(|key| {
            (key == "SECOPS_CHAIN_ID").then(|| "mainnet".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { key: "SECOPS_CHAIN_ID", .. })
        ));
    }

    #[test]
    fn test_time_lock_bounds() {
        assert_eq!(time_lock_delay(0), None);
        assert_eq!(time_lock_delay(1), Some(Duration::seconds(1)));
        assert_eq!(
            time_lock_delay(MAX_TIME_LOCK_PERIOD_SECS),
            Some(Duration::seconds(MAX_TIME_LOCK_PERIOD_SECS as i64))
        );
        assert_eq!(time_lock_delay(MAX_TIME_LOCK_PERIOD_SECS + 1), None);
        assert_eq!(time_lock_delay(i64::MAX as u64), None);
        assert_eq!(time_lock_delay(u64::MAX), None);

        let config = EngineConfig {
            time_lock_period_secs: u64::MAX,
            ..EngineConfig::default()
        };
        assert_eq!(config.time_lock(), None);
        assert_eq!(EngineConfig::default().time_lock(), Some(Duration::days(1)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"time_lock_period_secs": 120, "journal_enabled": false}"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.time_lock_period_secs, 120);
        assert!(!config.journal_enabled);
    }
}
