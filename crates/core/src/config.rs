//! Console configuration.
//!
//! Values come from `OCEAN_*` environment variables. Anything missing or
//! unparseable falls back to the default (with a warning), so a console can
//! always start.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ENV_TELEMETRY_CAPACITY: &str = "OCEAN_TELEMETRY_CAPACITY";
pub const ENV_API_HISTORY_CAPACITY: &str = "OCEAN_API_HISTORY_CAPACITY";
pub const ENV_NOTIFICATION_CAPACITY: &str = "OCEAN_NOTIFICATION_CAPACITY";
pub const ENV_REFRESH_INTERVAL_MS: &str = "OCEAN_REFRESH_INTERVAL_MS";
pub const ENV_TOAST_DISMISS_MS: &str = "OCEAN_TOAST_DISMISS_MS";
pub const ENV_STORAGE_PATH: &str = "OCEAN_STORAGE_PATH";

/// Configuration for one console context.
///
/// A capacity of `0` means the store is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub telemetry_capacity: usize,
    pub api_history_capacity: usize,
    pub notification_capacity: usize,
    pub refresh_interval_ms: u64,
    pub toast_dismiss_ms: u64,
    /// Backing file for local storage; in-memory when absent.
    pub storage_path: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            telemetry_capacity: 500,
            api_history_capacity: 100,
            notification_capacity: 50,
            refresh_interval_ms: 30_000,
            toast_dismiss_ms: 5_000,
            storage_path: None,
        }
    }
}

impl ConsoleConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests pass a map instead of the
    /// real environment).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            telemetry_capacity: parse_or(
                &lookup,
                ENV_TELEMETRY_CAPACITY,
                defaults.telemetry_capacity,
            ),
            api_history_capacity: parse_or(
                &lookup,
                ENV_API_HISTORY_CAPACITY,
                defaults.api_history_capacity,
            ),
            notification_capacity: parse_or(
                &lookup,
                ENV_NOTIFICATION_CAPACITY,
                defaults.notification_capacity,
            ),
            refresh_interval_ms: parse_or(
                &lookup,
                ENV_REFRESH_INTERVAL_MS,
                defaults.refresh_interval_ms,
            ),
            toast_dismiss_ms: parse_or(&lookup, ENV_TOAST_DISMISS_MS, defaults.toast_dismiss_ms),
            storage_path: lookup(ENV_STORAGE_PATH)
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn toast_dismiss(&self) -> Duration {
        Duration::from_millis(self.toast_dismiss_ms)
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: core::str::FromStr + Copy + core::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, ?default, "invalid config value; using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = ConsoleConfig::from_lookup(|_| None);
        assert_eq!(cfg, ConsoleConfig::default());
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(30));
    }

    #[test]
    fn values_are_read_from_lookup() {
        let cfg = ConsoleConfig::from_lookup(lookup_from(&[
            (ENV_TELEMETRY_CAPACITY, "10"),
            (ENV_API_HISTORY_CAPACITY, " 0 "),
            (ENV_REFRESH_INTERVAL_MS, "1000"),
            (ENV_STORAGE_PATH, "/tmp/ocean.json"),
        ]));

        assert_eq!(cfg.telemetry_capacity, 10);
        assert_eq!(cfg.api_history_capacity, 0);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(1));
        assert_eq!(cfg.storage_path, Some(PathBuf::from("/tmp/ocean.json")));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let cfg = ConsoleConfig::from_lookup(lookup_from(&[
            (ENV_NOTIFICATION_CAPACITY, "lots"),
            (ENV_TOAST_DISMISS_MS, "-5"),
            (ENV_STORAGE_PATH, "   "),
        ]));

        assert_eq!(cfg.notification_capacity, 50);
        assert_eq!(cfg.toast_dismiss_ms, 5_000);
        assert_eq!(cfg.storage_path, None);
    }

    #[test]
    fn partial_json_config_fills_defaults() {
        let cfg: ConsoleConfig =
            serde_json::from_str(r#"{ "telemetry_capacity": 3 }"#).unwrap();
        assert_eq!(cfg.telemetry_capacity, 3);
        assert_eq!(cfg.api_history_capacity, 100);
    }
}
