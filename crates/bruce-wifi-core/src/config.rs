use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bruce_wifi_wireless::{ToolkitConfig, TransportConfig};

pub const ENV_ROOT: &str = "BRUCE_WIFI_ROOT";
pub const DEFAULT_ROOT_PATH: &str = "/var/lib/bruce-wifi";

/// Engine settings with environment overrides applied
#[derive(Debug, Clone, Default)]
pub struct ToolConfig {
    pub toolkit: ToolkitConfig,
    pub transport: TransportConfig,
}

impl ToolConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let capture = &mut cfg.toolkit.capture;
        if let Some(timeout) = millis(&lookup, "BRUCE_WIFI_CAPTURE_TIMEOUT_MS") {
            capture.timeout = timeout;
        }
        if let Some(poll) = millis(&lookup, "BRUCE_WIFI_POLL_INTERVAL_MS") {
            capture.poll_interval = poll;
        }

        let deauth = &mut cfg.toolkit.deauth;
        if let Some(bursts) = parsed::<u32>(&lookup, "BRUCE_WIFI_DEAUTH_BURSTS") {
            deauth.bursts = bursts;
        }
        if let Some(interval) = millis(&lookup, "BRUCE_WIFI_DEAUTH_INTERVAL_MS") {
            deauth.interval = interval;
        }

        if let Some(depth) = parsed::<usize>(&lookup, "BRUCE_WIFI_QUEUE_DEPTH").filter(|d| *d > 0) {
            cfg.transport.queue_depth = depth;
        }
        cfg
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring {key}={raw:?}: not a number");
            None
        }
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    parsed::<u64>(lookup, key).map(Duration::from_millis)
}

/// `--root`, then `BRUCE_WIFI_ROOT`, then the default install path if it
/// exists, then the working directory.
pub fn resolve_root(input: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = input {
        return Ok(path);
    }
    if let Ok(env_path) = env::var(ENV_ROOT) {
        return Ok(PathBuf::from(env_path));
    }
    let default = PathBuf::from(DEFAULT_ROOT_PATH);
    if default.exists() {
        return Ok(default);
    }
    env::current_dir().context("determining current directory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let cfg = ToolConfig::from_lookup(|_| None);
        assert_eq!(cfg.toolkit.capture.timeout, Duration::from_secs(8));
        assert_eq!(cfg.toolkit.capture.poll_interval, Duration::from_millis(100));
        assert_eq!(cfg.toolkit.deauth.bursts, 10);
        assert_eq!(cfg.toolkit.deauth.interval, Duration::from_millis(300));
        assert_eq!(cfg.transport.queue_depth, 256);
    }

    #[test]
    fn test_overrides() {
        let cfg = ToolConfig::from_lookup(lookup(&[
            ("BRUCE_WIFI_CAPTURE_TIMEOUT_MS", "2500"),
            ("BRUCE_WIFI_DEAUTH_BURSTS", "3"),
            ("BRUCE_WIFI_QUEUE_DEPTH", "16"),
        ]));
        assert_eq!(cfg.toolkit.capture.timeout, Duration::from_millis(2500));
        assert_eq!(cfg.toolkit.deauth.bursts, 3);
        assert_eq!(cfg.transport.queue_depth, 16);
    }

    #[test]
    fn test_bad_values_ignored() {
        let cfg = ToolConfig::from_lookup(lookup(&[
            ("BRUCE_WIFI_POLL_INTERVAL_MS", "fast"),
            ("BRUCE_WIFI_QUEUE_DEPTH", "0"),
        ]));
        assert_eq!(cfg.toolkit.capture.poll_interval, Duration::from_millis(100));
        assert_eq!(cfg.transport.queue_depth, 256);
    }

    #[test]
    fn test_explicit_root_wins() {
        let root = resolve_root(Some(PathBuf::from("/tmp/bw"))).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/bw"));
    }
}
