use std::path::PathBuf;
use std::time::Duration;

use crate::engine::DEFAULT_STORE_TIMEOUT;

/// Runtime settings, read from `LESSONBOOK_*` environment variables.
/// Unset or unparseable values fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Bound on each store call made by the engine and the query facade.
    pub store_timeout: Duration,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            compact_threshold: 1000,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let data_dir = lookup("LESSONBOOK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let store_timeout = lookup("LESSONBOOK_STORE_TIMEOUT_MS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.store_timeout);
        let compact_threshold = lookup("LESSONBOOK_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.compact_threshold);
        let metrics_port = lookup("LESSONBOOK_METRICS_PORT").and_then(|s| s.parse().ok());

        Self {
            data_dir,
            store_timeout,
            compact_threshold,
            metrics_port,
        }
    }

    /// Location of the store's write-ahead log.
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("lessonbook.wal")
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
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.wal_path(), PathBuf::from("./data/lessonbook.wal"));
    }

    #[test]
    fn reads_all_settings() {
        let config = Config::from_lookup(lookup_from(&[
            ("LESSONBOOK_DATA_DIR", "/var/lib/lessonbook"),
            ("LESSONBOOK_STORE_TIMEOUT_MS", "250"),
            ("LESSONBOOK_COMPACT_THRESHOLD", "42"),
            ("LESSONBOOK_METRICS_PORT", "9100"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/lessonbook"));
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.compact_threshold, 42);
        assert_eq!(config.metrics_port, Some(9100));
    }

    #[test]
    fn unparseable_values_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("LESSONBOOK_STORE_TIMEOUT_MS", "soon"),
            ("LESSONBOOK_COMPACT_THRESHOLD", "-1"),
            ("LESSONBOOK_METRICS_PORT", "99999"),
        ]));
        assert_eq!(config.store_timeout, DEFAULT_STORE_TIMEOUT);
        assert_eq!(config.compact_threshold, 1000);
        assert_eq!(config.metrics_port, None);
    }
}
