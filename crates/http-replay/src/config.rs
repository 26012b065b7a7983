// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backpressure::{Backpressure, DEFAULT_COOLDOWN, DEFAULT_HIGH_WATER_MARK};
use crate::error::ConfigError;

/// Settings of a replay run. Every field has a default so a config file only
/// needs to name what it changes.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReplayConfig {
    pub base_url: String,
    pub concurrency: usize,
    pub pacing_interval_ms: u64,
    pub filter_patterns: Vec<String>,
    pub high_water_mark: usize,
    pub cooldown_ms: u64,
    pub request_timeout_ms: Option<u64>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            concurrency: 1,
            pacing_interval_ms: 0,
            filter_patterns: Vec::new(),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            cooldown_ms: DEFAULT_COOLDOWN.as_millis() as u64,
            request_timeout_ms: None,
        }
    }
}

impl ReplayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(self.concurrency));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        Ok(())
    }

    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn backpressure(&self) -> Backpressure {
        Backpressure::new(self.high_water_mark, Duration::from_millis(self.cooldown_ms))
    }
}

/// Load a config file. The base url may be left out and supplied later, so
/// only the fields a file cannot defer are checked here.
pub fn load<P: AsRef<Path>>(path: P) -> Result<ReplayConfig, ConfigError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| ConfigError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;
    let config: ReplayConfig =
        serde_yaml::from_reader(file).map_err(|source| ConfigError::Malformed {
            path: path.display().to_string(),
            source,
        })?;

    if config.concurrency == 0 {
        return Err(ConfigError::InvalidConcurrency(0));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_fields_take_defaults() {
        let file = write_config("base-url: http://staging:8080\nconcurrency: 8\n");
        let config = load(file.path()).unwrap();

        assert_eq!(config.base_url, "http://staging:8080");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.pacing_interval(), Duration::ZERO);
        assert_eq!(config.high_water_mark, 5000);
        assert_eq!(config.cooldown_ms, 2000);
        assert_eq!(config.request_timeout(), None);
        assert!(config.filter_patterns.is_empty());
    }

    #[test]
    fn reads_every_field() {
        let file = write_config(
            r#"
base-url: http://localhost:3000
concurrency: 2
pacing-interval-ms: 250
filter-patterns:
  - "get:/health"
  - ":/metrics"
high-water-mark: 100
cooldown-ms: 500
request-timeout-ms: 1500
"#,
        );
        let config = load(file.path()).unwrap();

        assert_eq!(config.pacing_interval(), Duration::from_millis(250));
        assert_eq!(config.filter_patterns, vec!["get:/health", ":/metrics"]);
        assert_eq!(config.backpressure().high_water_mark(), 100);
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let file = write_config("concurrency: 0\n");
        assert!(matches!(
            load(file.path()),
            Err(ConfigError::InvalidConcurrency(0))
        ));
        assert!(matches!(
            ReplayConfig {
                concurrency: 0,
                ..ReplayConfig::new("http://host")
            }
            .validate(),
            Err(ConfigError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn unreadable_and_malformed_files() {
        assert!(matches!(
            load("/nonexistent/replay.yaml"),
            Err(ConfigError::Unreadable { .. })
        ));
        let file = write_config("concurrency: [1, 2]\n");
        assert!(matches!(
            load(file.path()),
            Err(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn base_url_is_required_to_run() {
        assert!(matches!(
            ReplayConfig::default().validate(),
            Err(ConfigError::MissingBaseUrl)
        ));
        assert!(ReplayConfig::new("http://host").validate().is_ok());
    }
}
