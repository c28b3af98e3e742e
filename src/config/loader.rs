// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{DEFAULT_INTERVAL_MS, DEFAULT_LOG_LEVEL};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the runtime.
///
/// Holds the interval scheduler settings and the logging setup. It is
/// typically loaded from a YAML file; TOML is accepted by extension.
///
/// # Fields
/// * `scheduler` - Interval and concurrency cap for the interval scheduler
/// * `logging` - Tracing filter and formatting options (optional)
///
/// # Example
/// ```yaml
/// scheduler:
///   interval_ms: 100
///   max_instances: 2
/// logging:
///   level: debug
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerOptions,
    #[serde(default)]
    pub logging: LoggingOptions,
}

/// Interval scheduler options.
///
/// # Fields
/// * `interval_ms` - Minimum time between invocation starts (defaults to 1000)
/// * `max_instances` - Cap on concurrently in-flight invocations; unbounded if omitted
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SchedulerOptions {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub max_instances: Option<usize>,
}

impl SchedulerOptions {
    /// The configured interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            max_instances: None,
        }
    }
}

/// Logging options consumed by [`crate::observability::init_tracing`].
///
/// # Fields
/// * `level` - `EnvFilter` directive used when `RUST_LOG` is unset (defaults to "info")
/// * `show_target` - Whether to print the event target module
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingOptions {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            show_target: false,
        }
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Load a config from a YAML or TOML file, chosen by extension.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
        Some("toml") => Ok(toml::from_str(&content)?),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Load a config and reject values the runtime cannot use.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Check the scheduler options of an already-parsed config.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.scheduler.interval_ms == 0 {
        return Err(ConfigError::Invalid {
            field: "scheduler.interval_ms",
            reason: "must be greater than zero".to_string(),
        });
    }
    if cfg.scheduler.max_instances == Some(0) {
        return Err(ConfigError::Invalid {
            field: "scheduler.max_instances",
            reason: "must be at least 1 when set (omit it for unbounded)".to_string(),
        });
    }
    Ok(())
}
