//! Structured logging setup.
//!
//! Stdout output in one of three formats, plus an optional daily-rolling JSON
//! file written through a non-blocking worker.
//!
//! # Component Targets
//!
//! | Target | Description |
//! |--------|-------------|
//! | `lifecast::forecast::influence` | Matrix resolution and propagation |
//! | `lifecast::forecast::simulation` | Monte Carlo runs and the background lane |
//! | `lifecast::forecast::policy` | Rollouts, ranking and audit persistence |
//!
//! ```bash
//! # Debug only the policy evaluator
//! RUST_LOG=warn,lifecast::forecast::policy=debug lifecast decide --input state.json
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::errors::ConfigError;
use crate::prelude::Result;

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON format
    Json,
    /// Compact single-line format
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,

    #[serde(default)]
    pub stdout_format: LogFormat,

    /// Write a daily-rolling JSON file under `log_dir`
    #[serde(default)]
    pub enable_file: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Level for the file stream (DEBUG+ by default)
    #[serde(default = "default_file_level")]
    pub file_level: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_enable_stdout() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_file_prefix() -> String {
    "lifecast.log".to_string()
}

fn default_file_level() -> String {
    "debug".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            enable_stdout: default_enable_stdout(),
            stdout_format: LogFormat::default(),
            enable_file: false,
            log_dir: default_log_dir(),
            file_prefix: default_file_prefix(),
            file_level: default_file_level(),
        }
    }
}

impl LogConfig {
    /// Pretty stdout, no files.
    pub fn development() -> Self {
        Self::default()
    }

    /// JSON stdout plus a rolling file under `log_dir`.
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            log_dir,
            enable_file: true,
            stdout_format: LogFormat::Json,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, filter) in [("level", &self.level), ("file_level", &self.file_level)] {
            if EnvFilter::try_new(filter).is_err() {
                return Err(format!("logging.{name} is not a valid filter: {filter:?}"));
            }
        }
        if self.enable_file && self.file_prefix.trim().is_empty() {
            return Err("logging.file_prefix must not be empty".to_string());
        }
        Ok(())
    }
}

fn invalid(e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid(format!("logging: {e}"))
}

/// Install the global subscriber.
///
/// The returned guards flush the file writer on drop and must outlive every
/// log call. Installing twice in one process is an error.
pub fn init_logging(config: &LogConfig, env_filter_override: Option<&str>) -> Result<Vec<WorkerGuard>> {
    let mut guards = Vec::new();

    let base_filter = match env_filter_override {
        Some(filter) => EnvFilter::try_new(filter).map_err(invalid)?,
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&config.level).map_err(invalid)?,
        },
    };

    let file_layer = if config.enable_file {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, &config.file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        let file_filter = EnvFilter::try_new(&config.file_level).map_err(invalid)?;
        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .json()
                .with_filter(file_filter),
        )
    } else {
        None
    };

    let registry = tracing_subscriber::registry().with(file_layer);
    let installed = if !config.enable_stdout {
        registry.try_init()
    } else {
        match config.stdout_format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_filter(base_filter))
                .try_init(),
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_filter(base_filter))
                .try_init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().with_target(false).with_filter(base_filter))
                .try_init(),
        }
    };
    installed.map_err(invalid)?;

    if config.enable_file {
        eprintln!("File logging enabled: {}", config.log_dir.display());
    }
    Ok(guards)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert!(!config.enable_file);
        assert!(config.enable_stdout);
        assert_eq!(config.stdout_format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_config_production() {
        let config = LogConfig::production(PathBuf::from("/var/log/lifecast"));
        assert!(config.enable_file);
        assert_eq!(config.stdout_format, LogFormat::Json);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/lifecast"));
    }

    #[test]
    fn test_log_config_rejects_bad_filter() {
        let config = LogConfig {
            level: "lifecast=verbose".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_serde() {
        let json = serde_json::to_string(&LogFormat::Json).unwrap();
        assert_eq!(json, "\"json\"");

        let parsed: LogFormat = serde_json::from_str("\"compact\"").unwrap();
        assert_eq!(parsed, LogFormat::Compact);
    }
}
