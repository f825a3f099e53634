use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    Toml(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Background-lane errors
#[derive(Error, Debug, Clone)]
pub enum LaneError {
    #[error("Simulation panicked: {0}")]
    Panicked(String),
    #[error("Simulation failed: {0}")]
    Failed(String),
    #[error("Lane task failed to join: {0}")]
    Join(String),
    #[error("Event channel closed before a terminal message")]
    ChannelClosed,
}

/// Main crate error type.
///
/// Sanitization failures, budget/constraint violations, no-candidate exhaustion and
/// degenerate statistical input are never errors: they are encoded in return values.
#[derive(Error, Debug, Clone)]
pub enum ForecastError {
    /// Simulation settings outside the enumerated sets
    #[error("Invalid simulation settings: {0}")]
    InvalidSettings(String),

    /// Malformed caller input (empty history, unknown metric, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Config file problems
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(String),

    /// JSON encode/decode errors
    #[error("Json error: {0}")]
    Json(String),

    /// Background lane failures (never used for cancellation)
    #[error("Lane error: {0}")]
    Lane(#[from] LaneError),
}

impl ForecastError {
    /// Create an invalid-settings error
    pub fn invalid_settings(msg: impl Into<String>) -> Self {
        ForecastError::InvalidSettings(msg.into())
    }

    /// Create an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ForecastError::InvalidInput(msg.into())
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(e: std::io::Error) -> Self {
        ForecastError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(e: serde_json::Error) -> Self {
        ForecastError::Json(e.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(e: toml::de::Error) -> Self {
        ForecastError::Config(ConfigError::Toml(e.to_string()))
    }
}
