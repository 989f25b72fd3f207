//! Error types for the analytics pipeline.
//!
//! Per-item failures (a bad timestamp, one category's forecast) are values the
//! batch operations log and skip. Store and config errors go back to the caller.

use thiserror::Error;

/// A timestamp that could not be reduced to naive UTC.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("epoch value {0} is outside the representable datetime range")]
    OutOfRange(f64),

    #[error("unparseable timestamp string: {0:?}")]
    Unparseable(String),

    #[error("unsupported timestamp type: {0}")]
    UnsupportedType(&'static str),
}

/// Why a single category's forecast is unavailable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("series has {len} observations, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("optimizer did not converge after {0} iterations")]
    NonConvergence(usize),

    #[error("model produced a non-finite value")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[cfg(feature = "store")]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document is missing a string record_id")]
    MissingRecordId,

    #[error("document is not a JSON object")]
    NotAnObject,
}
