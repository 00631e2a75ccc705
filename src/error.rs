//! Error types shared across the hub, the store and the HTTP layer.

use std::time::Duration;
use thiserror::Error;

/// A share payload was rejected before any side effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("field `{0}` contains control characters")]
    ControlCharacters(&'static str),

    #[error("coordinate {index} is out of range ({latitude}, {longitude})")]
    CoordinateOutOfRange {
        index: usize,
        latitude: f64,
        longitude: f64,
    },

    #[error("too many coordinates ({count}), at most {max} allowed")]
    TooManyCoordinates { count: usize, max: usize },

    #[error("unknown crowd level `{0}`, expected low, medium or high")]
    UnknownCrowdLevel(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Failure reading from or writing to the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode coordinates: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("stored record {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A write to one observer failed. Never surfaces past the dispatcher.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error("websocket error: {0}")]
    WebSocket(#[from] axum::Error),
}

/// The hub no longer accepts updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("hub is shut down")]
    Closed,
}

/// Outcome of a rejected share.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to persist update: {0}")]
    Persistence(#[source] StoreError),

    #[error("update {id} persisted but not broadcast: {source}")]
    NotBroadcast {
        id: String,
        #[source]
        source: HubError,
    },
}

/// Outcome of a failed active-records query. Retryable.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

/// Invalid process configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}
