//! Core error types for oryxa-autopilot.
//!
//! This module defines the error hierarchy using thiserror. Per-item
//! autopilot failures are modelled by [`AutopilotError`] so the engine can
//! decide whether to skip, defer or report an item without aborting a batch.

use std::path::PathBuf;
use thiserror::Error;

use crate::conflict::ConflictStatus;
use crate::prayer::PrayerName;

/// Core error type for oryxa-autopilot.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Autopilot pipeline errors
    #[error("Autopilot error: {0}")]
    Autopilot(#[from] AutopilotError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Errors raised while detecting, deciding or reverting conflicts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutopilotError {
    /// No clock time stored for this prayer on this date
    #[error("No {prayer} time recorded for {date}")]
    MissingPrayerTime {
        prayer: PrayerName,
        date: chrono::NaiveDate,
    },

    /// Clock time could not be parsed as HH:MM
    #[error("Invalid {prayer} time '{value}'")]
    InvalidPrayerTime { prayer: PrayerName, value: String },

    /// Conflict references an event that no longer exists
    #[error("Event {0} not found")]
    EventNotFound(String),

    /// Event changed underneath us; the write was not applied
    #[error("Event {event_id} changed concurrently (expected version {expected_version})")]
    StaleEvent {
        event_id: String,
        expected_version: i64,
    },

    #[error("Conflict {0} not found")]
    ConflictNotFound(String),

    /// Conflict carries no stored patch of the requested kind
    #[error("Conflict {conflict_id} has no {kind} patch")]
    MissingPatch {
        conflict_id: String,
        kind: &'static str,
    },

    /// Undo token is unknown or belongs to another conflict/owner
    #[error("Undo token not found")]
    TokenNotFound,

    /// Undo token was already consumed
    #[error("Undo token already used")]
    TokenAlreadyUsed,

    /// Conflict state machine rejected a transition
    #[error("Invalid conflict transition {from} -> {to}")]
    InvalidTransition {
        from: ConflictStatus,
        to: ConflictStatus,
    },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be greater than start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl CoreError {
    /// The autopilot error carried by this error, if any.
    pub fn autopilot(&self) -> Option<&AutopilotError> {
        match self {
            CoreError::Autopilot(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
