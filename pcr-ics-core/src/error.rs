//! Error types for the calendar core.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while building, reconciling or encoding a calendar.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Current time is unavailable: {0}")]
    ClockUnavailable(String),

    #[error("Clock skew: now ({now}) is earlier than recorded timestamp {recorded} of event {uid}")]
    ClockSkew {
        uid: String,
        now: DateTime<Utc>,
        recorded: DateTime<Utc>,
    },

    #[error("Invalid time '{value}': {reason}")]
    InvalidTime { value: String, reason: String },

    #[error("SEQUENCE {sequence} cannot be incremented further")]
    SequenceOverflow { sequence: u32 },

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
