//! Grid-specific error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in grid trading operations
#[derive(Error, Debug, Clone)]
pub enum GridError {
    #[error("Invalid value for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Invalid grid range: {0}")]
    InvalidRange(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Reconciliation cycle failed: {0}")]
    Cycle(String),

    #[error("Bot is already running")]
    AlreadyRunning,

    #[error("Bot not configured. Please configure first.")]
    NotConfigured,

    #[error("Bot is not running")]
    NotRunning,

    #[error("Exchange error: {0}")]
    Exchange(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Coarse classification of [`GridError`] used by the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing configuration; nothing changed
    Validation,
    /// Exchange unreachable or credentials rejected
    Connection,
    /// Grid could not be seeded
    Initialization,
    /// One reconciliation pass failed; the loop keeps going
    Cycle,
    /// Operation not allowed in the current lifecycle state
    Lifecycle,
    /// Anything else (exchange rejects, timeouts, storage)
    Internal,
}

impl GridError {
    /// Build a validation error for a single field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        GridError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GridError::Validation { .. } | GridError::InvalidRange(_) => ErrorKind::Validation,
            GridError::Connection(_) => ErrorKind::Connection,
            GridError::Initialization(_) => ErrorKind::Initialization,
            GridError::Cycle(_) => ErrorKind::Cycle,
            GridError::AlreadyRunning | GridError::NotConfigured | GridError::NotRunning => {
                ErrorKind::Lifecycle
            }
            GridError::Exchange(_)
            | GridError::Timeout(_)
            | GridError::Persistence(_)
            | GridError::JsonParse(_)
            | GridError::Http(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::JsonParse(err.to_string())
    }
}

impl From<std::io::Error> for GridError {
    fn from(err: std::io::Error) -> Self {
        GridError::Persistence(err.to_string())
    }
}

impl From<reqwest::Error> for GridError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GridError::Http(format!("request timed out: {}", err))
        } else if err.is_connect() {
            GridError::Connection(err.to_string())
        } else {
            GridError::Http(err.to_string())
        }
    }
}

/// Result type for grid operations
pub type GridResult<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(GridError::validation("grid_levels", "x").kind(), ErrorKind::Validation);
        assert_eq!(GridError::AlreadyRunning.kind(), ErrorKind::Lifecycle);
        assert_eq!(GridError::NotRunning.kind(), ErrorKind::Lifecycle);
        assert_eq!(GridError::NotConfigured.kind(), ErrorKind::Lifecycle);
        assert_eq!(GridError::Timeout(10).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = GridError::validation("order_amount", "must be greater than 0");
        assert_eq!(err.to_string(), "Invalid value for order_amount: must be greater than 0");
    }
}
