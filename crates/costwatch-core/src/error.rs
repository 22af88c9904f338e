//! Error types for CostWatch
//!
//! Per-breach dispatch failures have their own type in
//! [`crate::alerting::DispatchError`]; everything here is either fatal to a
//! request or aborts a whole evaluation cycle.

use thiserror::Error;

/// Result type alias using CostWatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the store, configuration and evaluation cycle
#[derive(Error, Debug)]
pub enum Error {
    /// Alert store or cost table query failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Embedded migrations could not be applied
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Missing or malformed settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Alert input rejected before reaching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Cost snapshot that cannot be evaluated
    #[error("Invalid cost snapshot: {0}")]
    InvalidSnapshot(String),

    /// No row with this id
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of row that was looked up
        entity: &'static str,
        /// Id that was looked up
        id: i64,
    },

    /// Unexpected failure outside the store
    #[error("Internal error: {0}")]
    Internal(String),

    /// Socket or file error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Missing alert
    pub fn alert_not_found(id: i64) -> Self {
        Self::NotFound { entity: "Alert", id }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid snapshot error
    pub fn invalid_snapshot(msg: impl Into<String>) -> Self {
        Self::InvalidSnapshot(msg.into())
    }

    /// Whether the caller supplied bad input, as opposed to a server fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidSnapshot(_) | Self::NotFound { .. }
        )
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
