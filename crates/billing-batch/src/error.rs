//! Error types for the batch engine
//!
//! Parse faults are not errors: readers surface them as
//! [`ReadItem::Fault`](crate::engine::item::ReadItem) and the chunk executor turns
//! them into counted skips. Everything here aborts the step that raised it.

use thiserror::Error;

use crate::engine::parameters::ValidationError;

/// Result type alias for batch operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Error type for job, step and item operations
#[derive(Error, Debug)]
pub enum BatchError {
    /// Run parameters are missing or malformed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Job or step wiring is invalid (e.g. a chunk size of zero)
    #[error("Configuration error: {0}")]
    Config(String),

    /// More parse faults than the step tolerates
    #[error("skip limit exceeded: {skipped} faults with a limit of {limit}")]
    SkipLimitExceeded { skipped: u64, limit: u64 },

    /// The record source failed for a reason other than a parse fault
    #[error("Source failure: {0}")]
    Source(String),

    /// The record sink could not persist a chunk
    #[error("Sink failure: {0}")]
    Sink(String),

    /// A skipped record could not be written to the fault log
    #[error("Fault handler failure: {0}")]
    FaultHandler(String),

    /// The input file could not be staged
    #[error("Staging failure: {0}")]
    Staging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] billing_common::CommonError),
}

impl BatchError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a source failure
    pub fn source_failure(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a sink failure
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Create a fault handler failure
    pub fn fault_handler(msg: impl Into<String>) -> Self {
        Self::FaultHandler(msg.into())
    }

    /// Create a staging failure
    pub fn staging(msg: impl Into<String>) -> Self {
        Self::Staging(msg.into())
    }
}
