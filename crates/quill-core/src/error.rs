//! Error types for quill-core

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using quill-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quill-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Entry not found (never existed or already deleted)
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Conditional write kept losing to concurrent writers
    #[error("Write conflict on {id} after {attempts} attempt(s)")]
    WriteConflict { id: String, attempts: u32 },

    /// Store transport or infrastructure failure
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The capability's mailbox is closed
    #[error("Capability unavailable: {0}")]
    CapabilityClosed(String),
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict(id) => Self::WriteConflict { id, attempts: 1 },
            StoreError::Unavailable(message) => Self::StoreUnavailable(message),
            StoreError::Serialization(error) => Self::Serialization(error),
        }
    }
}
