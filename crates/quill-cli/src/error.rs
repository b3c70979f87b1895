use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quill_core::Error),
    #[error(transparent)]
    Store(#[from] quill_core::store::StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No entry content provided")]
    EmptyContent,
    #[error("Edited entry content cannot be empty")]
    EmptyEditedContent,
    #[error("Entry ID cannot be empty")]
    EmptyEntryId,
    #[error("Entry not found for id/prefix: {0}")]
    EntryNotFound(String),
    #[error("{0}")]
    AmbiguousEntryId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
}
