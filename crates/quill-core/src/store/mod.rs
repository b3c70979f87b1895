//! Document store adapters
//!
//! A store is a key-addressed collection of JSON documents with revision
//! tokens, conditional writes, derived views and a change feed. The core
//! never locks the store; concurrent writers are reconciled through
//! [`DocumentStore::put`] and [`DocumentStore::delete`] rejecting stale
//! revisions.

mod feed;
mod memory;
mod migrations;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Document, Revision};
use crate::views::{QueryOptions, ViewName, ViewRow};

pub use feed::{Change, ChangeFeed, ChangeStream, ChangesOptions, Since};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Result type alias for store adapters
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by a document store
#[derive(Error, Debug)]
pub enum StoreError {
    /// No live document under this id
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The expected revision is not the current one
    #[error("Revision conflict on {0}")]
    Conflict(String),

    /// Transport or storage failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored body could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// Async interface every store engine exposes to the core
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the live document under `id`
    async fn get(&self, id: &str) -> StoreResult<Document>;

    /// Write a whole document.
    ///
    /// `expected = None` creates the document and conflicts if the id was
    /// ever used. `Some(revision)` replaces the live document only if its
    /// revision still matches.
    async fn put(
        &self,
        id: &str,
        body: serde_json::Value,
        expected: Option<&Revision>,
    ) -> StoreResult<Revision>;

    /// Delete the live document if its revision still matches.
    ///
    /// Returns the tombstone revision, `NotFound` if there is no live
    /// document.
    async fn delete(&self, id: &str, expected: &Revision) -> StoreResult<Revision>;

    /// Query a derived view
    async fn query(&self, view: ViewName, options: QueryOptions) -> StoreResult<Vec<ViewRow>>;

    /// Open a change stream
    async fn changes(&self, options: ChangesOptions) -> StoreResult<ChangeStream>;
}

/// Revision check shared by the engines for `put`.
///
/// `current` is the stored revision and tombstone flag, if the id exists.
pub(crate) fn next_put_revision(
    id: &str,
    current: Option<(&Revision, bool)>,
    expected: Option<&Revision>,
) -> StoreResult<Revision> {
    match (current, expected) {
        (None, None) => Ok(Revision::first()),
        (Some((revision, false)), Some(expected)) if revision == expected => Ok(revision.next()),
        _ => Err(StoreError::Conflict(id.to_string())),
    }
}

/// Revision check shared by the engines for `delete`.
pub(crate) fn next_delete_revision(
    id: &str,
    current: Option<(&Revision, bool)>,
    expected: &Revision,
) -> StoreResult<Revision> {
    match current {
        None | Some((_, true)) => Err(StoreError::NotFound(id.to_string())),
        Some((revision, false)) if revision == expected => Ok(revision.next()),
        Some(_) => Err(StoreError::Conflict(id.to_string())),
    }
}
