//! Conflict-resistant entry operations
//!
//! Every write is a single whole-document conditional put. When the store
//! rejects a write because another writer got there first, the entry is
//! re-fetched and the write is retried against the fresh revision, up to
//! [`RetryPolicy::max_attempts`] writes.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{validate_entry_input, Entry, EntryDraft, EntryId};
use crate::store::{DocumentStore, StoreError};
use crate::util::now_millis;

/// Default number of conditional writes attempted before giving up
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;

/// Bound on conditional write attempts per operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Policy allowing `max_attempts` writes (at least one)
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WRITE_ATTEMPTS)
    }
}

/// Result of [`EntryStore::update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// A new version was written
    Updated(Entry),
    /// The stored entry already had the requested fields; nothing was written
    Unchanged(Entry),
}

impl EditOutcome {
    #[must_use]
    pub fn entry(&self) -> &Entry {
        match self {
            Self::Updated(entry) | Self::Unchanged(entry) => entry,
        }
    }

    #[must_use]
    pub fn into_entry(self) -> Entry {
        match self {
            Self::Updated(entry) | Self::Unchanged(entry) => entry,
        }
    }

    #[must_use]
    pub const fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

/// Entry operations over a shared document store
#[derive(Clone)]
pub struct EntryStore {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl EntryStore {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Underlying document store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Fetch a live entry
    pub async fn get(&self, id: EntryId) -> Result<Entry> {
        self.fetch(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.as_str()))
    }

    /// Fetch a live entry, `None` if it is absent or deleted
    async fn fetch(&self, id: EntryId) -> Result<Option<Entry>> {
        match self.store.get(&id.as_str()).await {
            Ok(document) => Entry::from_document(&document).map(Some),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Create a new entry stamped with the current time
    pub async fn create(&self, content: &str, tags: &[String]) -> Result<Entry> {
        validate_entry_input(content, tags)?;

        let draft = EntryDraft::new(content, tags, now_millis());
        let revision = self
            .store
            .put(&draft.id.as_str(), draft.body()?, None)
            .await?;

        tracing::debug!(id = %draft.id, revision = %revision, "Created entry");
        Ok(draft.committed(revision))
    }

    /// Replace an entry's content and tags.
    ///
    /// Identical fields are a no-op. On a revision conflict the entry is
    /// re-fetched and compared against the requested fields again; if a
    /// concurrent writer already stored them the call returns
    /// [`EditOutcome::Unchanged`].
    pub async fn update(&self, id: EntryId, content: &str, tags: &[String]) -> Result<EditOutcome> {
        validate_entry_input(content, tags)?;

        let key = id.as_str();
        let mut current = self.get(id).await?;
        let mut attempts = 0;

        loop {
            if current.has_fields(content, tags) {
                tracing::debug!(id = %id, attempts, "Edit already applied");
                return Ok(EditOutcome::Unchanged(current));
            }
            if attempts >= self.retry.max_attempts {
                tracing::warn!(id = %id, attempts, "Giving up on contended edit");
                return Err(Error::WriteConflict { id: key, attempts });
            }
            attempts += 1;

            let draft = current.revised(content, tags, now_millis());
            match self
                .store
                .put(&key, draft.body()?, Some(&current.revision))
                .await
            {
                Ok(revision) => {
                    tracing::debug!(id = %id, revision = %revision, attempts, "Updated entry");
                    return Ok(EditOutcome::Updated(draft.committed(revision)));
                }
                Err(StoreError::Conflict(_)) => {
                    tracing::warn!(id = %id, attempt = attempts, "Edit lost a revision race, retrying");
                    current = self.get(id).await?;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Delete an entry. Deleting an absent entry succeeds.
    pub async fn delete(&self, id: EntryId) -> Result<()> {
        let key = id.as_str();
        let Some(mut current) = self.fetch(id).await? else {
            tracing::debug!(id = %id, "Delete of absent entry");
            return Ok(());
        };
        let mut attempts = 0;

        loop {
            if attempts >= self.retry.max_attempts {
                tracing::warn!(id = %id, attempts, "Giving up on contended delete");
                return Err(Error::WriteConflict { id: key, attempts });
            }
            attempts += 1;

            match self.store.delete(&key, &current.revision).await {
                Ok(revision) => {
                    tracing::debug!(id = %id, revision = %revision, "Deleted entry");
                    return Ok(());
                }
                Err(StoreError::NotFound(_)) => return Ok(()),
                Err(StoreError::Conflict(_)) => {
                    tracing::warn!(id = %id, attempt = attempts, "Delete lost a revision race, retrying");
                    match self.fetch(id).await? {
                        Some(fresh) => current = fresh,
                        None => return Ok(()),
                    }
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}
