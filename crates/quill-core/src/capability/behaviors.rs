//! One behavior per entry operation
//!
//! These wrap [`EntryStore`] and hand themselves back unchanged as their
//! successor.

use async_trait::async_trait;

use super::Behavior;
use crate::error::Result;
use crate::models::{Entry, EntryId};
use crate::ops::{EditOutcome, EntryStore};
use crate::queries::{ListOptions, TagCount, TimeBucket};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddMessage {
    pub content: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditMessage {
    pub id: EntryId,
    pub content: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListByTagMessage {
    pub tag: String,
    pub options: ListOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveCountsMessage {
    /// Number of leading archive key parts to group on, 1-6
    pub group_level: usize,
}

/// Creates entries
#[derive(Clone)]
pub struct AddEntry {
    entries: EntryStore,
}

impl AddEntry {
    #[must_use]
    pub const fn new(entries: EntryStore) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl Behavior for AddEntry {
    type Message = AddMessage;
    type Reply = Result<Entry>;

    async fn receive(self, message: AddMessage) -> (Self::Reply, Self) {
        let reply = self.entries.create(&message.content, &message.tags).await;
        (reply, self)
    }
}

/// Edits entries
#[derive(Clone)]
pub struct EditEntry {
    entries: EntryStore,
}

impl EditEntry {
    #[must_use]
    pub const fn new(entries: EntryStore) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl Behavior for EditEntry {
    type Message = EditMessage;
    type Reply = Result<EditOutcome>;

    async fn receive(self, message: EditMessage) -> (Self::Reply, Self) {
        let reply = self
            .entries
            .update(message.id, &message.content, &message.tags)
            .await;
        (reply, self)
    }
}

/// Deletes entries
#[derive(Clone)]
pub struct RemoveEntry {
    entries: EntryStore,
}

impl RemoveEntry {
    #[must_use]
    pub const fn new(entries: EntryStore) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl Behavior for RemoveEntry {
    type Message = EntryId;
    type Reply = Result<()>;

    async fn receive(self, id: EntryId) -> (Self::Reply, Self) {
        let reply = self.entries.delete(id).await;
        (reply, self)
    }
}

/// Lists entries by creation time
#[derive(Clone)]
pub struct ListRecent {
    entries: EntryStore,
}

impl ListRecent {
    #[must_use]
    pub const fn new(entries: EntryStore) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl Behavior for ListRecent {
    type Message = ListOptions;
    type Reply = Result<Vec<Entry>>;

    async fn receive(self, options: ListOptions) -> (Self::Reply, Self) {
        let reply = self.entries.list_by_time(options).await;
        (reply, self)
    }
}

/// Lists entries carrying one tag
#[derive(Clone)]
pub struct ListByTag {
    entries: EntryStore,
}

impl ListByTag {
    #[must_use]
    pub const fn new(entries: EntryStore) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl Behavior for ListByTag {
    type Message = ListByTagMessage;
    type Reply = Result<Vec<Entry>>;

    async fn receive(self, message: ListByTagMessage) -> (Self::Reply, Self) {
        let reply = self.entries.list_by_tag(&message.tag, message.options).await;
        (reply, self)
    }
}

/// Counts entries per time bucket
#[derive(Clone)]
pub struct ArchiveCounts {
    entries: EntryStore,
}

impl ArchiveCounts {
    #[must_use]
    pub const fn new(entries: EntryStore) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl Behavior for ArchiveCounts {
    type Message = ArchiveCountsMessage;
    type Reply = Result<Vec<TimeBucket>>;

    async fn receive(self, message: ArchiveCountsMessage) -> (Self::Reply, Self) {
        let reply = self.entries.count_by_time_group(message.group_level).await;
        (reply, self)
    }
}

/// Counts entries per tag
#[derive(Clone)]
pub struct TagCounts {
    entries: EntryStore,
}

impl TagCounts {
    #[must_use]
    pub const fn new(entries: EntryStore) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl Behavior for TagCounts {
    type Message = ();
    type Reply = Result<Vec<TagCount>>;

    async fn receive(self, _message: ()) -> (Self::Reply, Self) {
        let reply = self.entries.count_by_tag_group().await;
        (reply, self)
    }
}
