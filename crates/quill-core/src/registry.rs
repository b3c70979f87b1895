//! The rights bundle handed to consumers

use std::sync::Arc;

use crate::capability::{
    AddEntry, AddMessage, ArchiveCounts, ArchiveCountsMessage, Capability, EditEntry, EditMessage,
    ListByTag, ListByTagMessage, ListRecent, Listener, RemoveEntry, Subscribe, SubscribeMessage,
    SubscribeOptions, Subscription, TagCounts, Vat,
};
use crate::config::CoreConfig;
use crate::error::Result;
use crate::models::{Entry, EntryId};
use crate::ops::{EditOutcome, EntryStore};
use crate::queries::{ListOptions, TagCount, TimeBucket};
use crate::store::DocumentStore;

/// Every capability a consumer may call, spawned once at startup.
///
/// Cloning shares the same running capabilities.
#[derive(Debug, Clone)]
pub struct Rights {
    pub add: Capability<AddMessage, Result<Entry>>,
    pub edit: Capability<EditMessage, Result<EditOutcome>>,
    pub remove: Capability<EntryId, Result<()>>,
    pub list_recent: Capability<ListOptions, Result<Vec<Entry>>>,
    pub list_by_tag: Capability<ListByTagMessage, Result<Vec<Entry>>>,
    pub archive_counts: Capability<ArchiveCountsMessage, Result<Vec<TimeBucket>>>,
    pub tag_counts: Capability<(), Result<Vec<TagCount>>>,
    pub subscribe: Capability<SubscribeMessage, Result<Subscription>>,
}

impl Rights {
    /// Spawn every capability over `store` on `vat`
    pub fn spawn(vat: &Vat, store: Arc<dyn DocumentStore>, config: &CoreConfig) -> Self {
        let vat = vat.clone().with_mailbox_capacity(config.mailbox_capacity);
        let entries = EntryStore::new(store.clone()).with_retry(config.retry_policy());
        tracing::debug!(
            vat = vat.name(),
            max_write_attempts = config.max_write_attempts,
            "Spawning rights"
        );

        Self {
            add: vat.spawn("add", AddEntry::new(entries.clone())),
            edit: vat.spawn("edit", EditEntry::new(entries.clone())),
            remove: vat.spawn("remove", RemoveEntry::new(entries.clone())),
            list_recent: vat.spawn("list_recent", ListRecent::new(entries.clone())),
            list_by_tag: vat.spawn("list_by_tag", ListByTag::new(entries.clone())),
            archive_counts: vat.spawn("archive_counts", ArchiveCounts::new(entries.clone())),
            tag_counts: vat.spawn("tag_counts", TagCounts::new(entries)),
            subscribe: vat.spawn("subscribe", Subscribe::new(store)),
        }
    }

    pub async fn add(&self, content: &str, tags: &[String]) -> Result<Entry> {
        self.add
            .send(AddMessage {
                content: content.to_string(),
                tags: tags.to_vec(),
            })
            .await?
    }

    pub async fn edit(&self, id: EntryId, content: &str, tags: &[String]) -> Result<EditOutcome> {
        self.edit
            .send(EditMessage {
                id,
                content: content.to_string(),
                tags: tags.to_vec(),
            })
            .await?
    }

    pub async fn remove(&self, id: EntryId) -> Result<()> {
        self.remove.send(id).await?
    }

    pub async fn list_recent(&self, options: ListOptions) -> Result<Vec<Entry>> {
        self.list_recent.send(options).await?
    }

    pub async fn list_by_tag(&self, tag: &str, options: ListOptions) -> Result<Vec<Entry>> {
        self.list_by_tag
            .send(ListByTagMessage {
                tag: tag.to_string(),
                options,
            })
            .await?
    }

    pub async fn archive_counts(&self, group_level: usize) -> Result<Vec<TimeBucket>> {
        self.archive_counts
            .send(ArchiveCountsMessage { group_level })
            .await?
    }

    pub async fn tag_counts(&self) -> Result<Vec<TagCount>> {
        self.tag_counts.send(()).await?
    }

    pub async fn subscribe(&self, options: SubscribeOptions, listener: Listener) -> Result<Subscription> {
        self.subscribe
            .send(SubscribeMessage { options, listener })
            .await?
    }
}
