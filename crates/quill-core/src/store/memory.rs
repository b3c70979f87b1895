//! In-process document store

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    next_delete_revision, next_put_revision, Change, ChangeFeed, ChangeStream, ChangesOptions,
    DocumentStore, StoreError, StoreResult,
};
use crate::models::{Document, Revision};
use crate::views::{QueryOptions, ViewName, ViewRow, ViewSet};

#[derive(Debug)]
struct Slot {
    revision: Revision,
    deleted: bool,
    body: serde_json::Value,
}

#[derive(Debug, Default)]
struct MemoryInner {
    docs: HashMap<String, Slot>,
    /// Latest change per document, keyed by sequence number
    log: BTreeMap<u64, Change>,
    /// Sequence number of each document's entry in `log`
    latest: HashMap<String, u64>,
    head: u64,
    views: ViewSet,
    feed: ChangeFeed,
}

impl MemoryInner {
    fn current(&self, id: &str) -> Option<(&Revision, bool)> {
        self.docs.get(id).map(|slot| (&slot.revision, slot.deleted))
    }

    fn live_document(&self, id: &str) -> Option<Document> {
        self.docs
            .get(id)
            .filter(|slot| !slot.deleted)
            .map(|slot| Document {
                id: id.to_string(),
                revision: slot.revision.clone(),
                body: slot.body.clone(),
            })
    }

    /// Store the new version, refresh views and notify subscribers as one step
    fn commit(&mut self, id: &str, revision: Revision, deleted: bool, body: serde_json::Value) {
        self.head += 1;
        let document = Document {
            id: id.to_string(),
            revision: revision.clone(),
            body,
        };
        self.views.apply(id, (!deleted).then_some(&document));
        self.docs.insert(
            id.to_string(),
            Slot {
                revision: revision.clone(),
                deleted,
                body: document.body.clone(),
            },
        );

        let change = Change {
            seq: self.head,
            id: id.to_string(),
            revision,
            deleted,
            document: Some(document),
        };
        self.feed.publish(&change);
        if let Some(superseded) = self.latest.insert(id.to_string(), change.seq) {
            self.log.remove(&superseded);
        }
        self.log.insert(change.seq, change);
    }

    /// Changes after `checkpoint`, oldest first
    fn changes_after(&self, checkpoint: u64) -> Vec<Change> {
        self.log
            .range(checkpoint.saturating_add(1)..)
            .map(|(_, change)| change.clone())
            .collect()
    }
}

/// Document store held entirely in memory.
///
/// Every operation runs under one short lock, so each write, its index
/// update and its change notification are a single atomic step. Replay keeps
/// only the latest change per document.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the latest commit
    #[must_use]
    pub fn head(&self) -> u64 {
        self.inner.lock().head
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> StoreResult<Document> {
        self.inner
            .lock()
            .live_document(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn put(
        &self,
        id: &str,
        body: serde_json::Value,
        expected: Option<&Revision>,
    ) -> StoreResult<Revision> {
        let mut inner = self.inner.lock();
        let revision = next_put_revision(id, inner.current(id), expected)?;
        inner.commit(id, revision.clone(), false, body);
        tracing::trace!(id, revision = %revision, "memory store put");
        Ok(revision)
    }

    async fn delete(&self, id: &str, expected: &Revision) -> StoreResult<Revision> {
        let mut inner = self.inner.lock();
        let revision = next_delete_revision(id, inner.current(id), expected)?;
        let last_body = inner
            .docs
            .get(id)
            .map(|slot| slot.body.clone())
            .unwrap_or_default();
        inner.commit(id, revision.clone(), true, last_body);
        tracing::trace!(id, revision = %revision, "memory store delete");
        Ok(revision)
    }

    async fn query(&self, view: ViewName, options: QueryOptions) -> StoreResult<Vec<ViewRow>> {
        let inner = self.inner.lock();
        let index = inner
            .views
            .get(view)
            .ok_or_else(|| StoreError::NotFound(format!("view {view}")))?;

        let mut rows = index.query(&options);
        if options.include_docs && options.group_level.is_none() {
            for row in &mut rows {
                row.doc = row.id.as_deref().and_then(|id| inner.live_document(id));
            }
        }
        Ok(rows)
    }

    async fn changes(&self, options: ChangesOptions) -> StoreResult<ChangeStream> {
        let mut inner = self.inner.lock();
        let checkpoint = options.since.checkpoint(inner.head);
        let backlog = inner.changes_after(checkpoint);
        Ok(inner.feed.open(options, backlog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Since;
    use crate::views::KeyRange;
    use serde_json::json;

    fn entry_body(created_at: i64, tags: &[&str]) -> serde_json::Value {
        json!({"type": "entry", "content": "c", "tags": tags, "createdAt": created_at})
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_and_get() {
        let store = MemoryStore::new();
        let revision = store.put("a", json!({"x": 1}), None).await.unwrap();

        let document = store.get("a").await.unwrap();
        assert_eq!(document.revision, revision);
        assert_eq!(document.body, json!({"x": 1}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stale_put_conflicts() {
        let store = MemoryStore::new();
        let first = store.put("a", json!({"v": 1}), None).await.unwrap();
        store.put("a", json!({"v": 2}), Some(&first)).await.unwrap();

        let stale = store.put("a", json!({"v": 3}), Some(&first)).await;
        assert!(matches!(stale, Err(StoreError::Conflict(_))));
        assert_eq!(store.get("a").await.unwrap().body, json!({"v": 2}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_is_terminal() {
        let store = MemoryStore::new();
        let revision = store.put("a", json!({}), None).await.unwrap();
        let tombstone = store.delete("a", &revision).await.unwrap();
        assert_eq!(tombstone.generation(), 2);

        assert!(matches!(store.get("a").await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.delete("a", &tombstone).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.put("a", json!({}), None).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_views_follow_writes() {
        let store = MemoryStore::new();
        let revision = store.put("a", entry_body(1_000, &["x"]), None).await.unwrap();
        store.put("b", entry_body(2_000, &["y"]), None).await.unwrap();

        let tagged = QueryOptions {
            range: Some(KeyRange::Prefix(vec!["x".into()])),
            include_docs: true,
            ..QueryOptions::default()
        };
        let rows = store.query(ViewName::Tags, tagged.clone()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].doc.as_ref().map(|doc| doc.id.as_str()), Some("a"));

        store.delete("a", &revision).await.unwrap();
        assert!(store.query(ViewName::Tags, tagged).await.unwrap().is_empty());
        assert_eq!(
            store
                .query(ViewName::Archive, QueryOptions::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_changes_replay_and_live() {
        let store = MemoryStore::new();
        let revision = store.put("a", json!({}), None).await.unwrap();

        let mut replay = store
            .changes(ChangesOptions {
                since: Since::Beginning,
                ..ChangesOptions::default()
            })
            .await
            .unwrap();
        let mut live = store.changes(ChangesOptions::default()).await.unwrap();

        store.delete("a", &revision).await.unwrap();

        let first = replay.next().await.unwrap();
        assert_eq!((first.seq, first.deleted), (1, false));
        let second = replay.next().await.unwrap();
        assert_eq!((second.seq, second.deleted), (2, true));

        let only = live.next().await.unwrap();
        assert_eq!(only.seq, 2);
        assert!(only.deleted);
        assert!(only.document.is_some());
        assert!(live.try_next().is_none());
        assert_eq!(store.head(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replay_keeps_latest_change_per_document() {
        let store = MemoryStore::new();
        let mut revision = store.put("a", json!({"v": 0}), None).await.unwrap();
        store.put("b", json!({"v": 0}), None).await.unwrap();
        for v in 1..=100 {
            revision = store.put("a", json!({"v": v}), Some(&revision)).await.unwrap();
        }
        assert_eq!(store.inner.lock().log.len(), 2);

        let mut replay = store
            .changes(ChangesOptions {
                live: false,
                since: Since::Beginning,
                include_docs: true,
            })
            .await
            .unwrap();
        let first = replay.next().await.unwrap();
        assert_eq!((first.seq, first.id.as_str()), (2, "b"));
        let second = replay.next().await.unwrap();
        assert_eq!((second.seq, second.id.as_str()), (102, "a"));
        assert_eq!(second.document.unwrap().body, json!({"v": 100}));
        assert!(replay.next().await.is_none());

        let tombstone = store.delete("a", &revision).await.unwrap();
        let mut after_delete = store
            .changes(ChangesOptions {
                live: false,
                since: Since::Seq(2),
                include_docs: false,
            })
            .await
            .unwrap();
        let only = after_delete.next().await.unwrap();
        assert_eq!((only.seq, only.revision, only.deleted), (103, tombstone, true));
        assert!(after_delete.next().await.is_none());
    }
}
