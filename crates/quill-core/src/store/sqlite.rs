//! Durable document store on SQLite

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)] // SQLite stores sequence numbers as i64

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{
    migrations, next_delete_revision, next_put_revision, Change, ChangeFeed, ChangeStream,
    ChangesOptions, DocumentStore, StoreError, StoreResult,
};
use crate::models::{Document, Revision};
use crate::views::{QueryOptions, ViewName, ViewRow, ViewSet};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

struct SqliteInner {
    conn: Connection,
    views: ViewSet,
    feed: ChangeFeed,
    /// Last commit applied to `views` and published to `feed`
    head: u64,
}

impl SqliteInner {
    /// Apply every commit after `head`, ours or another process's, in order
    fn catch_up(&mut self) -> StoreResult<usize> {
        let changes = read_changes_after(&self.conn, self.head)?;
        for change in &changes {
            let live = change.document.as_ref().filter(|_| !change.deleted);
            self.views.apply(&change.id, live);
            self.feed.publish(change);
            self.head = change.seq;
        }
        Ok(changes.len())
    }

    fn rebuild_views(&mut self) -> StoreResult<()> {
        let mut views = ViewSet::standard();
        let mut stmt = self
            .conn
            .prepare("SELECT id, revision, body FROM documents WHERE deleted = 0")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        for (id, revision, body) in rows {
            let document = Document {
                revision: parse_revision(&revision)?,
                body: serde_json::from_str(&body)?,
                id,
            };
            views.apply(&document.id, Some(&document));
        }

        self.head = self.conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM changes",
            [],
            |row| row.get::<_, i64>(0),
        )? as u64;
        self.views = views;
        Ok(())
    }

    fn document(&self, id: &str, include_deleted: bool) -> StoreResult<Option<(Document, bool)>> {
        let row = self
            .conn
            .query_row(
                "SELECT revision, deleted, body FROM documents WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)? != 0,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((revision, deleted, body)) = row else {
            return Ok(None);
        };
        if deleted && !include_deleted {
            return Ok(None);
        }
        let document = Document {
            id: id.to_string(),
            revision: parse_revision(&revision)?,
            body: serde_json::from_str(&body)?,
        };
        Ok(Some((document, deleted)))
    }

    /// Conditionally commit a new version inside one immediate transaction
    fn commit(
        &mut self,
        id: &str,
        decide: impl FnOnce(Option<(&Revision, bool)>) -> StoreResult<Revision>,
        body: Option<serde_json::Value>,
    ) -> StoreResult<Revision> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = tx
            .query_row(
                "SELECT revision, deleted, body FROM documents WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)? != 0,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let current_revision = current
            .as_ref()
            .map(|(revision, _, _)| parse_revision(revision))
            .transpose()?;
        let revision = decide(
            current_revision
                .as_ref()
                .zip(current.as_ref().map(|(_, deleted, _)| *deleted)),
        )?;

        let deleted = body.is_none();
        let body_text = match body {
            Some(body) => serde_json::to_string(&body)?,
            None => current.map(|(_, _, body)| body).unwrap_or_default(),
        };

        tx.execute(
            "INSERT INTO changes (doc_id, revision, deleted, body) VALUES (?1, ?2, ?3, ?4)",
            params![id, revision.as_str(), i64::from(deleted), body_text],
        )?;
        let seq = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO documents (id, revision, seq, deleted, body) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                revision = excluded.revision,
                seq = excluded.seq,
                deleted = excluded.deleted,
                body = excluded.body",
            params![id, revision.as_str(), seq, i64::from(deleted), body_text],
        )?;
        tx.commit()?;

        // The write is durable; views and streams pick it up on the next catch-up
        if let Err(error) = self.catch_up() {
            tracing::warn!(id, %error, "Committed change not yet applied");
        }
        Ok(revision)
    }
}

fn parse_revision(raw: &str) -> StoreResult<Revision> {
    raw.parse().map_err(StoreError::Unavailable)
}

fn read_changes_after(conn: &Connection, seq: u64) -> StoreResult<Vec<Change>> {
    read_changes(
        conn,
        "SELECT seq, doc_id, revision, deleted, body FROM changes WHERE seq > ?1 ORDER BY seq",
        seq,
    )
}

/// Like [`read_changes_after`], keeping only each document's latest change
fn read_latest_changes_after(conn: &Connection, seq: u64) -> StoreResult<Vec<Change>> {
    read_changes(
        conn,
        "SELECT c.seq, c.doc_id, c.revision, c.deleted, c.body
         FROM changes c JOIN documents d ON d.id = c.doc_id AND d.seq = c.seq
         WHERE c.seq > ?1 ORDER BY c.seq",
        seq,
    )
}

fn read_changes(conn: &Connection, sql: &str, seq: u64) -> StoreResult<Vec<Change>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![seq as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)? != 0,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(seq, id, revision, deleted, body)| {
            let revision = parse_revision(&revision)?;
            Ok(Change {
                seq: u64::try_from(seq).unwrap_or_default(),
                document: Some(Document {
                    id: id.clone(),
                    revision: revision.clone(),
                    body: serde_json::from_str(&body)?,
                }),
                id,
                revision,
                deleted,
            })
        })
        .collect()
}

/// Document store persisted in a SQLite database.
///
/// Conditional writes run in `BEGIN IMMEDIATE` transactions, so several
/// processes may share one file. Views live in memory: they are rebuilt from
/// `documents` at open and advanced from the `changes` log afterwards.
/// Every call runs on the blocking pool, so waiting on another process's
/// write lock never stalls the async workers.
pub struct SqliteStore {
    inner: Arc<Mutex<SqliteInner>>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|error| StoreError::Unavailable(error.to_string()))?;
        }
        let conn = Connection::open(&path)?;
        tracing::info!(path = %path.display(), "Opening SQLite document store");
        Self::from_connection(conn, Some(path))
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(mut conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        Self::configure(&conn)?;
        migrations::run(&mut conn)?;

        let mut inner = SqliteInner {
            conn,
            views: ViewSet::standard(),
            feed: ChangeFeed::default(),
            head: 0,
        };
        inner.rebuild_views()?;

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            path,
        })
    }

    /// Configure `SQLite` for concurrent readers and writers
    fn configure(conn: &Connection) -> StoreResult<()> {
        // In-memory databases reject WAL; that is fine
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }

    /// Database file path, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `work` against the connection on the blocking pool
    async fn blocking<T, F>(&self, work: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteInner) -> StoreResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || work(&mut inner.lock()))
            .await
            .map_err(|error| StoreError::Unavailable(format!("store task failed: {error}")))?
    }

    /// Import commits written by other connections to the same file into the
    /// views and live change streams. Returns how many were applied.
    pub async fn catch_up(&self) -> StoreResult<usize> {
        let applied = self.blocking(SqliteInner::catch_up).await?;
        if applied > 0 {
            tracing::debug!(applied, "Imported external commits");
        }
        Ok(applied)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, id: &str) -> StoreResult<Document> {
        let id = id.to_string();
        self.blocking(move |inner| {
            inner
                .document(&id, false)?
                .map(|(document, _)| document)
                .ok_or(StoreError::NotFound(id))
        })
        .await
    }

    async fn put(
        &self,
        id: &str,
        body: serde_json::Value,
        expected: Option<&Revision>,
    ) -> StoreResult<Revision> {
        let id = id.to_string();
        let expected = expected.cloned();
        self.blocking(move |inner| {
            inner.commit(
                &id,
                |current| next_put_revision(&id, current, expected.as_ref()),
                Some(body),
            )
        })
        .await
    }

    async fn delete(&self, id: &str, expected: &Revision) -> StoreResult<Revision> {
        let id = id.to_string();
        let expected = expected.clone();
        self.blocking(move |inner| {
            inner.commit(
                &id,
                |current| next_delete_revision(&id, current, &expected),
                None,
            )
        })
        .await
    }

    async fn query(&self, view: ViewName, options: QueryOptions) -> StoreResult<Vec<ViewRow>> {
        self.blocking(move |inner| {
            inner.catch_up()?;

            let index = inner
                .views
                .get(view)
                .ok_or_else(|| StoreError::NotFound(format!("view {view}")))?;
            let mut rows = index.query(&options);

            if options.include_docs && options.group_level.is_none() {
                for row in &mut rows {
                    if let Some(id) = row.id.as_deref() {
                        row.doc = inner.document(id, false)?.map(|(document, _)| document);
                    }
                }
            }
            Ok(rows)
        })
        .await
    }

    async fn changes(&self, options: ChangesOptions) -> StoreResult<ChangeStream> {
        self.blocking(move |inner| {
            inner.catch_up()?;

            let checkpoint = options.since.checkpoint(inner.head);
            let backlog = if checkpoint < inner.head {
                read_latest_changes_after(&inner.conn, checkpoint)?
            } else {
                Vec::new()
            };
            Ok(inner.feed.open(options, backlog))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Since;
    use crate::views::KeyRange;
    use serde_json::json;
    use tempfile::tempdir;
    use tokio::time::{sleep, timeout};

    fn entry_body(created_at: i64, tags: &[&str]) -> serde_json::Value {
        json!({"type": "entry", "content": "c", "tags": tags, "createdAt": created_at})
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.path().is_none());
        assert!(matches!(store.get("x").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_conditional_writes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.put("a", json!({"v": 1}), None).await.unwrap();
        let second = store.put("a", json!({"v": 2}), Some(&first)).await.unwrap();
        assert_eq!(second.generation(), 2);

        assert!(matches!(
            store.put("a", json!({"v": 3}), Some(&first)).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.delete("a", &first).await,
            Err(StoreError::Conflict(_))
        ));

        store.delete("a", &second).await.unwrap();
        assert!(matches!(store.get("a").await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.delete("a", &second).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_views_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quill.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put("a", entry_body(1_000, &["x"]), None).await.unwrap();
            let gone = store.put("b", entry_body(2_000, &["x"]), None).await.unwrap();
            store.delete("b", &gone).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let rows = store
            .query(
                ViewName::Tags,
                QueryOptions {
                    range: Some(KeyRange::Prefix(vec!["x".into()])),
                    include_docs: true,
                    ..QueryOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id.as_deref(), Some("a"));
        assert!(rows[0].doc.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_catch_up_sees_other_connections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let reader = SqliteStore::open(&path).unwrap();
        let writer = SqliteStore::open(&path).unwrap();

        let mut stream = reader.changes(ChangesOptions::default()).await.unwrap();
        writer.put("a", entry_body(1_000, &[]), None).await.unwrap();

        assert_eq!(reader.catch_up().await.unwrap(), 1);
        let change = stream.next().await.unwrap();
        assert_eq!(change.id, "a");
        assert_eq!(
            reader
                .query(ViewName::Archive, QueryOptions::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_changes_replay_from_checkpoint() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("a", json!({}), None).await.unwrap();
        store.put("b", json!({}), None).await.unwrap();

        let mut stream = store
            .changes(ChangesOptions {
                live: false,
                since: Since::Seq(1),
                include_docs: false,
            })
            .await
            .unwrap();
        let change = stream.next().await.unwrap();
        assert_eq!((change.seq, change.id.as_str()), (2, "b"));
        assert!(change.document.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replay_keeps_latest_change_per_document() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut revision = store.put("a", json!({"v": 0}), None).await.unwrap();
        store.put("b", json!({"v": 0}), None).await.unwrap();
        for v in 1..=3 {
            revision = store.put("a", json!({"v": v}), Some(&revision)).await.unwrap();
        }

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
        assert_eq!((second.seq, second.revision), (5, revision));
        assert_eq!(second.document.unwrap().body, json!({"v": 3}));
        assert!(replay.next().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_waiting_for_write_lock_leaves_runtime_free() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.db");
        let store = Arc::new(SqliteStore::open(&path).unwrap());

        let rival = Connection::open(&path).unwrap();
        rival.execute_batch("BEGIN IMMEDIATE").unwrap();

        let writer = Arc::clone(&store);
        let pending = tokio::spawn(async move { writer.put("a", json!({}), None).await });
        let ticker = tokio::spawn(async {
            sleep(Duration::from_millis(50)).await;
            "ticked"
        });

        // The single worker keeps running tasks while the write waits
        let ticked = timeout(Duration::from_secs(2), ticker).await.unwrap().unwrap();
        assert_eq!(ticked, "ticked");
        assert!(!pending.is_finished());

        rival.execute_batch("COMMIT").unwrap();
        let revision = pending.await.unwrap().unwrap();
        assert_eq!(revision.generation(), 1);
        assert!(store.get("a").await.is_ok());
    }
}
