//! Durable staging storage using SQLite
//!
//! One row per staged record. Documents are stored as JSON text, timestamps
//! as RFC 3339 strings. Statements run on tokio's blocking pool.

use crate::{RecordStore, Result, StorageError, StoreStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ned_core::{Ediid, NerdRecord, StagedEntry};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS staged_records (
    ediid TEXT PRIMARY KEY NOT NULL,
    current_doc TEXT NOT NULL,
    original_doc TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    patch_count INTEGER NOT NULL DEFAULT 0,
    edited INTEGER NOT NULL DEFAULT 0
);
";

/// SQLite-backed record store
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| StorageError::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )
        .map_err(db_error)?;
        conn.execute_batch(SCHEMA_SQL).map_err(db_error)?;

        tracing::debug!("SQLite record store initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking thread pool
    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || op(&conn.lock()))
            .await
            .map_err(|e| StorageError::DatabaseError(format!("database task failed: {e}")))?
    }
}

fn db_error(err: rusqlite::Error) -> StorageError {
    StorageError::DatabaseError(err.to_string())
}

fn encode_record(record: &NerdRecord) -> Result<String> {
    serde_json::to_string(record).map_err(|e| StorageError::SerializationError(e.to_string()))
}

fn decode_record(ediid: &str, column: &str, text: &str) -> Result<NerdRecord> {
    serde_json::from_str(text).map_err(|e| StorageError::Corrupted {
        ediid: ediid.to_string(),
        reason: format!("{column}: {e}"),
    })
}

fn decode_timestamp(ediid: &str, column: &str, text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupted {
            ediid: ediid.to_string(),
            reason: format!("{column}: {e}"),
        })
}

struct RawRow {
    current: String,
    original: String,
    created_at: String,
    last_modified: String,
    patch_count: i64,
}

impl RawRow {
    fn into_entry(self, ediid: &Ediid) -> Result<StagedEntry> {
        let id = ediid.as_str();
        let patch_count = u32::try_from(self.patch_count).map_err(|_| StorageError::Corrupted {
            ediid: id.to_string(),
            reason: format!("patch_count out of range: {}", self.patch_count),
        })?;

        Ok(StagedEntry::restore(
            ediid.clone(),
            decode_record(id, "current_doc", &self.current)?,
            decode_record(id, "original_doc", &self.original)?,
            decode_timestamp(id, "created_at", &self.created_at)?,
            decode_timestamp(id, "last_modified", &self.last_modified)?,
            patch_count,
        ))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get(&self, ediid: &Ediid) -> Result<StagedEntry> {
        let key = ediid.clone();
        let raw = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT current_doc, original_doc, created_at, last_modified, patch_count
                     FROM staged_records WHERE ediid = ?1",
                    params![key.as_str()],
                    |row| {
                        Ok(RawRow {
                            current: row.get(0)?,
                            original: row.get(1)?,
                            created_at: row.get(2)?,
                            last_modified: row.get(3)?,
                            patch_count: row.get(4)?,
                        })
                    },
                )
                .optional()
                .map_err(db_error)
            })
            .await?;

        match raw {
            Some(raw) => raw.into_entry(ediid),
            None => Err(StorageError::EntryNotFound(ediid.clone())),
        }
    }

    async fn put(&self, entry: StagedEntry) -> Result<()> {
        let current = encode_record(&entry.current)?;
        let original = encode_record(entry.original())?;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO staged_records
                    (ediid, current_doc, original_doc, created_at, last_modified, patch_count, edited)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(ediid) DO UPDATE SET
                    current_doc = excluded.current_doc,
                    original_doc = excluded.original_doc,
                    created_at = excluded.created_at,
                    last_modified = excluded.last_modified,
                    patch_count = excluded.patch_count,
                    edited = excluded.edited",
                params![
                    entry.ediid.as_str(),
                    current,
                    original,
                    entry.created_at.to_rfc3339(),
                    entry.last_modified.to_rfc3339(),
                    i64::from(entry.patch_count),
                    entry.is_edited(),
                ],
            )
            .map_err(db_error)
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, ediid: &Ediid) -> Result<()> {
        let key = ediid.clone();
        let removed = self
            .with_conn(move |conn| {
                conn.execute(
                    "DELETE FROM staged_records WHERE ediid = ?1",
                    params![key.as_str()],
                )
                .map_err(db_error)
            })
            .await?;

        if removed == 0 {
            return Err(StorageError::EntryNotFound(ediid.clone()));
        }
        Ok(())
    }

    async fn contains(&self, ediid: &Ediid) -> Result<bool> {
        let key = ediid.clone();
        let found: Option<i64> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT 1 FROM staged_records WHERE ediid = ?1",
                    params![key.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_error)
            })
            .await?;
        Ok(found.is_some())
    }

    async fn list_ids(&self) -> Result<Vec<Ediid>> {
        let raw_ids = self
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare("SELECT ediid FROM staged_records ORDER BY ediid")
                    .map_err(db_error)?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .map_err(db_error)?;
                let ids = rows
                    .collect::<rusqlite::Result<Vec<String>>>()
                    .map_err(db_error)?;
                Ok(ids)
            })
            .await?;

        raw_ids
            .into_iter()
            .map(|raw| {
                Ediid::new(raw.clone()).map_err(|e| StorageError::Corrupted {
                    ediid: raw,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    async fn stats(&self) -> Result<StoreStats> {
        let (total, edited): (i64, i64) = self
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(edited), 0) FROM staged_records",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(db_error)
            })
            .await?;

        Ok(StoreStats {
            total_entries: total.max(0) as u64,
            edited_entries: edited.max(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_entry(id: &str, doc: serde_json::Value) -> StagedEntry {
        StagedEntry::new(Ediid::new(id).unwrap(), NerdRecord::from_value(doc).unwrap())
    }

    #[tokio::test]
    async fn test_put_and_get_roundtrip() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let mut entry = create_test_entry(
            "ark:/88434/mds2-2106",
            json!({"title": "Old Title", "keyword": ["a", "b"], "contactPoint": {"fn": "Jane"}}),
        );
        entry.apply(NerdRecord::from_value(json!({"title": "New Title"})).unwrap());

        store.put(entry.clone()).await.unwrap();
        let retrieved = store.get(&entry.ediid).await.unwrap();

        assert_eq!(retrieved.current, entry.current);
        assert_eq!(retrieved.original(), entry.original());
        assert_eq!(retrieved.patch_count, 1);
        assert_eq!(retrieved.created_at, entry.created_at);
    }

    #[tokio::test]
    async fn test_missing_entry() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let id = Ediid::new("nope").unwrap();

        assert!(matches!(store.get(&id).await, Err(StorageError::EntryNotFound(_))));
        assert!(matches!(store.delete(&id).await, Err(StorageError::EntryNotFound(_))));
        assert!(!store.contains(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites_single_row() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        let mut entry = create_test_entry("1234", json!({"title": "A"}));
        store.put(entry.clone()).await.unwrap();

        entry.apply(NerdRecord::from_value(json!({"title": "B"})).unwrap());
        store.put(entry.clone()).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.edited_entries, 1);
        assert_eq!(
            store.get(&entry.ediid).await.unwrap().current.get("title"),
            Some(&json!("B"))
        );
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staging.db");
        let entry = create_test_entry("1234", json!({"title": "Durable"}));

        {
            let store = SqliteRecordStore::open(&path).unwrap();
            store.put(entry.clone()).await.unwrap();
        }

        let reopened = SqliteRecordStore::open(&path).unwrap();
        let retrieved = reopened.get(&entry.ediid).await.unwrap();
        assert_eq!(retrieved.current, entry.current);
        assert_eq!(reopened.list_ids().await.unwrap(), vec![entry.ediid]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_for_distinct_records() {
        let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());

        let writers: Vec<_> = (0..16)
            .map(|n| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let entry = create_test_entry(&format!("mds2-{n:02}"), json!({"n": n}));
                    store.put(entry).await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let ids = store.list_ids().await.unwrap();
        assert_eq!(ids.len(), 16);
        assert_eq!(ids[0].as_str(), "mds2-00");
        let last = store.get(&Ediid::new("mds2-15").unwrap()).await.unwrap();
        assert_eq!(last.current.get("n"), Some(&json!(15)));
    }

    #[tokio::test]
    async fn test_delete_removes_only_target() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store.put(create_test_entry("a", json!({"t": 1}))).await.unwrap();
        store.put(create_test_entry("b", json!({"t": 2}))).await.unwrap();

        store.delete(&Ediid::new("a").unwrap()).await.unwrap();

        assert_eq!(store.list_ids().await.unwrap(), vec![Ediid::new("b").unwrap()]);
    }
}
