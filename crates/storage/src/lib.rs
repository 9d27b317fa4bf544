//! Staging store for editable records
//!
//! Holds at most one staged copy of each record, keyed by ediid:
//! - In-memory: HashMap-based storage for tests and development
//! - SQLite: durable single-file storage (feature `sqlite`)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use ned_core::{Ediid, StagedEntry};
use std::sync::Arc;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("No staged entry for record: {0}")]
    EntryNotFound(Ediid),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Corrupted entry for {ediid}: {reason}")]
    Corrupted { ediid: String, reason: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Key-value store of staged entries
///
/// Every operation is atomic per key and has no effect on other keys.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the staged entry for a record
    async fn get(&self, ediid: &Ediid) -> Result<StagedEntry>;

    /// Insert or overwrite the entry under its ediid
    async fn put(&self, entry: StagedEntry) -> Result<()>;

    /// Remove the staged entry for a record
    async fn delete(&self, ediid: &Ediid) -> Result<()>;

    /// Check whether a record is staged
    async fn contains(&self, ediid: &Ediid) -> Result<bool>;

    /// List staged record identifiers, sorted
    async fn list_ids(&self) -> Result<Vec<Ediid>>;

    /// Get storage statistics
    async fn stats(&self) -> Result<StoreStats>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn get(&self, ediid: &Ediid) -> Result<StagedEntry> {
        (**self).get(ediid).await
    }

    async fn put(&self, entry: StagedEntry) -> Result<()> {
        (**self).put(entry).await
    }

    async fn delete(&self, ediid: &Ediid) -> Result<()> {
        (**self).delete(ediid).await
    }

    async fn contains(&self, ediid: &Ediid) -> Result<bool> {
        (**self).contains(ediid).await
    }

    async fn list_ids(&self) -> Result<Vec<Ediid>> {
        (**self).list_ids().await
    }

    async fn stats(&self) -> Result<StoreStats> {
        (**self).stats().await
    }
}

/// Storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total_entries: u64,
    /// Entries whose current copy differs from the original
    pub edited_entries: u64,
}
