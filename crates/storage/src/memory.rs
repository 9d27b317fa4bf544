//! In-memory storage implementation for testing and development
//!
//! Provides simple HashMap-based storage without external dependencies.

use crate::{RecordStore, Result, StorageError, StoreStats};
use async_trait::async_trait;
use ned_core::{Ediid, StagedEntry};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory record store
///
/// Cloning yields another handle onto the same map.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    entries: Arc<RwLock<HashMap<Ediid, StagedEntry>>>,
}

impl InMemoryRecordStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of staged entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, ediid: &Ediid) -> Result<StagedEntry> {
        self.entries
            .read()
            .get(ediid)
            .cloned()
            .ok_or_else(|| StorageError::EntryNotFound(ediid.clone()))
    }

    async fn put(&self, entry: StagedEntry) -> Result<()> {
        self.entries.write().insert(entry.ediid.clone(), entry);
        Ok(())
    }

    async fn delete(&self, ediid: &Ediid) -> Result<()> {
        self.entries
            .write()
            .remove(ediid)
            .ok_or_else(|| StorageError::EntryNotFound(ediid.clone()))?;
        Ok(())
    }

    async fn contains(&self, ediid: &Ediid) -> Result<bool> {
        Ok(self.entries.read().contains_key(ediid))
    }

    async fn list_ids(&self) -> Result<Vec<Ediid>> {
        let mut ids: Vec<Ediid> = self.entries.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let entries = self.entries.read();
        Ok(StoreStats {
            total_entries: entries.len() as u64,
            edited_entries: entries.values().filter(|e| e.is_edited()).count() as u64,
        })
    }
}
