//! In-memory record source for testing and development

use crate::{FetchError, Result, SourceFetcher};
use async_trait::async_trait;
use ned_core::{Ediid, NerdRecord};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Serves records from a fixed map and counts fetches
///
/// Cloning yields another handle onto the same fixtures and counters.
#[derive(Clone, Default)]
pub struct InMemorySourceFetcher {
    records: Arc<RwLock<HashMap<Ediid, NerdRecord>>>,
    fetch_count: Arc<AtomicU64>,
    offline: Arc<AtomicBool>,
}

impl InMemorySourceFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the authoritative copy of a record
    pub fn insert(&self, ediid: Ediid, record: NerdRecord) {
        self.records.write().insert(ediid, record);
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with_record(self, ediid: Ediid, record: NerdRecord) -> Self {
        self.insert(ediid, record);
        self
    }

    /// Simulate an unreachable metadata service
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetch calls made so far, including failed ones
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for InMemorySourceFetcher {
    async fn fetch(&self, ediid: &Ediid) -> Result<NerdRecord> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Unavailable("connection refused".to_string()));
        }

        self.records
            .read()
            .get(ediid)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(ediid.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_known_and_unknown() {
        let id = Ediid::new("1234").unwrap();
        let record = NerdRecord::from_value(json!({"title": "Old Title"})).unwrap();
        let source = InMemorySourceFetcher::new().with_record(id.clone(), record.clone());

        assert_eq!(source.fetch(&id).await.unwrap(), record);

        let missing = Ediid::new("does-not-exist").unwrap();
        assert_eq!(source.fetch(&missing).await, Err(FetchError::NotFound(missing.clone())));
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_offline() {
        let id = Ediid::new("1234").unwrap();
        let source = InMemorySourceFetcher::new()
            .with_record(id.clone(), NerdRecord::new());

        source.set_offline(true);
        assert!(matches!(source.fetch(&id).await, Err(FetchError::Unavailable(_))));

        source.set_offline(false);
        assert!(source.fetch(&id).await.is_ok());
    }
}
