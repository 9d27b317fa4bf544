//! Editable Record Service
//!
//! Coordinates the staging store, the upstream source and the merge engine:
//! the first access to a record fetches and stages it, patches are merged into
//! the staged copy, and discarding changes restores the fetched original.

pub mod config;
pub mod guard;
pub mod locks;

use dashmap::DashMap;
use ned_core::{Ediid, NerdRecord, Operation, Principal, StagedEntry};
use ned_merge::{parse_patch, MergeEngine, MergeError};
use ned_source::{FetchError, SourceFetcher};
use ned_storage::{RecordStore, StorageError, StoreStats};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use config::EditorConfig;
pub use guard::{AccessGuard, AllowAll, Decision, TokenGuard};
pub use locks::KeyedLocks;

/// Editor service errors
///
/// The closed set of outcomes callers must handle. Messages carry internal
/// detail and are meant for logs, not for clients.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {principal} may not {operation} {target}")]
    UnauthorizedUser {
        principal: String,
        operation: Operation,
        /// The ediid, or `stats` for service-wide statistics
        target: String,
    },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Internal failure: {0}")]
    InternalFailure(String),
}

impl From<StorageError> for EditorError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::EntryNotFound(ediid) => Self::ResourceNotFound(ediid.to_string()),
            other => Self::InternalFailure(other.to_string()),
        }
    }
}

impl From<FetchError> for EditorError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(ediid) => Self::ResourceNotFound(ediid.to_string()),
            FetchError::Unavailable(reason) => Self::BackendUnavailable(reason),
        }
    }
}

impl From<MergeError> for EditorError {
    fn from(err: MergeError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;

/// Counters of editor activity
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct EditorStats {
    pub store_hits: u64,
    pub upstream_fetches: u64,
    pub patches_applied: u64,
    pub changes_discarded: u64,
    pub requests_denied: u64,
}

/// Editor counters together with the staging store's
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStats {
    pub editor: EditorStats,
    pub store: StoreStats,
}

/// The editable record service
pub struct EditorService<S, F>
where
    S: RecordStore,
    F: SourceFetcher,
{
    /// Staging store
    store: S,

    /// Authoritative metadata source
    source: F,

    /// Capability check run before every operation
    guard: Arc<dyn AccessGuard>,

    merger: MergeEngine,

    /// Per-ediid serialization of read-merge-write
    locks: KeyedLocks,

    config: EditorConfig,

    stats: Arc<DashMap<&'static str, u64>>,
}

impl<S, F> EditorService<S, F>
where
    S: RecordStore,
    F: SourceFetcher,
{
    /// Create a new editor service
    pub fn new(store: S, source: F, guard: Arc<dyn AccessGuard>, config: EditorConfig) -> Self {
        Self {
            store,
            source,
            guard,
            merger: MergeEngine::new(config.merge_policy.clone()),
            locks: KeyedLocks::new(),
            config,
            stats: Arc::new(DashMap::new()),
        }
    }

    /// Return the staged copy of a record, fetching and staging it on first access
    pub async fn get_record(&self, principal: &Principal, ediid: &Ediid) -> Result<NerdRecord> {
        self.authorize(principal, ediid, Operation::Read).await?;

        let _lock = self.lock(ediid).await;
        let entry = self.load_or_stage(ediid).await?;
        Ok(entry.current)
    }

    /// Merge a JSON patch into the staged copy and return the result
    ///
    /// A body that is not a JSON object is rejected before anything is
    /// fetched or staged.
    pub async fn patch_record(
        &self,
        principal: &Principal,
        ediid: &Ediid,
        patch: &[u8],
    ) -> Result<NerdRecord> {
        self.authorize(principal, ediid, Operation::Update).await?;

        let patch = parse_patch(patch).map_err(|e| {
            debug!(%ediid, error = %e, "rejected patch body");
            EditorError::from(e)
        })?;

        let _lock = self.lock(ediid).await;
        let mut entry = self.load_or_stage(ediid).await?;

        let outcome = self.merger.merge_with_report(&entry.current, &patch).map_err(|e| {
            debug!(%ediid, error = %e, "merge rejected");
            EditorError::from(e)
        })?;

        debug!(%ediid, changed = ?outcome.changed_paths, "merged patch");
        entry.apply(outcome.record);
        self.store.put(entry.clone()).await?;

        self.increment_stat("patches_applied");
        info!(%ediid, user = principal.display_name(), patches = entry.patch_count, "record updated");

        Ok(entry.current)
    }

    /// Drop all edits made to a staged record and return the pristine copy
    pub async fn delete_record_changes(
        &self,
        principal: &Principal,
        ediid: &Ediid,
    ) -> Result<NerdRecord> {
        self.authorize(principal, ediid, Operation::Discard).await?;

        let _lock = self.lock(ediid).await;
        let mut entry = self.store.get(ediid).await?;
        entry.reset();
        self.store.put(entry.clone()).await?;

        self.increment_stat("changes_discarded");
        info!(%ediid, user = principal.display_name(), "changes discarded");

        Ok(entry.current)
    }

    /// Get editor statistics
    pub fn get_stats(&self) -> EditorStats {
        EditorStats {
            store_hits: self.get_stat("store_hits"),
            upstream_fetches: self.get_stat("upstream_fetches"),
            patches_applied: self.get_stat("patches_applied"),
            changes_discarded: self.get_stat("changes_discarded"),
            requests_denied: self.get_stat("requests_denied"),
        }
    }

    /// Editor and store statistics, for callers the guard lets inspect the service
    pub async fn service_stats(&self, principal: &Principal) -> Result<ServiceStats> {
        if self.guard.authorize_stats(principal).await == Decision::Denied {
            self.increment_stat("requests_denied");
            warn!(user = principal.display_name(), "stats access denied");
            return Err(EditorError::UnauthorizedUser {
                principal: principal.display_name().to_string(),
                operation: Operation::Inspect,
                target: "stats".to_string(),
            });
        }

        Ok(ServiceStats {
            editor: self.get_stats(),
            store: self.store.stats().await?,
        })
    }

    async fn authorize(&self, principal: &Principal, ediid: &Ediid, operation: Operation) -> Result<()> {
        match self.guard.authorize(principal, ediid, operation).await {
            Decision::Allowed => Ok(()),
            Decision::Denied => {
                self.increment_stat("requests_denied");
                warn!(%ediid, %operation, user = principal.display_name(), "access denied");
                Err(EditorError::UnauthorizedUser {
                    principal: principal.display_name().to_string(),
                    operation,
                    target: ediid.to_string(),
                })
            }
        }
    }

    async fn lock(&self, ediid: &Ediid) -> Option<locks::KeyedGuard<'_>> {
        if self.config.serialize_per_record {
            Some(self.locks.lock(ediid).await)
        } else {
            None
        }
    }

    /// Staged entry for `ediid`, fetching and staging the record if absent.
    /// Callers hold the record's lock.
    async fn load_or_stage(&self, ediid: &Ediid) -> Result<StagedEntry> {
        match self.store.get(ediid).await {
            Ok(entry) => {
                self.increment_stat("store_hits");
                debug!(%ediid, "served from staging store");
                Ok(entry)
            }
            Err(StorageError::EntryNotFound(_)) => {
                self.increment_stat("upstream_fetches");
                let record = self.source.fetch(ediid).await.map_err(|e| {
                    warn!(%ediid, error = %e, "upstream fetch failed");
                    EditorError::from(e)
                })?;

                let entry = StagedEntry::new(ediid.clone(), record);
                self.store.put(entry.clone()).await?;
                info!(%ediid, fields = entry.current.len(), "staged record from metadata service");
                Ok(entry)
            }
            Err(e) => Err(EditorError::InternalFailure(e.to_string())),
        }
    }

    /// Increment a statistic counter
    fn increment_stat(&self, key: &'static str) {
        self.stats.entry(key).and_modify(|v| *v += 1).or_insert(1);
    }

    /// Get a statistic value
    fn get_stat(&self, key: &'static str) -> u64 {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}
