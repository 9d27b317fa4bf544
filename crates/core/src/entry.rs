//! Staged entries: the editable working copy of one record

use crate::record::NerdRecord;
use crate::types::Ediid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The staging-store unit for one ediid
///
/// `original` is the record as fetched from the authoritative source and is
/// never modified after the entry is created. Only `current` changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedEntry {
    pub ediid: Ediid,

    /// The record as last left by the client
    pub current: NerdRecord,

    original: NerdRecord,

    /// When the record was first staged
    pub created_at: DateTime<Utc>,

    /// Advisory only; never used for conflict detection
    pub last_modified: DateTime<Utc>,

    /// Patches applied since staging or the last discard
    pub patch_count: u32,
}

impl StagedEntry {
    /// Stage a freshly fetched record, `current == original`
    pub fn new(ediid: Ediid, fetched: NerdRecord) -> Self {
        let now = Utc::now();
        Self {
            ediid,
            current: fetched.clone(),
            original: fetched,
            created_at: now,
            last_modified: now,
            patch_count: 0,
        }
    }

    /// Reassemble an entry from persisted parts
    pub fn restore(
        ediid: Ediid,
        current: NerdRecord,
        original: NerdRecord,
        created_at: DateTime<Utc>,
        last_modified: DateTime<Utc>,
        patch_count: u32,
    ) -> Self {
        Self {
            ediid,
            current,
            original,
            created_at,
            last_modified,
            patch_count,
        }
    }

    pub fn original(&self) -> &NerdRecord {
        &self.original
    }

    pub fn is_edited(&self) -> bool {
        self.current != self.original
    }

    /// Replace the working copy with the result of a patch
    pub fn apply(&mut self, merged: NerdRecord) {
        self.current = merged;
        self.patch_count = self.patch_count.saturating_add(1);
        self.last_modified = Utc::now();
    }

    /// Discard all edits
    pub fn reset(&mut self) {
        self.current = self.original.clone();
        self.patch_count = 0;
        self.last_modified = Utc::now();
    }
}
