//! Types for document merging

use ned_core::NerdRecord;
use serde::{Deserialize, Serialize};

/// Default bound on patch nesting
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Reasons a patch is rejected
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// The patch is not syntactically valid JSON
    #[error("Malformed patch document: {0}")]
    Malformed(String),

    /// The patch is valid JSON but not an object
    #[error("Patch must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    /// The patch would change a field that may not be edited
    #[error("Field {0:?} may not be changed")]
    ProtectedField(String),

    /// The patch nests deeper than allowed
    #[error("Patch nesting depth {depth} exceeds limit {limit}")]
    TooDeep { depth: usize, limit: usize },
}

/// Rules applied on top of the plain recursive merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergePolicy {
    /// Top-level fields whose value a patch may not change
    pub protected_fields: Vec<String>,

    /// Maximum nesting depth of a patch document
    pub max_depth: usize,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            protected_fields: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl MergePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the protected top-level fields
    pub fn with_protected_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set maximum nesting depth (at least 1)
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn is_protected(&self, field: &str) -> bool {
        self.protected_fields.iter().any(|f| f == field)
    }
}

/// A merged record plus the paths the patch actually changed
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub record: NerdRecord,

    /// Dotted paths of changed or added fields, sorted
    pub changed_paths: Vec<String>,
}

impl MergeOutcome {
    pub fn is_noop(&self) -> bool {
        self.changed_paths.is_empty()
    }
}
