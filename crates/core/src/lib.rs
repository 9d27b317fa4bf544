//! Core data structures for the NERDm record editor

pub mod entry;
pub mod record;
pub mod types;

pub use entry::StagedEntry;
pub use record::NerdRecord;
pub use types::{Ediid, Operation, Principal};

/// Core error types
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid record identifier: {0:?}")]
    InvalidEdiid(String),

    #[error("Record must be a JSON object, found {0}")]
    NotADocument(&'static str),
}
