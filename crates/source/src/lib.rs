//! Source of pristine records
//!
//! The authoritative metadata service is only ever read. A missing record and
//! an unreachable service are reported as distinct errors.

pub mod http;
pub mod memory;

pub use http::HttpSourceFetcher;
pub use memory::InMemorySourceFetcher;

use async_trait::async_trait;
use ned_core::{Ediid, NerdRecord};
use std::sync::Arc;

/// Fetch errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The service answered and the record does not exist
    #[error("Record not found upstream: {0}")]
    NotFound(Ediid),

    /// The service could not be reached or did not answer usefully
    #[error("Metadata service unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Retrieves the authoritative copy of a record
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, ediid: &Ediid) -> Result<NerdRecord>;
}

#[async_trait]
impl<T: SourceFetcher + ?Sized> SourceFetcher for Arc<T> {
    async fn fetch(&self, ediid: &Ediid) -> Result<NerdRecord> {
        (**self).fetch(ediid).await
    }
}
