//! Object store access: paginated listing, reads and overwriting writes.

pub mod bucket;

pub use bucket::{Bucket, BucketLocation};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid object store url: {0}")]
    InvalidUrl(String),

    #[error("object store error: {0}")]
    Backend(#[from] object_store::Error),
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys on this page, in lexicographic order.
    pub keys: Vec<String>,
    /// Key to pass as `start_after` for the next page. `None` on the last page.
    pub next_start_after: Option<String>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// List at most `page_size` keys under `prefix` that sort after `start_after`.
    async fn list_page(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StoreError>;

    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Write `body` at `key`, replacing any existing object.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError>;
}
