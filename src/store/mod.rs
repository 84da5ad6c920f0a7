//! Clients for the remote partitioned document store.
//!
//! A store addresses documents by `(partition, id)`. Every operation is scoped
//! to exactly one partition. Failures are reported unclassified as
//! [`StoreError`]; turning them into domain errors is the storage layer's job.

mod cosmos;
mod memory;

pub use cosmos::{ConnectionString, CosmosStore};
pub use memory::MemoryStore;

use std::future::Future;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::error::BoxError;

/// Raw failure reported by a store client.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend answered with a non-success status.
    #[error("store responded with {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// The backend answered, but the response envelope could not be decoded.
    #[error("undecodable store response: {0}")]
    Decode(#[source] serde_json::Error),

    /// No answer was obtained from the backend.
    #[error("store transport failure: {0}")]
    Transport(#[source] BoxError),
}

impl StoreError {
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        StoreError::Status {
            status,
            message: message.into(),
        }
    }

    pub fn transport(err: impl Into<BoxError>) -> Self {
        StoreError::Transport(err.into())
    }

    /// Backend status code, when the backend produced one.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            StoreError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Operation set against a document store partitioned by key.
#[async_trait]
pub trait PartitionedStore: Send + Sync {
    /// Create a document. Returns the persisted representation.
    async fn create_item(&self, partition: &str, payload: Vec<u8>) -> Result<Vec<u8>, StoreError>;

    /// Overwrite an existing document. Returns the persisted representation.
    async fn replace_item(
        &self,
        partition: &str,
        id: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, StoreError>;

    async fn delete_item(&self, partition: &str, id: &str) -> Result<(), StoreError>;

    async fn read_item(&self, partition: &str, id: &str) -> Result<Vec<u8>, StoreError>;

    /// Every document in the partition, across all backend pages.
    async fn list_items(&self, partition: &str) -> Result<Vec<Vec<u8>>, StoreError>;
}

/// One page of a partition listing.
#[derive(Debug, Default)]
pub struct Page {
    pub items: Vec<Vec<u8>>,
    pub continuation: Option<String>,
}

/// Fetch pages until the backend stops handing out continuation tokens.
///
/// `fetch` receives `None` for the first page and the previous page's token
/// afterwards. The first failing page aborts the whole listing, so callers
/// never see a partial collection.
pub async fn collect_pages<F, Fut>(mut fetch: F) -> Result<Vec<Vec<u8>>, StoreError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page, StoreError>>,
{
    let mut items = Vec::new();
    let mut continuation = None;
    let mut pages = 0usize;

    loop {
        let page = fetch(continuation.take()).await?;
        pages += 1;
        items.extend(page.items);

        match page.continuation {
            Some(token) if !token.is_empty() => continuation = Some(token),
            _ => break,
        }
    }

    tracing::trace!(pages, items = items.len(), "collected partition listing");
    Ok(items)
}
