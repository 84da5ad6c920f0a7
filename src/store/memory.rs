use std::collections::{BTreeMap, HashMap};
use std::future;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::RwLock;

use super::{collect_pages, Page, PartitionedStore, StoreError};

const DEFAULT_PAGE_SIZE: usize = 100;

/// In-process document store with the same status semantics as the remote one.
///
/// Documents are kept as the exact bytes that were written and listed in id
/// order. Listings are paged internally and aggregated like a remote listing.
pub struct MemoryStore {
    partitions: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Store raw bytes under a key without any validation.
    pub async fn put_raw(&self, partition: &str, id: &str, payload: impl Into<Vec<u8>>) {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(partition.to_string())
            .or_default()
            .insert(id.to_string(), payload.into());
    }

    /// Number of documents currently held in a partition.
    pub async fn len(&self, partition: &str) -> usize {
        let partitions = self.partitions.read().await;
        partitions.get(partition).map(BTreeMap::len).unwrap_or(0)
    }

    pub async fn is_empty(&self, partition: &str) -> bool {
        self.len(partition).await == 0
    }
}

/// The document's own `id` field.
fn document_id(payload: &[u8]) -> Result<String, StoreError> {
    let value: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| StoreError::status(StatusCode::BAD_REQUEST, format!("invalid document: {}", e)))?;

    match value.get("id").and_then(|id| id.as_str()) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(StoreError::status(
            StatusCode::BAD_REQUEST,
            "document is missing a string id",
        )),
    }
}

fn not_found(partition: &str, id: &str) -> StoreError {
    StoreError::status(
        StatusCode::NOT_FOUND,
        format!("no document '{}' in partition '{}'", id, partition),
    )
}

#[async_trait]
impl PartitionedStore for MemoryStore {
    async fn create_item(&self, partition: &str, payload: Vec<u8>) -> Result<Vec<u8>, StoreError> {
        let id = document_id(&payload)?;
        let mut partitions = self.partitions.write().await;
        let documents = partitions.entry(partition.to_string()).or_default();

        if documents.contains_key(&id) {
            return Err(StoreError::status(
                StatusCode::CONFLICT,
                format!("document '{}' already exists in partition '{}'", id, partition),
            ));
        }

        documents.insert(id, payload.clone());
        Ok(payload)
    }

    async fn replace_item(
        &self,
        partition: &str,
        id: &str,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, StoreError> {
        if document_id(&payload)? != id {
            return Err(StoreError::status(
                StatusCode::BAD_REQUEST,
                "document id does not match the addressed id",
            ));
        }

        let mut partitions = self.partitions.write().await;
        match partitions.get_mut(partition).and_then(|docs| docs.get_mut(id)) {
            Some(existing) => {
                *existing = payload.clone();
                Ok(payload)
            }
            None => Err(not_found(partition, id)),
        }
    }

    async fn delete_item(&self, partition: &str, id: &str) -> Result<(), StoreError> {
        let mut partitions = self.partitions.write().await;
        partitions
            .get_mut(partition)
            .and_then(|docs| docs.remove(id))
            .map(|_| ())
            .ok_or_else(|| not_found(partition, id))
    }

    async fn read_item(&self, partition: &str, id: &str) -> Result<Vec<u8>, StoreError> {
        let partitions = self.partitions.read().await;
        partitions
            .get(partition)
            .and_then(|docs| docs.get(id))
            .cloned()
            .ok_or_else(|| not_found(partition, id))
    }

    async fn list_items(&self, partition: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let documents: Vec<Vec<u8>> = {
            let partitions = self.partitions.read().await;
            partitions
                .get(partition)
                .map(|docs| docs.values().cloned().collect())
                .unwrap_or_default()
        };
        let page_size = self.page_size;

        // Continuation tokens are offsets into the snapshot.
        collect_pages(|token| {
            let start = token
                .and_then(|t| t.parse::<usize>().ok())
                .unwrap_or(0)
                .min(documents.len());
            let end = (start + page_size).min(documents.len());
            let continuation = (end < documents.len()).then(|| end.to_string());

            future::ready(Ok(Page {
                items: documents[start..end].to_vec(),
                continuation,
            }))
        })
        .await
    }
}
