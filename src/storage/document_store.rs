use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::{IdGenerator, NoteStorage, StorageError, StoredNote, UuidGenerator};
use crate::error::ErrorKind;
use crate::store::{PartitionedStore, StoreError};

/// Notes kept as JSON documents, partitioned by category.
pub struct DocumentStore {
    store: Arc<dyn PartitionedStore>,
    ids: Arc<dyn IdGenerator>,
}

impl DocumentStore {
    pub fn new(store: Arc<dyn PartitionedStore>) -> Self {
        Self {
            store,
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Replace the identifier source used for new notes.
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }
}

/// Classify a raw store failure, logging what the backend actually said.
fn classify(operation: &'static str, category: &str, err: StoreError) -> StorageError {
    let classified = StorageError::from(err);
    match classified.kind() {
        ErrorKind::Internal | ErrorKind::MalformedPayload => {
            warn!(operation, category, error = %classified, "store operation failed")
        }
        kind => debug!(operation, category, %kind, "store operation rejected"),
    }
    classified
}

#[async_trait]
impl NoteStorage for DocumentStore {
    async fn create_note(&self, mut note: StoredNote) -> Result<StoredNote, StorageError> {
        if note.id.is_empty() {
            note.id = self.ids.next_id();
        }
        if note.created_at.is_none() {
            note.created_at = Some(Utc::now());
        }

        let payload = serde_json::to_vec(&note)?;
        let persisted = self
            .store
            .create_item(&note.category, payload)
            .await
            .map_err(|e| classify("create", &note.category, e))?;

        debug!(category = %note.category, id = %note.id, "note created");
        Ok(serde_json::from_slice(&persisted)?)
    }

    async fn update_note(&self, mut note: StoredNote) -> Result<StoredNote, StorageError> {
        if note.created_at.is_none() {
            note.created_at = Some(Utc::now());
        }

        let payload = serde_json::to_vec(&note)?;
        let persisted = self
            .store
            .replace_item(&note.category, &note.id, payload)
            .await
            .map_err(|e| classify("replace", &note.category, e))?;

        debug!(category = %note.category, id = %note.id, "note replaced");
        Ok(serde_json::from_slice(&persisted)?)
    }

    async fn delete_note(&self, id: &str, category: &str) -> Result<(), StorageError> {
        self.store
            .delete_item(category, id)
            .await
            .map_err(|e| classify("delete", category, e))?;

        debug!(category, id, "note deleted");
        Ok(())
    }

    async fn get_notes_by_category(&self, category: &str) -> Result<Vec<StoredNote>, StorageError> {
        let items = self
            .store
            .list_items(category)
            .await
            .map_err(|e| classify("list", category, e))?;

        let notes = items
            .iter()
            .map(|raw| serde_json::from_slice(raw))
            .collect::<Result<Vec<StoredNote>, _>>()?;

        debug!(category, count = notes.len(), "notes listed");
        Ok(notes)
    }

    async fn get_note_by_id(&self, category: &str, id: &str) -> Result<StoredNote, StorageError> {
        let raw = self
            .store
            .read_item(category, id)
            .await
            .map_err(|e| classify("read", category, e))?;

        Ok(serde_json::from_slice(&raw)?)
    }
}
