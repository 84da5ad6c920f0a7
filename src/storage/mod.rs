//! Note persistence on top of a [`PartitionedStore`](crate::store::PartitionedStore).
//!
//! This is the one place where raw store failures are classified into
//! [`StorageError`]. Layers above add context but never reclassify.

mod document_store;

pub use document_store::DocumentStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{BoxError, ErrorKind};
use crate::store::StoreError;

/// Persisted shape of a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNote {
    #[serde(default)]
    pub id: String,
    pub category: String,
    pub note: String,
    #[serde(rename = "timestamp", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A store failure after classification.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("invalid input")]
    InvalidInput,

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(#[source] BoxError),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound => ErrorKind::NotFound,
            StorageError::AlreadyExists => ErrorKind::AlreadyExists,
            StorageError::InvalidInput => ErrorKind::InvalidInput,
            StorageError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            StorageError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for StorageError {
    fn from(err: StoreError) -> Self {
        match err.status_code() {
            Some(StatusCode::NOT_FOUND) => StorageError::NotFound,
            Some(StatusCode::CONFLICT) => StorageError::AlreadyExists,
            Some(StatusCode::BAD_REQUEST) => StorageError::InvalidInput,
            _ => match err {
                StoreError::Decode(e) => StorageError::MalformedPayload(e),
                other => StorageError::Internal(Box::new(other)),
            },
        }
    }
}

/// Source of identifiers for new notes.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random version 4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_id(&self) -> String {
        self()
    }
}

/// Note persistence operations consumed by the note service.
#[async_trait]
pub trait NoteStorage: Send + Sync {
    /// Persist a new note, filling in a missing id and creation time.
    async fn create_note(&self, note: StoredNote) -> Result<StoredNote, StorageError>;

    /// Overwrite an existing note as a whole, stamping a missing creation time.
    async fn update_note(&self, note: StoredNote) -> Result<StoredNote, StorageError>;

    async fn delete_note(&self, id: &str, category: &str) -> Result<(), StorageError>;

    async fn get_notes_by_category(&self, category: &str) -> Result<Vec<StoredNote>, StorageError>;

    async fn get_note_by_id(&self, category: &str, id: &str) -> Result<StoredNote, StorageError>;
}
