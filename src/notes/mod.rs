//! Domain notes and the service that manages them.

mod error;
mod service;

pub use error::{Context, ServiceError};
pub use service::{Notes, NotesBuilder, DEFAULT_TIMEOUT};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StoredNote;

/// A short text note filed under a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub category: String,
    pub note: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Note {
    /// A note that has not been stored yet.
    pub fn new(category: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            category: category.into(),
            note: note.into(),
            created_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl From<StoredNote> for Note {
    fn from(stored: StoredNote) -> Self {
        Self {
            id: stored.id,
            category: stored.category,
            note: stored.note,
            created_at: stored.created_at,
        }
    }
}

impl From<Note> for StoredNote {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            category: note.category,
            note: note.note,
            created_at: note.created_at,
        }
    }
}

/// Note operations exposed to the HTTP layer.
#[async_trait]
pub trait NoteService: Send + Sync {
    async fn create_note(&self, note: Note) -> Result<Note, ServiceError>;

    async fn update_note(&self, note: Note) -> Result<Note, ServiceError>;

    async fn delete_note(&self, category: &str, id: &str) -> Result<(), ServiceError>;

    async fn get_notes_by_category(&self, category: &str) -> Result<Vec<Note>, ServiceError>;

    async fn get_note_by_id(&self, category: &str, id: &str) -> Result<Note, ServiceError>;
}
