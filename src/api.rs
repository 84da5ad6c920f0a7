//! JSON shapes exchanged over HTTP, shared by the server and the client.

use serde::{Deserialize, Serialize};

use crate::notes::Note;

/// Success messages, one per route.
pub mod messages {
    pub const CREATED: &str = "Note is created";
    pub const UPDATED: &str = "Note is updated";
    pub const DELETED: &str = "Note is deleted";
    pub const FETCHED: &str = "Note is fetched";
    pub const LISTED: &str = "Notes are fetched";
}

/// Body of create and update requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub note: String,
}

impl NoteRequest {
    pub fn new(note: impl Into<String>) -> Self {
        Self {
            category: None,
            note: note.into(),
        }
    }
}

/// A note as returned to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteBody {
    pub id: String,
    pub category: String,
    pub note: String,
}

impl From<Note> for NoteBody {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            category: note.category,
            note: note.note,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<NoteBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<NoteBody>>,
}

impl NoteResponse {
    pub fn message(message: &str) -> Self {
        Self {
            message: message.to_string(),
            note: None,
            notes: None,
        }
    }

    pub fn with_note(message: &str, note: Note) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::message(message)
        }
    }

    pub fn with_notes(message: &str, notes: Vec<Note>) -> Self {
        Self {
            notes: Some(notes.into_iter().map(NoteBody::from).collect()),
            ..Self::message(message)
        }
    }
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub code: String,
    pub message: String,
}
