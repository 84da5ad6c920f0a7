use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use super::{Context, Note, NoteService, ServiceError};
use crate::error::ErrorKind;
use crate::storage::{NoteStorage, StorageError};

/// Deadline applied to each service call unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Note service backed by a [`NoteStorage`].
///
/// Every call runs under its own deadline. When the deadline passes, the
/// storage future is dropped, which cancels the in-flight store request
/// without touching any other call.
pub struct Notes {
    storage: Arc<dyn NoteStorage>,
    timeout: Duration,
}

/// Builder for [`Notes`]; `build` fails fast on missing dependencies.
#[derive(Default)]
pub struct NotesBuilder {
    storage: Option<Arc<dyn NoteStorage>>,
    timeout: Option<Duration>,
}

impl NotesBuilder {
    pub fn storage(mut self, storage: Arc<dyn NoteStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<Notes, ServiceError> {
        let storage = self.storage.ok_or_else(|| {
            ServiceError::Configuration("note storage is not provided".to_string())
        })?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(ServiceError::Configuration(
                "note service timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Notes { storage, timeout })
    }
}

impl Notes {
    pub fn builder() -> NotesBuilder {
        NotesBuilder::default()
    }

    /// Service with the default timeout.
    pub fn new(storage: Arc<dyn NoteStorage>) -> Result<Self, ServiceError> {
        Self::builder().storage(storage).build()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one storage call under this service's deadline.
    async fn run<T>(
        &self,
        context: Context,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => {
                if source.kind() == ErrorKind::Internal {
                    error!(%context, error = %source, "storage call failed");
                }
                Err(ServiceError::Storage { context, source })
            }
            Err(_) => {
                warn!(%context, timeout = ?self.timeout, "storage call timed out");
                Err(ServiceError::Timeout {
                    context,
                    timeout: self.timeout,
                })
            }
        }
    }
}

fn require(context: &Context, value: &str, reason: &'static str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::InvalidInput {
            context: context.clone(),
            reason,
        });
    }
    Ok(())
}

#[async_trait]
impl NoteService for Notes {
    async fn create_note(&self, note: Note) -> Result<Note, ServiceError> {
        let context = Context::new("create note", &note.category, None);
        require(&context, &note.category, "category is required")?;
        require(&context, &note.note, "note text is required")?;

        let stored = self.run(context, self.storage.create_note(note.into())).await?;
        Ok(stored.into())
    }

    async fn update_note(&self, note: Note) -> Result<Note, ServiceError> {
        let context = Context::new("update note", &note.category, Some(&note.id));
        require(&context, &note.category, "category is required")?;
        require(&context, &note.id, "id is required")?;
        require(&context, &note.note, "note text is required")?;

        let stored = self.run(context, self.storage.update_note(note.into())).await?;
        Ok(stored.into())
    }

    async fn delete_note(&self, category: &str, id: &str) -> Result<(), ServiceError> {
        let context = Context::new("delete note", category, Some(id));
        require(&context, category, "category is required")?;
        require(&context, id, "id is required")?;

        self.run(context, self.storage.delete_note(id, category)).await
    }

    async fn get_notes_by_category(&self, category: &str) -> Result<Vec<Note>, ServiceError> {
        let context = Context::new("list notes", category, None);
        require(&context, category, "category is required")?;

        let stored = self
            .run(context, self.storage.get_notes_by_category(category))
            .await?;
        Ok(stored.into_iter().map(Note::from).collect())
    }

    async fn get_note_by_id(&self, category: &str, id: &str) -> Result<Note, ServiceError> {
        let context = Context::new("get note", category, Some(id));
        require(&context, category, "category is required")?;
        require(&context, id, "id is required")?;

        let stored = self
            .run(context, self.storage.get_note_by_id(category, id))
            .await?;
        Ok(stored.into())
    }
}
