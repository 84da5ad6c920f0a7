use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::error::ErrorKind;
use crate::storage::StorageError;

/// Which call failed, and on what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub operation: &'static str,
    pub category: String,
    pub id: Option<String>,
}

impl Context {
    pub fn new(operation: &'static str, category: &str, id: Option<&str>) -> Self {
        Self {
            operation,
            category: category.to_string(),
            id: id.map(str::to_string),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (category '{}'", self.operation, self.category)?;
        if let Some(id) = &self.id {
            write!(f, ", id '{}'", id)?;
        }
        f.write_str(")")
    }
}

/// Error returned by the note service.
///
/// Storage failures keep their classification; use [`ServiceError::kind`] to
/// branch on it rather than on the message.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{context}: {source}")]
    Storage {
        context: Context,
        #[source]
        source: StorageError,
    },

    #[error("{context}: {reason}")]
    InvalidInput { context: Context, reason: &'static str },

    #[error("{context}: timed out after {timeout:?}")]
    Timeout { context: Context, timeout: Duration },

    #[error("{0}")]
    Configuration(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Storage { source, .. } => source.kind(),
            ServiceError::InvalidInput { .. } => ErrorKind::InvalidInput,
            ServiceError::Timeout { .. } => ErrorKind::Internal,
            ServiceError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn context(&self) -> Option<&Context> {
        match self {
            ServiceError::Storage { context, .. }
            | ServiceError::InvalidInput { context, .. }
            | ServiceError::Timeout { context, .. } => Some(context),
            ServiceError::Configuration(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let ctx = Context::new("get note", "work", Some("abc"));
        assert_eq!(ctx.to_string(), "get note (category 'work', id 'abc')");

        let ctx = Context::new("list notes", "work", None);
        assert_eq!(ctx.to_string(), "list notes (category 'work')");
    }

    #[test]
    fn test_storage_kind_survives_context() {
        let err = ServiceError::Storage {
            context: Context::new("get note", "work", Some("missing")),
            source: StorageError::NotFound,
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "get note (category 'work', id 'missing'): not found");
        assert_eq!(err.context().unwrap().id.as_deref(), Some("missing"));
    }

    #[test]
    fn test_timeout_is_internal() {
        let err = ServiceError::Timeout {
            context: Context::new("list notes", "work", None),
            timeout: Duration::from_millis(10),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
