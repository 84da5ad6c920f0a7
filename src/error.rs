use std::fmt;

use thiserror::Error;

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::notes::ServiceError;
use crate::server::ServerError;

/// Opaque cause carried by errors that wrap a failure they do not classify.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Closed set of failure categories shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidInput,
    MalformedPayload,
    Internal,
    Configuration,
}

impl ErrorKind {
    /// Canonical, caller-safe text for the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::MalformedPayload => "malformed payload",
            ErrorKind::Internal => "internal error",
            ErrorKind::Configuration => "configuration error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error surfaced by the binary.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
