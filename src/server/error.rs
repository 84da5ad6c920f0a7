//! HTTP error responses and the lifecycle error of the server.

use std::io;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::error;

use crate::api::ErrorBody;
use crate::error::ErrorKind;
use crate::notes::ServiceError;

/// Error codes carried in the `code` field of error bodies.
pub mod codes {
    pub const INVALID_REQUEST: &str = "InvalidRequest";
    pub const MALFORMED_REQUEST_BODY: &str = "MalformedRequestBody";
    pub const EMPTY_REQUEST_BODY: &str = "EmptyRequestBody";
    pub const INVALID_INPUT: &str = "InvalidInput";
    pub const CATEGORY_REQUIRED: &str = "CategoryRequired";
    pub const ID_REQUIRED: &str = "IDRequired";
    pub const NOT_FOUND: &str = "NotFound";
    pub const ALREADY_EXISTS: &str = "AlreadyExists";
    pub const SERVER_ERROR: &str = "ServerError";
}

const INTERNAL_MESSAGE: &str = "internal server error";

/// A request that failed, mapped once onto a status and code.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("malformed request body: {0}")]
    MalformedRequestBody(String),

    #[error("empty request body")]
    EmptyRequestBody,

    #[error("category is required")]
    CategoryRequired,

    #[error("id is required")]
    IdRequired,

    #[error("no route for {0}")]
    RouteNotFound(String),

    /// The server-wide request deadline passed before a handler answered.
    #[error("request exceeded {0:?}")]
    RequestTimeout(Duration),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_)
            | ApiError::MalformedRequestBody(_)
            | ApiError::EmptyRequestBody
            | ApiError::CategoryRequired
            | ApiError::IdRequired => StatusCode::BAD_REQUEST,
            ApiError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RequestTimeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Service(err) => match err.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::AlreadyExists => StatusCode::CONFLICT,
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::MalformedPayload | ErrorKind::Internal | ErrorKind::Configuration => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => codes::INVALID_REQUEST,
            ApiError::MalformedRequestBody(_) => codes::MALFORMED_REQUEST_BODY,
            ApiError::EmptyRequestBody => codes::EMPTY_REQUEST_BODY,
            ApiError::CategoryRequired => codes::CATEGORY_REQUIRED,
            ApiError::IdRequired => codes::ID_REQUIRED,
            ApiError::RouteNotFound(_) => codes::NOT_FOUND,
            ApiError::RequestTimeout(_) => codes::SERVER_ERROR,
            ApiError::Service(err) => match err.kind() {
                ErrorKind::NotFound => codes::NOT_FOUND,
                ErrorKind::AlreadyExists => codes::ALREADY_EXISTS,
                ErrorKind::InvalidInput => codes::INVALID_INPUT,
                ErrorKind::MalformedPayload | ErrorKind::Internal | ErrorKind::Configuration => {
                    codes::SERVER_ERROR
                }
            },
        }
    }

    /// Caller-facing message. Never carries the cause of a 500.
    pub fn message(&self) -> String {
        match self {
            ApiError::InvalidRequest(_) => "invalid request".to_string(),
            ApiError::MalformedRequestBody(_) => "malformed request body".to_string(),
            ApiError::RouteNotFound(_) => ErrorKind::NotFound.as_str().to_string(),
            ApiError::RequestTimeout(_) => INTERNAL_MESSAGE.to_string(),
            ApiError::Service(err) if self.status_code().is_client_error() => {
                err.kind().as_str().to_string()
            }
            ApiError::Service(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status_code: self.status_code().as_u16(),
            code: self.code().to_string(),
            message: self.message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

/// Failure of the server lifecycle itself.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Listen(#[from] io::Error),

    #[error("server task failed: {0}")]
    Task(#[from] JoinError),

    #[error("in-flight requests did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}
