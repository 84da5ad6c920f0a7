//! Typed HTTP client for the notes API.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api::{ErrorBody, NoteRequest, NoteResponse};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{message} ({code}, status {status})")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("unexpected response (status {status}): {body}")]
    UnexpectedResponse { status: StatusCode, body: String },
}

impl ClientError {
    /// Error code reported by the service, if it answered with one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub struct NotesClient {
    http: reqwest::Client,
    base: String,
}

impl NotesClient {
    /// Client for the service at `base`, e.g. `http://localhost:3000`.
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    pub async fn create_note(&self, category: &str, note: &str) -> Result<NoteResponse, ClientError> {
        let url = self.url(&["notes", "create", category]);
        let request = self.http.post(&url).json(&NoteRequest::new(note));
        self.send(url, request).await
    }

    pub async fn update_note(
        &self,
        category: &str,
        id: &str,
        note: &str,
    ) -> Result<NoteResponse, ClientError> {
        let url = self.url(&["notes", "update", category, id]);
        let request = self.http.put(&url).json(&NoteRequest::new(note));
        self.send(url, request).await
    }

    pub async fn delete_note(&self, category: &str, id: &str) -> Result<NoteResponse, ClientError> {
        let url = self.url(&["notes", "delete", category, id]);
        let request = self.http.delete(&url);
        self.send(url, request).await
    }

    pub async fn get_note(&self, category: &str, id: &str) -> Result<NoteResponse, ClientError> {
        let url = self.url(&["notes", "categories", category, "ids", id]);
        let request = self.http.get(&url);
        self.send(url, request).await
    }

    pub async fn list_notes(&self, category: &str) -> Result<NoteResponse, ClientError> {
        let url = self.url(&["notes", "categories", category]);
        let request = self.http.get(&url);
        self.send(url, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: String,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await.map_err(|source| ClientError::Http {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Http { url, source })?;

        let unexpected = || ClientError::UnexpectedResponse {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        };

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|_| unexpected());
        }
        match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(err) => Err(ClientError::Api {
                status,
                code: err.code,
                message: err.message,
            }),
            Err(_) => Err(unexpected()),
        }
    }
}
