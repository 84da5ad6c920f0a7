use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::error_handling::HandleErrorLayer;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{BoxError, Json, Router};
use serde_json::error::Category;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::timeout::error::Elapsed;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::ApiError;
use crate::api::{messages, NoteRequest, NoteResponse};
use crate::notes::{Note, NoteService};

type Reply = Result<(StatusCode, Json<NoteResponse>), ApiError>;

#[derive(Clone)]
struct AppState {
    notes: Arc<dyn NoteService>,
}

/// Shutdown coordination shared between the server and its handlers.
#[derive(Clone)]
pub(crate) struct Lifecycle {
    pub tracker: TaskTracker,
    pub shutdown: CancellationToken,
}

/// The note routes alone, without server middleware.
pub fn routes(notes: Arc<dyn NoteService>) -> Router {
    Router::new()
        .route("/notes/create/{category}", post(create_note))
        .route("/notes/update/{category}/{id}", put(update_note))
        .route("/notes/delete/{category}/{id}", delete(delete_note))
        .route("/notes/categories/{category}/ids/{id}", get(get_note))
        .route("/notes/categories/{category}", get(list_notes))
        .fallback(missing_route)
        .with_state(AppState { notes })
}

/// Routes wrapped with tracing, the request deadline and in-flight tracking.
pub(crate) fn app(notes: Arc<dyn NoteService>, lifecycle: Lifecycle, request_timeout: Duration) -> Router {
    routes(notes)
        .layer(middleware::from_fn_with_state(lifecycle, track_in_flight))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                    deadline_error(err, request_timeout)
                }))
                .timeout(request_timeout),
        )
        .layer(TraceLayer::new_for_http())
}

fn deadline_error(err: BoxError, deadline: Duration) -> ApiError {
    if !err.is::<Elapsed>() {
        warn!(error = %err, "request aborted by middleware");
    }
    ApiError::RequestTimeout(deadline)
}

/// Unmatched paths. Note paths with an empty segment name the missing field.
async fn missing_route(uri: Uri) -> ApiError {
    let segments: Vec<&str> = uri.path().trim_start_matches('/').split('/').collect();
    let missing = match segments.as_slice() {
        ["notes", "create", category] | ["notes", "categories", category] => {
            require_category(category).err()
        }
        ["notes", "update" | "delete", category] => require_category(category)
            .err()
            .or(Some(ApiError::IdRequired)),
        ["notes", "update" | "delete", category, id]
        | ["notes", "categories", category, "ids", id] => require_category(category)
            .and_then(|()| require_id(id))
            .err(),
        _ => None,
    };
    missing.unwrap_or_else(|| ApiError::RouteNotFound(uri.path().to_string()))
}

/// Holds a tracker token for the life of the request and stops keep-alive once
/// shutdown has begun.
async fn track_in_flight(State(lifecycle): State<Lifecycle>, request: Request, next: Next) -> Response {
    let _in_flight = lifecycle.tracker.token();
    let mut response = next.run(request).await;
    if lifecycle.shutdown.is_cancelled() {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}

fn decode(body: &[u8]) -> Result<NoteRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::EmptyRequestBody);
    }
    serde_json::from_slice(body).map_err(|err| match err.classify() {
        Category::Syntax | Category::Eof => ApiError::MalformedRequestBody(err.to_string()),
        Category::Data | Category::Io => ApiError::InvalidRequest(err.to_string()),
    })
}

fn require_category(category: &str) -> Result<(), ApiError> {
    if category.trim().is_empty() {
        return Err(ApiError::CategoryRequired);
    }
    Ok(())
}

fn require_id(id: &str) -> Result<(), ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::IdRequired);
    }
    Ok(())
}

/// Notes never move between categories.
fn same_category(path: &str, request: &NoteRequest) -> Result<(), ApiError> {
    match request.category.as_deref() {
        Some(body) if !body.is_empty() && body != path => Err(ApiError::InvalidRequest(format!(
            "body category '{}' does not match path category '{}'",
            body, path
        ))),
        _ => Ok(()),
    }
}

fn path_error(rejection: PathRejection) -> ApiError {
    ApiError::InvalidRequest(rejection.body_text())
}

async fn create_note(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Bytes,
) -> Reply {
    let Path(category) = path.map_err(path_error)?;
    require_category(&category)?;
    let request = decode(&body)?;
    same_category(&category, &request)?;

    let note = state.notes.create_note(Note::new(category, request.note)).await?;
    Ok((
        StatusCode::CREATED,
        Json(NoteResponse::with_note(messages::CREATED, note)),
    ))
}

async fn update_note(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Bytes,
) -> Reply {
    let Path((category, id)) = path.map_err(path_error)?;
    require_category(&category)?;
    require_id(&id)?;
    let request = decode(&body)?;
    same_category(&category, &request)?;

    let note = state
        .notes
        .update_note(Note::new(category, request.note).with_id(id))
        .await?;
    Ok((
        StatusCode::OK,
        Json(NoteResponse::with_note(messages::UPDATED, note)),
    ))
}

async fn delete_note(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Reply {
    let Path((category, id)) = path.map_err(path_error)?;
    require_category(&category)?;
    require_id(&id)?;

    state.notes.delete_note(&category, &id).await?;
    Ok((StatusCode::OK, Json(NoteResponse::message(messages::DELETED))))
}

async fn get_note(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Reply {
    let Path((category, id)) = path.map_err(path_error)?;
    require_category(&category)?;
    require_id(&id)?;

    let note = state.notes.get_note_by_id(&category, &id).await?;
    Ok((
        StatusCode::OK,
        Json(NoteResponse::with_note(messages::FETCHED, note)),
    ))
}

async fn list_notes(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Reply {
    let Path(category) = path.map_err(path_error)?;
    require_category(&category)?;

    let notes = state.notes.get_notes_by_category(&category).await?;
    Ok((
        StatusCode::OK,
        Json(NoteResponse::with_notes(messages::LISTED, notes)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::{Context, Notes, ServiceError};
    use crate::storage::{DocumentStore, NoteStorage, StorageError, StoredNote};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Method;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn memory_app() -> Router {
        let storage = DocumentStore::new(Arc::new(MemoryStore::new()))
            .with_id_generator(|| "abc123".to_string());
        let notes = Notes::new(Arc::new(storage)).unwrap();
        routes(Arc::new(notes))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// Service whose every call times out.
    struct TimedOut;

    fn timeout() -> ServiceError {
        ServiceError::Timeout {
            context: Context::new("test", "work", None),
            timeout: Duration::from_millis(1),
        }
    }

    #[async_trait]
    impl NoteService for TimedOut {
        async fn create_note(&self, _: Note) -> Result<Note, ServiceError> {
            Err(timeout())
        }

        async fn update_note(&self, _: Note) -> Result<Note, ServiceError> {
            Err(timeout())
        }

        async fn delete_note(&self, _: &str, _: &str) -> Result<(), ServiceError> {
            Err(timeout())
        }

        async fn get_notes_by_category(&self, _: &str) -> Result<Vec<Note>, ServiceError> {
            Err(timeout())
        }

        async fn get_note_by_id(&self, _: &str, _: &str) -> Result<Note, ServiceError> {
            Err(timeout())
        }
    }

    /// Storage that never answers.
    struct StallingStorage;

    #[async_trait]
    impl NoteStorage for StallingStorage {
        async fn create_note(&self, _: StoredNote) -> Result<StoredNote, StorageError> {
            std::future::pending().await
        }

        async fn update_note(&self, _: StoredNote) -> Result<StoredNote, StorageError> {
            std::future::pending().await
        }

        async fn delete_note(&self, _: &str, _: &str) -> Result<(), StorageError> {
            std::future::pending().await
        }

        async fn get_notes_by_category(&self, _: &str) -> Result<Vec<StoredNote>, StorageError> {
            std::future::pending().await
        }

        async fn get_note_by_id(&self, _: &str, _: &str) -> Result<StoredNote, StorageError> {
            std::future::pending().await
        }
    }

    /// Service that never answers, bypassing its own deadline.
    struct Hanging;

    #[async_trait]
    impl NoteService for Hanging {
        async fn create_note(&self, _: Note) -> Result<Note, ServiceError> {
            std::future::pending().await
        }

        async fn update_note(&self, _: Note) -> Result<Note, ServiceError> {
            std::future::pending().await
        }

        async fn delete_note(&self, _: &str, _: &str) -> Result<(), ServiceError> {
            std::future::pending().await
        }

        async fn get_notes_by_category(&self, _: &str) -> Result<Vec<Note>, ServiceError> {
            std::future::pending().await
        }

        async fn get_note_by_id(&self, _: &str, _: &str) -> Result<Note, ServiceError> {
            std::future::pending().await
        }
    }

    fn lifecycle() -> Lifecycle {
        Lifecycle {
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_create_note_response() {
        let app = memory_app();
        let (status, body) = send(&app, Method::POST, "/notes/create/work", r#"{"note":"buy milk"}"#).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body,
            json!({
                "message": "Note is created",
                "note": {"id": "abc123", "category": "work", "note": "buy milk"}
            })
        );
    }

    #[tokio::test]
    async fn test_get_missing_note() {
        let app = memory_app();
        let (status, body) = send(&app, Method::GET, "/notes/categories/work/ids/missing", "").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({"statusCode": 404, "code": "NotFound", "message": "not found"})
        );
    }

    #[tokio::test]
    async fn test_note_lifecycle() {
        let app = memory_app();
        send(&app, Method::POST, "/notes/create/work", r#"{"note":"old"}"#).await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/notes/update/work/abc123",
            r#"{"note":"new","category":"work"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Note is updated");
        assert_eq!(body["note"]["note"], "new");

        let (status, body) = send(&app, Method::GET, "/notes/categories/work/ids/abc123", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Note is fetched");
        assert_eq!(body["note"]["note"], "new");

        let (status, body) = send(&app, Method::GET, "/notes/categories/work", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Notes are fetched");
        assert_eq!(body["notes"].as_array().unwrap().len(), 1);

        let (status, body) = send(&app, Method::DELETE, "/notes/delete/work/abc123", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Note is deleted"}));

        let (status, _) = send(&app, Method::DELETE, "/notes/delete/work/abc123", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_category_lists_nothing() {
        let app = memory_app();
        let (status, body) = send(&app, Method::GET, "/notes/categories/empty", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Notes are fetched", "notes": []}));
    }

    #[tokio::test]
    async fn test_duplicate_create_is_conflict() {
        let app = memory_app();
        send(&app, Method::POST, "/notes/create/work", r#"{"note":"a"}"#).await;
        let (status, body) = send(&app, Method::POST, "/notes/create/work", r#"{"note":"b"}"#).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "AlreadyExists");
        assert_eq!(body["message"], "already exists");
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let app = memory_app();
        let (status, body) = send(&app, Method::PUT, "/notes/update/work/ghost", r#"{"note":"x"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NotFound");
    }

    #[tokio::test]
    async fn test_request_body_errors() {
        let app = memory_app();
        let cases = [
            ("", "EmptyRequestBody", "empty request body"),
            ("   ", "EmptyRequestBody", "empty request body"),
            (r#"{"note":"#, "MalformedRequestBody", "malformed request body"),
            ("{not json}", "MalformedRequestBody", "malformed request body"),
            (r#"{"note": 5}"#, "InvalidRequest", "invalid request"),
            (r#"{"note":""}"#, "InvalidInput", "invalid input"),
        ];
        for (payload, code, message) in cases {
            let (status, body) = send(&app, Method::POST, "/notes/create/work", payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {:?}", payload);
            assert_eq!(body["statusCode"], 400);
            assert_eq!(body["code"], code, "payload {:?}", payload);
            assert_eq!(body["message"], message);
        }
    }

    #[tokio::test]
    async fn test_category_mismatch_is_rejected() {
        let app = memory_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/notes/create/work",
            r#"{"note":"x","category":"home"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_blank_path_segments() {
        let app = memory_app();
        let (status, body) = send(&app, Method::GET, "/notes/categories/%20", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CategoryRequired");
        assert_eq!(body["message"], "category is required");

        let (status, body) = send(&app, Method::GET, "/notes/categories/work/ids/%20", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "IDRequired");
    }

    #[tokio::test]
    async fn test_internal_failure_is_opaque() {
        let app = routes(Arc::new(TimedOut));
        let (status, body) = send(&app, Method::GET, "/notes/categories/work", "").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"statusCode": 500, "code": "ServerError", "message": "internal server error"})
        );
    }

    #[tokio::test]
    async fn test_stalled_storage_answers_with_service_deadline() {
        let notes = Notes::builder()
            .storage(Arc::new(StallingStorage))
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let lifecycle = lifecycle();
        let app = app(Arc::new(notes), lifecycle.clone(), Duration::from_secs(5));

        let (status, body) = send(&app, Method::GET, "/notes/categories/work", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"statusCode": 500, "code": "ServerError", "message": "internal server error"})
        );

        let (status, body) = send(&app, Method::POST, "/notes/create/work", r#"{"note":"x"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "ServerError");
        assert!(lifecycle.tracker.is_empty());
    }

    #[tokio::test]
    async fn test_request_deadline_has_error_body() {
        let lifecycle = lifecycle();
        let app = app(Arc::new(Hanging), lifecycle.clone(), Duration::from_millis(100));

        let (status, body) = send(&app, Method::GET, "/notes/categories/work/ids/1", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"statusCode": 500, "code": "ServerError", "message": "internal server error"})
        );
        assert!(lifecycle.tracker.is_empty());
    }

    #[tokio::test]
    async fn test_empty_path_segments_name_the_missing_field() {
        let app = memory_app();
        let cases = [
            (Method::POST, "/notes/create/", "CategoryRequired"),
            (Method::GET, "/notes/categories/", "CategoryRequired"),
            (Method::GET, "/notes/categories//ids/1", "CategoryRequired"),
            (Method::GET, "/notes/categories/work/ids/", "IDRequired"),
            (Method::PUT, "/notes/update/work/", "IDRequired"),
            (Method::PUT, "/notes/update/work", "IDRequired"),
            (Method::DELETE, "/notes/delete//1", "CategoryRequired"),
        ];
        for (method, uri, code) in cases {
            let (status, body) = send(&app, method, uri, r#"{"note":"x"}"#).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "uri {}", uri);
            assert_eq!(body["statusCode"], 400);
            assert_eq!(body["code"], code, "uri {}", uri);
        }

        let (status, body) = send(&app, Method::GET, "/elsewhere", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({"statusCode": 404, "code": "NotFound", "message": "not found"})
        );
    }

    #[tokio::test]
    async fn test_connection_close_after_shutdown_begins() {
        let lifecycle = lifecycle();
        let app = app(Arc::new(TimedOut), lifecycle.clone(), Duration::from_secs(5));

        let request = || {
            axum::http::Request::builder()
                .uri("/notes/categories/work")
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(request()).await.unwrap();
        assert!(response.headers().get(header::CONNECTION).is_none());

        lifecycle.shutdown.cancel();
        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.headers()[header::CONNECTION], "close");
        assert!(lifecycle.tracker.is_empty());
    }
}
