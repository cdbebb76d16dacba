//! Local HTTP transport.

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Path, State as AxumState},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tower_http::cors::CorsLayer;

use crate::error::NoteError;
use crate::notes::NoteSummary;
use crate::AppState;

pub const DEFAULT_ADDR: &str = "127.0.0.1:3001";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const EDITOR_PAGE: &str = include_str!("../ui/index.html");

#[derive(Clone)]
pub struct ServerState {
    pub app: Arc<AppState>,
    /// Generated stylesheet served at `/styles.css`.
    pub stylesheet: PathBuf,
}

// Request/response bodies

#[derive(Debug, Deserialize)]
struct AppendRequest {
    filename: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateNoteRequest {
    filename: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FilesResponse {
    files: Vec<String>,
    last_modified: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct NotesResponse {
    success: bool,
    filename: String,
    notes: Vec<NoteSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NoteResponse {
    success: bool,
    note_id: String,
    filename: String,
    content: String,
    reference: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Note store failure rendered as an HTTP error.
pub struct ApiError(NoteError);

impl From<NoteError> for ApiError {
    fn from(e: NoteError) -> Self {
        ApiError(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(NoteError::InvalidPayload(rejection.body_text()))
    }
}

pub fn status_for(error: &NoteError) -> StatusCode {
    match error {
        NoteError::MissingInput(_) | NoteError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        NoteError::FileNotFound(_) | NoteError::NoteNotFound(_) | NoteError::PathEscape(_) => {
            StatusCode::NOT_FOUND
        }
        NoteError::MalformedTag(_)
        | NoteError::MissingClosingTag(_)
        | NoteError::NestedNote(_)
        | NoteError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }

        let body = ErrorBody {
            error: self.0.summary().to_string(),
            details: Some(self.0.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/files", get(list_files))
        .route("/api/append", post(append_content))
        .route("/api/notes/{filename}", get(list_notes))
        .route("/api/note/{id}", get(get_note).put(update_note))
        .route("/editor", get(editor_page))
        .route("/styles.css", get(stylesheet))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: &str, state: ServerState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("chapter server listening on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn list_files(
    AxumState(state): AxumState<ServerState>,
) -> Result<Json<FilesResponse>, ApiError> {
    let listing = state.app.note_store().list_files().await?;
    Ok(Json(FilesResponse {
        files: listing.names(),
        last_modified: listing.last_modified,
    }))
}

async fn append_content(
    AxumState(state): AxumState<ServerState>,
    payload: Result<Json<AppendRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    let filename = request.filename.unwrap_or_default();
    let content = request.content.unwrap_or_default();

    state.app.note_store().append(&filename, &content).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: format!("Content appended to {}", filename),
    }))
}

async fn list_notes(
    AxumState(state): AxumState<ServerState>,
    Path(filename): Path<String>,
) -> Result<Json<NotesResponse>, ApiError> {
    let notes = state.app.note_store().list_notes(&filename).await?;
    Ok(Json(NotesResponse {
        success: true,
        filename,
        notes,
    }))
}

async fn get_note(
    AxumState(state): AxumState<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<NoteResponse>, ApiError> {
    let found = state.app.note_store().get_note(&id).await?;
    Ok(Json(NoteResponse {
        success: true,
        note_id: id,
        filename: found.filename,
        content: found.content,
        reference: found.reference,
    }))
}

async fn update_note(
    AxumState(state): AxumState<ServerState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateNoteRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    let filename = request.filename.unwrap_or_default();
    let content = request.content.unwrap_or_default();

    state
        .app
        .note_store()
        .update_note(&id, &filename, &content)
        .await?;
    Ok(Json(MessageResponse {
        success: true,
        message: format!("Note {} updated in {}", id, filename),
    }))
}

async fn editor_page() -> Html<&'static str> {
    Html(EDITOR_PAGE)
}

async fn stylesheet(
    AxumState(state): AxumState<ServerState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let io_err = |e| NoteError::io("Failed to read stylesheet", e);

    let metadata = tokio::fs::metadata(&state.stylesheet).await.map_err(io_err)?;
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let etag = format!("\"{}\"", modified);

    let cached = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == etag);
    if cached {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    let css = tokio::fs::read_to_string(&state.stylesheet)
        .await
        .map_err(io_err)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/css; charset=utf-8".to_string()),
            (header::ETAG, etag),
        ],
        css,
    )
        .into_response())
}

async fn health(AxumState(state): AxumState<ServerState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": SERVER_VERSION,
        "chaptersDir": state.app.chapters_dir(),
    }))
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
