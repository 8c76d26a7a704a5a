//! Route handler functions for all API endpoints.
//!
//! Each handler extracts its inputs via axum extractors, works against the
//! caller's session and the shared services, and returns JSON (or plain
//! text for transcript export).

use std::sync::Arc;

use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use regassist_chat::{ClearScope, Session, UploadOutcome};
use regassist_core::error::AssistError;
use regassist_core::types::{
    BackendKind, ChatMessage, ConversationId, DocumentKind, DocumentReference, UploadedFile,
};
use regassist_extract::TextExtractor;

use crate::auth::{generate_token, password_matches};
use crate::error::ApiError;
use crate::state::AppState;

/// Filename offered for transcript downloads.
pub const EXPORT_FILENAME: &str = "chat_history.txt";

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct FileChatRequest {
    pub message: String,
    #[serde(default)]
    pub backend: BackendKind,
}

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub scope: ClearScope,
}

#[derive(Debug, Deserialize)]
pub struct ConversationParams {
    #[serde(default)]
    pub conversation: ConversationId,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AboutResponse {
    pub title: String,
    pub disclaimer: String,
    pub instructions: Vec<String>,
    pub backends: Vec<BackendKind>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation: ConversationId,
    pub backend: BackendKind,
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub conversation: ConversationId,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentsResponse {
    pub documents: Vec<DocumentReference>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentTextResponse {
    pub name: String,
    pub text: String,
}

fn status(s: &str) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: s.to_string(),
    })
}

// =============================================================================
// Public
// =============================================================================

/// GET /health - liveness and uptime.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// POST /login - exchange the shared password for a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if !password_matches(&state.config.auth.password, &req.password) {
        return Err(AssistError::AuthFailed.into());
    }
    let token = generate_token();
    state.sessions.create(token.clone()).await;
    Ok(Json(LoginResponse { token }))
}

// =============================================================================
// Session
// =============================================================================

/// GET /about - title, disclaimer and usage instructions.
pub async fn about(State(state): State<AppState>) -> Json<AboutResponse> {
    let general = &state.config.general;
    Json(AboutResponse {
        title: general.title.clone(),
        disclaimer: general.disclaimer.clone(),
        instructions: general.instructions.clone(),
        backends: state.orchestrator.backends().available(),
    })
}

/// POST /logout - end the caller's session.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
) -> Json<StatusResponse> {
    state.sessions.remove(session.token()).await;
    info!("Session logged out");
    status("logged_out")
}

// =============================================================================
// Chat
// =============================================================================

/// POST /chat - send a message in the general conversation.
pub async fn chat(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let reply = state
        .orchestrator
        .send_general(&session, &req.message)
        .await?;
    Ok(Json(ChatResponse {
        conversation: ConversationId::General,
        backend: BackendKind::Assistant,
        reply,
    }))
}

/// POST /chat/cancel - abandon the in-flight exchange, if any.
pub async fn chat_cancel(Extension(session): Extension<Arc<Session>>) -> Json<StatusResponse> {
    session.cancel();
    status("cancelling")
}

/// POST /chat/clear - empty one or both conversations.
pub async fn chat_clear(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    Json(req): Json<ClearRequest>,
) -> Json<StatusResponse> {
    state.orchestrator.clear(&session, req.scope).await;
    status("cleared")
}

/// GET /chat/history - messages of one conversation, oldest first.
pub async fn chat_history(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    Query(params): Query<ConversationParams>,
) -> Json<HistoryResponse> {
    let messages = state
        .orchestrator
        .history(&session, params.conversation)
        .await;
    Json(HistoryResponse {
        conversation: params.conversation,
        messages,
    })
}

/// GET /chat/export - plain-text transcript as a file download.
pub async fn chat_export(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    Query(params): Query<ConversationParams>,
) -> impl IntoResponse {
    let transcript = state
        .orchestrator
        .export(&session, params.conversation)
        .await;
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            ),
        ],
        transcript,
    )
}

// =============================================================================
// Files
// =============================================================================

/// POST /files - multipart upload of one or more DOCX/PDF files.
pub async fn upload_files(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    mut multipart: Multipart,
) -> Result<Json<UploadOutcome>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            debug!(field = ?field.name(), "Skipping non-file multipart field");
            continue;
        };
        let media_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", filename, e)))?;
        files.push(UploadedFile::new(filename, bytes.to_vec(), media_type));
    }

    let outcome = state.orchestrator.upload(&session, files).await?;
    Ok(Json(outcome))
}

/// POST /files/chat - ask about the uploaded files through a chosen backend.
pub async fn files_chat(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    Json(req): Json<FileChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let reply = state
        .orchestrator
        .send_files(&session, &req.message, req.backend)
        .await?;
    Ok(Json(ChatResponse {
        conversation: ConversationId::Files,
        backend: req.backend,
        reply,
    }))
}

// =============================================================================
// Documents
// =============================================================================

/// GET /documents - readable files in the reference repository.
pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, ApiError> {
    let documents = state.directory.list_supported().await?;
    Ok(Json(DocumentsResponse { documents }))
}

/// GET /documents/{name} - fetch a reference document and return its text.
pub async fn document_text(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DocumentTextResponse>, ApiError> {
    let documents = state.directory.list_supported().await?;
    let Some(doc) = documents.into_iter().find(|d| d.name == name) else {
        return Err(ApiError::NotFound("Document not found.".to_string()));
    };
    let kind = DocumentKind::from_filename(&doc.name)
        .ok_or_else(|| AssistError::UnsupportedDocument(doc.name.clone()))?;

    let bytes = state.directory.fetch(&doc).await?;
    let text = state
        .orchestrator
        .extractor()
        .extract_bytes(kind, &doc.name, &bytes)
        .await
        .map_err(|e| {
            warn!(document = %doc.name, error = %e, "Document extraction failed");
            e
        })?;

    Ok(Json(DocumentTextResponse {
        name: doc.name,
        text,
    }))
}
