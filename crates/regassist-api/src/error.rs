//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use regassist_chat::ChatError;
use regassist_core::error::AssistError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 401 Unauthorized - wrong password or no valid session.
    Unauthorized(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 409 Conflict - request does not fit the session state.
    Conflict(String),
    /// 415 Unsupported Media Type - file is neither DOCX nor PDF.
    UnsupportedMediaType(String),
    /// 422 Unprocessable Entity - file could not be read.
    UnprocessableEntity(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 502 Bad Gateway - a provider or the document host failed.
    BadGateway(String),
    /// 503 Service Unavailable - backend not configured.
    ServiceUnavailable(String),
    /// 504 Gateway Timeout - remote job did not finish in time.
    GatewayTimeout(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::UnsupportedMediaType(msg) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type", msg)
            }
            ApiError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", msg)
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout", msg),
        };

        warn!(status = status.as_u16(), error = error_code, message = %message, "Request failed");

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<AssistError> for ApiError {
    fn from(err: AssistError) -> Self {
        let message = err.to_string();
        match err {
            AssistError::AuthFailed => ApiError::Unauthorized(message),
            AssistError::DirectoryUnavailable { .. }
            | AssistError::RemoteCallFailed(_)
            | AssistError::RemoteJobFailed { .. } => ApiError::BadGateway(message),
            AssistError::RemoteJobTimedOut { .. } => ApiError::GatewayTimeout(message),
            AssistError::Cancelled => ApiError::Conflict(message),
            AssistError::UnsupportedDocument(_) => ApiError::UnsupportedMediaType(message),
            AssistError::Extraction(_) | AssistError::Ocr(_) => {
                ApiError::UnprocessableEntity(message)
            }
            AssistError::BackendUnavailable(_) => ApiError::ServiceUnavailable(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) | ChatError::EmptyUpload => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::NoDocument => {
                ApiError::Conflict("Please upload a document before asking about it.".to_string())
            }
            ChatError::Assist(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_assist_error_status_mapping() {
        let cases = [
            (AssistError::AuthFailed, StatusCode::UNAUTHORIZED),
            (
                AssistError::DirectoryUnavailable {
                    status: 404,
                    message: "Not Found".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                AssistError::RemoteCallFailed("x".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AssistError::RemoteJobFailed {
                    status: "failed".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                AssistError::RemoteJobTimedOut { attempts: 3 },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (AssistError::Cancelled, StatusCode::CONFLICT),
            (
                AssistError::UnsupportedDocument("a.txt".to_string()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                AssistError::BackendUnavailable("multimodal".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AssistError::Config("bad".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(status_of(err.into()), expected);
        }
    }

    #[test]
    fn test_chat_error_status_mapping() {
        assert_eq!(status_of(ChatError::EmptyMessage.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ChatError::MessageTooLong(8000).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ChatError::NoDocument.into()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(ChatError::Assist(AssistError::Ocr("x".to_string())).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_directory_message_keeps_upstream_status() {
        let err: ApiError = AssistError::DirectoryUnavailable {
            status: 404,
            message: "Not Found".to_string(),
        }
        .into();
        match err {
            ApiError::BadGateway(msg) => {
                assert_eq!(msg, "Failed to load documents. Error: 404, Not Found")
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
