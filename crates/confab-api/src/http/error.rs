//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use confab_types::error::{ChatError, ConfigError, ManagementError, RepositoryError};
use confab_types::llm::LlmError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Model selection or configuration problem.
    Config(ConfigError),
    /// Chat exchange failure.
    Chat(ChatError),
    /// Storage failure.
    Repository(RepositoryError),
    /// Validation error.
    Validation(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Repository(e)
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Config(e) => AppError::Config(e),
            ChatError::EmptyMessage => AppError::Validation("message must not be empty".to_string()),
            other => AppError::Chat(other),
        }
    }
}

impl From<ManagementError> for AppError {
    fn from(e: ManagementError) -> Self {
        match e {
            ManagementError::Config(e) => AppError::Config(e),
            ManagementError::Repository(e) => AppError::Repository(e),
            ManagementError::InvalidInput(msg) => AppError::Validation(msg),
        }
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Config(e @ ConfigError::ModelNotFound(_)) => {
                (StatusCode::NOT_FOUND, "MODEL_NOT_FOUND", e.to_string())
            }
            AppError::Config(e @ ConfigError::UnsupportedCapability { .. }) => {
                (StatusCode::BAD_REQUEST, "UNSUPPORTED_CAPABILITY", e.to_string())
            }
            AppError::Config(e) => (StatusCode::BAD_REQUEST, "CONFIG_ERROR", e.to_string()),
            AppError::Chat(e @ ChatError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "GENERATION_TIMEOUT", e.to_string())
            }
            AppError::Chat(ChatError::Provider(LlmError::RateLimited { .. })) => (
                StatusCode::TOO_MANY_REQUESTS,
                "PROVIDER_RATE_LIMITED",
                "provider rate limit reached".to_string(),
            ),
            AppError::Chat(e @ ChatError::Provider(_)) => {
                (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", e.to_string())
            }
            AppError::Chat(ChatError::Memory(e)) | AppError::Repository(e) => match e {
                RepositoryError::NotFound => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", "Entity not found".to_string())
                }
                RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                other => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", other.to_string()),
            },
            AppError::Chat(e) => (StatusCode::INTERNAL_SERVER_ERROR, "CHAT_ERROR", e.to_string()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(code, %message, "request failed");
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
