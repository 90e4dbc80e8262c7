//! Conversation listing handlers, scoped to the calling user.
//!
//! Endpoints:
//! - GET    /api/v1/conversations      - List the caller's conversations
//! - POST   /api/v1/conversations      - Create a conversation
//! - PATCH  /api/v1/conversations/{id} - Rename
//! - DELETE /api/v1/conversations/{id} - Delete with all turns

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use confab_types::chat::Conversation;

use crate::http::error::AppError;
use crate::http::extractors::UserContext;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TitleRequest {
    pub title: String,
}

/// GET /api/v1/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    user: UserContext,
) -> Result<ApiResponse<Vec<Conversation>>, AppError> {
    let start = Instant::now();
    let conversations = state.conversations.list(&user.user_id).await?;
    Ok(ApiResponse::timed(conversations, start))
}

/// POST /api/v1/conversations
pub async fn create_conversation(
    State(state): State<AppState>,
    user: UserContext,
    Json(body): Json<TitleRequest>,
) -> Result<ApiResponse<Conversation>, AppError> {
    let start = Instant::now();
    let conversation = state
        .conversations
        .create(&user.user_id, &body.title)
        .await?;
    Ok(ApiResponse::timed(conversation, start))
}

/// PATCH /api/v1/conversations/{id}
pub async fn rename_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TitleRequest>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let start = Instant::now();
    state.conversations.rename(&id, &body.title).await?;
    Ok(ApiResponse::timed(
        serde_json::json!({ "id": id, "title": body.title.trim() }),
        start,
    ))
}

/// DELETE /api/v1/conversations/{id}
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let start = Instant::now();
    state.conversations.delete(&id).await?;
    Ok(ApiResponse::timed(
        serde_json::json!({ "id": id, "deleted": true }),
        start,
    ))
}
