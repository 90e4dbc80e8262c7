//! App profile CRUD handlers.
//!
//! Endpoints:
//! - GET    /api/v1/apps      - List profiles
//! - POST   /api/v1/apps      - Create a profile
//! - GET    /api/v1/apps/{id} - Get a profile and seed its prompt
//! - PUT    /api/v1/apps/{id} - Replace a profile
//! - DELETE /api/v1/apps/{id} - Delete a profile

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use confab_types::app::AppProfile;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OpenAppQuery {
    /// Conversation to seed with the app's prompt. Defaults to the app id.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// GET /api/v1/apps
pub async fn list_apps(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<AppProfile>>, AppError> {
    let start = Instant::now();
    let apps = state.apps.list().await?;
    Ok(ApiResponse::timed(apps, start))
}

/// POST /api/v1/apps
pub async fn create_app(
    State(state): State<AppState>,
    Json(body): Json<AppProfile>,
) -> Result<ApiResponse<AppProfile>, AppError> {
    let start = Instant::now();
    let app = state.apps.create(body).await?;
    Ok(ApiResponse::timed(app, start))
}

/// GET /api/v1/apps/{id}
///
/// Opening an app starts the target conversation's window afresh with the
/// app's system prompt.
pub async fn get_app(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OpenAppQuery>,
) -> Result<ApiResponse<AppProfile>, AppError> {
    let start = Instant::now();
    let app = state.apps.get(&id).await?;

    if let Some(prompt) = app.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        let conversation_id = query
            .conversation_id
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| app.id.clone());
        state.conversations.seed_prompt(&conversation_id, prompt).await;
    }

    Ok(ApiResponse::timed(app, start))
}

/// PUT /api/v1/apps/{id}
pub async fn update_app(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut body): Json<AppProfile>,
) -> Result<ApiResponse<AppProfile>, AppError> {
    let start = Instant::now();
    body.id = id;
    let app = state.apps.update(body).await?;
    Ok(ApiResponse::timed(app, start))
}

/// DELETE /api/v1/apps/{id}
pub async fn delete_app(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let start = Instant::now();
    state.apps.delete(&id).await?;
    Ok(ApiResponse::timed(
        serde_json::json!({ "id": id, "deleted": true }),
        start,
    ))
}
