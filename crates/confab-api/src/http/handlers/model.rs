//! Model configuration handlers.
//!
//! Secrets are always returned masked. Writes invalidate cached clients
//! before the response is sent.
//!
//! Endpoints:
//! - GET    /api/v1/models?type=CHAT          - List configs
//! - POST   /api/v1/models                    - Create a config
//! - GET    /api/v1/models/{id}               - Get a config
//! - PUT    /api/v1/models/{id}               - Replace a config
//! - DELETE /api/v1/models/{id}               - Delete a config
//! - GET    /api/v1/models/{id}/capabilities  - Capability report
//! - POST   /api/v1/models/{id}/probe         - Live round trip

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use confab_core::service::model_config::{CapabilityReport, ProbeReport};
use confab_types::provider::{ModelConfig, ModelType};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ModelListQuery {
    #[serde(rename = "type", default)]
    pub model_type: Option<String>,
}

/// GET /api/v1/models
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelListQuery>,
) -> Result<ApiResponse<Vec<ModelConfig>>, AppError> {
    let start = Instant::now();
    let model_type = query
        .model_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(str::parse::<ModelType>)
        .transpose()
        .map_err(AppError::Validation)?;
    let models = state.models.list(model_type).await?;
    Ok(ApiResponse::timed(models, start))
}

/// POST /api/v1/models
pub async fn create_model(
    State(state): State<AppState>,
    Json(body): Json<ModelConfig>,
) -> Result<ApiResponse<ModelConfig>, AppError> {
    let start = Instant::now();
    let model = state.models.create(body).await?;
    Ok(ApiResponse::timed(model, start))
}

/// GET /api/v1/models/{id}
pub async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<ModelConfig>, AppError> {
    let start = Instant::now();
    let model = state.models.get(&id).await?;
    Ok(ApiResponse::timed(model, start))
}

/// PUT /api/v1/models/{id}
pub async fn update_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut body): Json<ModelConfig>,
) -> Result<ApiResponse<ModelConfig>, AppError> {
    let start = Instant::now();
    body.id = id;
    let model = state.models.update(body).await?;
    Ok(ApiResponse::timed(model, start))
}

/// DELETE /api/v1/models/{id}
pub async fn delete_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let start = Instant::now();
    state.models.delete(&id).await?;
    Ok(ApiResponse::timed(
        serde_json::json!({ "id": id, "deleted": true }),
        start,
    ))
}

/// GET /api/v1/models/{id}/capabilities
pub async fn capabilities(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<CapabilityReport>, AppError> {
    let start = Instant::now();
    let report = state.models.capabilities(&id)?;
    Ok(ApiResponse::timed(report, start))
}

/// POST /api/v1/models/{id}/probe
pub async fn probe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<ProbeReport>, AppError> {
    let start = Instant::now();
    let report = state.models.probe(&id).await?;
    Ok(ApiResponse::timed(report, start))
}
