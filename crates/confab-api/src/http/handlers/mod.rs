//! HTTP request handlers for the REST API.

pub mod app;
pub mod chat;
pub mod conversation;
pub mod model;

use axum::Json;
use serde_json::{Value, json};

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
