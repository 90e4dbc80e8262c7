//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`, plus an unversioned `/health`.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Chat
        .route("/chat/completions", post(handlers::chat::stream_chat))
        .route("/chat/text", post(handlers::chat::text_chat))
        .route("/chat/derive/{kind}", post(handlers::chat::derive))
        .route(
            "/chat/messages/{conversation_id}",
            get(handlers::chat::get_messages).delete(handlers::chat::clear_messages),
        )
        // Conversations
        .route(
            "/conversations",
            get(handlers::conversation::list_conversations)
                .post(handlers::conversation::create_conversation),
        )
        .route(
            "/conversations/{id}",
            patch(handlers::conversation::rename_conversation)
                .delete(handlers::conversation::delete_conversation),
        )
        // Apps
        .route(
            "/apps",
            get(handlers::app::list_apps).post(handlers::app::create_app),
        )
        .route(
            "/apps/{id}",
            get(handlers::app::get_app)
                .put(handlers::app::update_app)
                .delete(handlers::app::delete_app),
        )
        // Models
        .route(
            "/models",
            get(handlers::model::list_models).post(handlers::model::create_model),
        )
        .route(
            "/models/{id}",
            get(handlers::model::get_model)
                .put(handlers::model::update_model)
                .delete(handlers::model::delete_model),
        )
        .route(
            "/models/{id}/capabilities",
            get(handlers::model::capabilities),
        )
        .route("/models/{id}/probe", post(handlers::model::probe))
        .with_state(state);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
