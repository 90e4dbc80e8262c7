//! Chat endpoints.
//!
//! - POST   /api/v1/chat/completions               - SSE streaming chat
//! - POST   /api/v1/chat/text                      - Non-streaming chat
//! - POST   /api/v1/chat/derive/{kind}             - Mind map / summary
//! - GET    /api/v1/chat/messages/{conversation_id} - Recent turns
//! - DELETE /api/v1/chat/messages/{conversation_id} - Clear turns
//!
//! SSE event types:
//! - `session`: first event, `{ "conversation_id": "..." }`
//! - `text_delta`: incremental text, `{ "text": "..." }`
//! - `done`: token usage and timing
//! - `error`: `{ "message": "..." }`
//!
//! Dropping the response body (client disconnect) drops the fragment
//! receiver, which cancels generation.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::Json;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;
use tracing::{Instrument, debug, info_span};

use confab_core::chat::ChatStream;
use confab_observe::genai_attrs::{
    GEN_AI_USAGE_INPUT_TOKENS, GEN_AI_USAGE_OUTPUT_TOKENS, OP_CHAT, OP_DERIVE,
};
use confab_types::chat::{ChatRequest, ConversationTurn, DeriveKind, StreamFragment, TextReply};

use crate::http::error::AppError;
use crate::http::extractors::UserContext;
use crate::http::response::ApiResponse;
use crate::state::AppState;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Encode one fragment as an SSE event.
fn fragment_event(fragment: &StreamFragment) -> Event {
    match fragment {
        StreamFragment::Text { text } => Event::default()
            .event("text_delta")
            .data(serde_json::json!({ "text": text }).to_string()),
        StreamFragment::Done {
            prompt_tokens,
            completion_tokens,
            total_tokens,
            elapsed_ms,
        } => Event::default().event("done").data(
            serde_json::json!({
                "prompt_tokens": prompt_tokens,
                "completion_tokens": completion_tokens,
                "total_tokens": total_tokens,
                "elapsed_ms": elapsed_ms,
            })
            .to_string(),
        ),
        StreamFragment::Error { message } => Event::default()
            .event("error")
            .data(serde_json::json!({ "message": message }).to_string()),
    }
}

/// POST /api/v1/chat/completions
pub async fn stream_chat(
    State(state): State<AppState>,
    user: UserContext,
    Json(mut body): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if body.message.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }
    body.user_id = user.user_id;

    let ChatStream {
        conversation_id,
        mut fragments,
        task,
    } = state.orchestrator.chat(body);

    let span = info_span!(
        "http.chat",
        gen_ai.operation.name = OP_CHAT,
        conversation_id = %conversation_id,
        gen_ai.usage.input_tokens = tracing::field::Empty,
        gen_ai.usage.output_tokens = tracing::field::Empty,
    );

    let sse_stream = async_stream::stream! {
        let session = serde_json::json!({ "conversation_id": conversation_id });
        yield Ok::<_, Infallible>(Event::default().event("session").data(session.to_string()));

        while let Some(fragment) = fragments.recv().await {
            if let StreamFragment::Done { prompt_tokens, completion_tokens, .. } = &fragment {
                span.record(GEN_AI_USAGE_INPUT_TOKENS, *prompt_tokens);
                span.record(GEN_AI_USAGE_OUTPUT_TOKENS, *completion_tokens);
            }
            yield Ok(fragment_event(&fragment));
        }

        match task.instrument(span.clone()).await {
            Ok(outcome) => debug!(parent: &span, ?outcome, "chat stream closed"),
            Err(e) => debug!(parent: &span, error = %e, "chat task ended abnormally"),
        }
    };

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE)))
}

/// POST /api/v1/chat/text
pub async fn text_chat(
    State(state): State<AppState>,
    user: UserContext,
    Json(mut body): Json<ChatRequest>,
) -> Result<ApiResponse<TextReply>, AppError> {
    let start = Instant::now();
    body.user_id = user.user_id;

    let span = info_span!(
        "http.chat_text",
        gen_ai.operation.name = OP_CHAT,
        gen_ai.usage.input_tokens = tracing::field::Empty,
        gen_ai.usage.output_tokens = tracing::field::Empty,
    );
    let reply = state.orchestrator.text(body).instrument(span.clone()).await?;
    span.record(GEN_AI_USAGE_INPUT_TOKENS, reply.prompt_tokens);
    span.record(GEN_AI_USAGE_OUTPUT_TOKENS, reply.completion_tokens);

    Ok(ApiResponse::timed(reply, start))
}

#[derive(Debug, Deserialize)]
pub struct DeriveRequest {
    pub text: String,
    #[serde(default)]
    pub model_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeriveResponse {
    pub kind: DeriveKind,
    pub text: String,
}

/// POST /api/v1/chat/derive/{kind}
pub async fn derive(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<DeriveRequest>,
) -> Result<ApiResponse<DeriveResponse>, AppError> {
    let start = Instant::now();
    let kind: DeriveKind = kind.parse().map_err(AppError::Validation)?;

    let span = info_span!("http.derive", gen_ai.operation.name = OP_DERIVE, %kind);
    let text = state
        .orchestrator
        .derive(kind, &body.text, body.model_id.as_deref())
        .instrument(span)
        .await?;

    Ok(ApiResponse::timed(DeriveResponse { kind, text }, start))
}

/// GET /api/v1/chat/messages/{conversation_id}
///
/// Also seeds the conversation's memory window with the returned turns.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<ApiResponse<Vec<ConversationTurn>>, AppError> {
    let start = Instant::now();
    let turns = state.conversations.history(&conversation_id).await?;
    Ok(ApiResponse::timed(turns, start))
}

/// DELETE /api/v1/chat/messages/{conversation_id}
pub async fn clear_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let start = Instant::now();
    state.conversations.clear(&conversation_id).await?;
    Ok(ApiResponse::timed(
        serde_json::json!({ "conversation_id": conversation_id, "cleared": true }),
        start,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_event_names() {
        // Event has no getters; its Debug output carries the encoded frame.
        let text = format!("{:?}", fragment_event(&StreamFragment::Text { text: "hi".into() }));
        assert!(text.contains("text_delta"));

        let done = format!(
            "{:?}",
            fragment_event(&StreamFragment::Done {
                prompt_tokens: 1,
                completion_tokens: 2,
                total_tokens: 3,
                elapsed_ms: 4,
            })
        );
        assert!(done.contains("done"));
        assert!(done.contains("total_tokens"));

        let error = format!("{:?}", fragment_event(&StreamFragment::Error { message: "boom".into() }));
        assert!(error.contains("boom"));
    }
}
