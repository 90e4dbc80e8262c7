//! QianfanProvider -- [`LlmProvider`] for the Wenxin Workshop chat API.
//!
//! Streaming responses are SSE: each `data:` payload is a full
//! [`QianfanChatResponse`] carrying the next slice of `result`, and the
//! last one sets `is_end`.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use tracing::debug;

use confab_core::llm::provider::{EventStream, LlmProvider};
use confab_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, MessageRole, StopReason, StreamEvent, Usage,
};

use super::auth::QianfanAuth;
use super::types::{QianfanChatRequest, QianfanChatResponse, QianfanMessage};
use super::{QianfanConfig, is_token_error, map_error_code, map_status};
use crate::llm::openai_compat::http_client;

/// Does NOT derive Debug: holds the key pair through [`QianfanAuth`].
pub struct QianfanProvider {
    http: reqwest::Client,
    auth: QianfanAuth,
    url: String,
    model: String,
}

impl QianfanProvider {
    pub fn new(config: QianfanConfig) -> Result<Self, LlmError> {
        let http = http_client(config.timeout)?;
        let url = config.chat_url();
        let auth = QianfanAuth::new(
            http.clone(),
            config.base_url,
            config.api_key,
            config.secret_key,
        );
        Ok(Self {
            http,
            auth,
            url,
            model: config.model,
        })
    }
}

/// Convert a generic request into Qianfan's shape.
///
/// System messages fold into the top-level `system` field. Qianfan wants
/// strictly alternating user/assistant messages starting with a user
/// message, so consecutive same-role messages are joined and leading
/// assistant messages dropped.
fn build_request(request: &CompletionRequest, stream: bool) -> QianfanChatRequest {
    let mut system_parts: Vec<&str> = Vec::new();
    if let Some(system) = request.system.as_deref() {
        system_parts.push(system);
    }

    let mut messages: Vec<QianfanMessage> = Vec::new();
    for msg in &request.messages {
        let role = match msg.role {
            MessageRole::System => {
                system_parts.push(&msg.content);
                continue;
            }
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push('\n');
                last.content.push_str(&msg.content);
            }
            None if role == "assistant" => {}
            _ => messages.push(QianfanMessage {
                role,
                content: msg.content.clone(),
            }),
        }
    }

    QianfanChatRequest {
        messages,
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n")),
        stream,
        // Qianfan rejects 0; leave it to the server default instead.
        temperature: request.temperature.filter(|t| *t > 0.0),
        top_p: request.top_p,
        max_output_tokens: request.max_tokens,
    }
}

fn stop_reason(chunk: &QianfanChatResponse) -> StopReason {
    match chunk.finish_reason.as_deref() {
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => StopReason::ContentFilter,
        _ if chunk.is_truncated => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}

fn usage(chunk: &QianfanChatResponse) -> Option<Usage> {
    chunk.usage.as_ref().map(|u| Usage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    })
}

/// Turn a body-level error into `Err`, dropping the cached token when the
/// error says it is stale.
async fn check(auth: &QianfanAuth, chunk: QianfanChatResponse) -> Result<QianfanChatResponse, LlmError> {
    match chunk.error_code {
        Some(code) => {
            if is_token_error(code) {
                auth.invalidate().await;
            }
            Err(map_error_code(code, chunk.error_msg.as_deref().unwrap_or("")))
        }
        None => Ok(chunk),
    }
}

/// Events carried by one streamed payload, in emission order.
fn chunk_events(chunk: &QianfanChatResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    if let Some(text) = chunk.result.as_deref()
        && !text.is_empty()
    {
        events.push(StreamEvent::TextDelta {
            index: 0,
            text: text.to_string(),
        });
    }
    if chunk.is_end {
        events.push(StreamEvent::MessageDelta {
            stop_reason: stop_reason(chunk),
        });
        if let Some(usage) = usage(chunk) {
            events.push(StreamEvent::Usage(usage));
        }
    }
    events
}

async fn send(
    http: &reqwest::Client,
    auth: &QianfanAuth,
    url: &str,
    body: &QianfanChatRequest,
) -> Result<reqwest::Response, LlmError> {
    let token = auth.token().await?;
    let response = http
        .post(url)
        .query(&[("access_token", token.as_str())])
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::Provider {
            message: format!("HTTP request failed: {e}"),
        })?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        return Err(map_status(status, error_body));
    }
    Ok(response)
}

fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream"))
}

impl LlmProvider for QianfanProvider {
    fn name(&self) -> &str {
        "qianfan"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = build_request(request, false);
        let response = send(&self.http, &self.auth, &self.url, &body).await?;

        let chunk: QianfanChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;
        let chunk = check(&self.auth, chunk).await?;

        Ok(CompletionResponse {
            id: chunk.id.clone().unwrap_or_default(),
            content: chunk.result.clone().unwrap_or_default(),
            model: self.model.clone(),
            stop_reason: stop_reason(&chunk),
            usage: usage(&chunk).unwrap_or_default(),
        })
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        let body = build_request(&request, true);
        let http = self.http.clone();
        let auth = self.auth.clone();
        let url = self.url.clone();

        Box::pin(async_stream::try_stream! {
            let response = send(&http, &auth, &url, &body).await?;

            // Errors come back as a plain JSON body even on streaming calls.
            if !is_event_stream(&response) {
                let chunk: QianfanChatResponse = response
                    .json()
                    .await
                    .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;
                let chunk = check(&auth, chunk).await?;
                yield StreamEvent::Connected;
                for event in chunk_events(&chunk) {
                    yield event;
                }
                yield StreamEvent::Done;
                return;
            }

            yield StreamEvent::Connected;

            let mut events = response.bytes_stream().eventsource();
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| LlmError::Stream(e.to_string()))?;
                if event.data.trim().is_empty() {
                    continue;
                }
                let chunk: QianfanChatResponse = serde_json::from_str(&event.data)
                    .map_err(|e| LlmError::Deserialization(format!("invalid stream payload: {e}")))?;
                let chunk = check(&auth, chunk).await?;

                for event in chunk_events(&chunk) {
                    yield event;
                }
                if chunk.is_end {
                    debug!(id = chunk.id.as_deref().unwrap_or(""), "qianfan stream finished");
                    yield StreamEvent::Done;
                    break;
                }
            }
        })
    }
}
