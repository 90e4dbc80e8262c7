//! LlmProvider trait definition.
//!
//! This is the uniform capability interface every chat backend implements.
//! Uses RPITIT for `complete`, and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use confab_types::llm::{CompletionRequest, CompletionResponse, LlmError, StreamEvent};

/// Boxed stream of provider events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for chat completion backends (OpenAI-compatible, Qianfan, ...).
///
/// Implementations live in confab-infra.
pub trait LlmProvider: Send + Sync {
    /// Provider tag this client was built for (e.g. "OPENAI").
    fn name(&self) -> &str;

    /// Model identifier requests default to.
    fn model(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request. Returns a stream of events
    /// ending in `StreamEvent::Done` on success.
    fn stream(&self, request: CompletionRequest) -> EventStream;
}
