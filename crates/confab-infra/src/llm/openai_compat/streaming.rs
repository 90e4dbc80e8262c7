//! OpenAI SSE stream to [`StreamEvent`] adapter.
//!
//! Maps `async-openai`'s [`ChatCompletionResponseStream`] chunks to the
//! provider-agnostic [`StreamEvent`] enum defined in `confab-types`.

use futures_util::StreamExt;

use async_openai::types::chat::{ChatCompletionResponseStream, CreateChatCompletionStreamResponse};

use confab_core::llm::provider::EventStream;
use confab_types::llm::{LlmError, StreamEvent, Usage};

use super::map_finish_reason;

/// Map an async-openai [`ChatCompletionResponseStream`] to [`StreamEvent`]s.
///
/// Order of emitted events:
/// 1. `Connected` on entry
/// 2. `TextDelta` for each non-empty content chunk
/// 3. `MessageDelta` when a finish_reason arrives
/// 4. `Usage` from the trailing usage chunk (requires `stream_options.include_usage`)
/// 5. `Done` when the upstream stream ends
pub fn map_openai_stream(stream: ChatCompletionResponseStream) -> EventStream {
    Box::pin(async_stream::try_stream! {
        yield StreamEvent::Connected;

        let mut stream = stream;
        while let Some(result) = stream.next().await {
            let chunk = result.map_err(|e| LlmError::Stream(e.to_string()))?;
            for event in chunk_events(chunk) {
                yield event;
            }
        }

        yield StreamEvent::Done;
    })
}

/// Events carried by one stream chunk, in emission order.
fn chunk_events(chunk: CreateChatCompletionStreamResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    for choice in chunk.choices {
        if let Some(text) = choice.delta.content
            && !text.is_empty()
        {
            events.push(StreamEvent::TextDelta {
                index: choice.index,
                text,
            });
        }
        if let Some(reason) = choice.finish_reason.as_ref() {
            events.push(StreamEvent::MessageDelta {
                stop_reason: map_finish_reason(reason),
            });
        }
    }

    // The final chunk carries usage with an empty choices array.
    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage(Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }));
    }

    events
}
