//! OpenAI-compatible chat provider.
//!
//! A single [`OpenAiCompatibleProvider`] serves every provider family that
//! speaks the OpenAI chat completions protocol: OpenAI, Azure OpenAI,
//! Gemini, Ollama, Claude, Qwen, Zhipu, Yi, Doubao, DeepSeek, SiliconFlow
//! and Spark. Only the base URL (and for Azure, the auth scheme) differs.
//!
//! Uses [`async_openai`] for type-safe request/response handling and
//! built-in SSE streaming.

pub mod config;
pub mod embedding;
pub mod streaming;

use async_openai::Client;
use async_openai::config::{AzureConfig, Config, OpenAIConfig};
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionStreamOptions,
    CreateChatCompletionRequest, FinishReason,
};
use futures_util::StreamExt;
use secrecy::ExposeSecret;

use confab_core::llm::provider::{EventStream, LlmProvider};
use confab_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, MessageRole, StopReason, Usage,
};

use self::config::{AZURE_API_VERSION, OpenAiCompatConfig};
use self::streaming::map_openai_stream;

/// Chat client for any OpenAI-compatible API.
///
/// Generic over the async-openai [`Config`] so the same code serves plain
/// bearer-token endpoints ([`OpenAIConfig`]) and Azure deployments
/// ([`AzureConfig`]).
///
/// Does NOT derive Debug: the client holds the API key.
pub struct OpenAiCompatibleProvider<C: Config = OpenAIConfig> {
    client: Client<C>,
    provider_name: String,
    model: String,
    legacy_max_tokens: bool,
}

/// HTTP client shared by the async-openai clients, with the configured
/// request timeout.
pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::InvalidRequest(format!("failed to create HTTP client: {e}")))
}

pub(crate) fn openai_client(config: &OpenAiCompatConfig) -> Result<Client<OpenAIConfig>, LlmError> {
    let openai_config = OpenAIConfig::new()
        .with_api_key(config.api_key.expose_secret())
        .with_api_base(&config.base_url);
    Ok(Client::with_config(openai_config).with_http_client(http_client(config.timeout)?))
}

pub(crate) fn azure_client(config: &OpenAiCompatConfig) -> Result<Client<AzureConfig>, LlmError> {
    let deployment = config.azure_deployment.as_deref().ok_or_else(|| {
        LlmError::InvalidRequest("missing required field 'azureDeploymentName'".to_string())
    })?;
    let azure_config = AzureConfig::new()
        .with_api_base(&config.base_url)
        .with_api_version(AZURE_API_VERSION)
        .with_deployment_id(deployment)
        .with_api_key(config.api_key.expose_secret());
    Ok(Client::with_config(azure_config).with_http_client(http_client(config.timeout)?))
}

impl OpenAiCompatibleProvider<OpenAIConfig> {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: openai_client(&config)?,
            provider_name: config.provider_name,
            model: config.model,
            legacy_max_tokens: config.legacy_max_tokens,
        })
    }
}

impl OpenAiCompatibleProvider<AzureConfig> {
    /// Azure deployment at `{base_url}/openai/deployments/{deployment}`.
    pub fn azure(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: azure_client(&config)?,
            provider_name: config.provider_name,
            model: config.model,
            legacy_max_tokens: config.legacy_max_tokens,
        })
    }
}

/// Build a [`CreateChatCompletionRequest`] from a generic [`CompletionRequest`].
fn build_request(
    request: &CompletionRequest,
    default_model: &str,
    legacy_max_tokens: bool,
    stream: bool,
) -> CreateChatCompletionRequest {
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

    if let Some(ref system) = request.system {
        messages.push(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(system.clone()),
                name: None,
            },
        ));
    }

    for msg in &request.messages {
        let oai_msg = match msg.role {
            MessageRole::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            MessageRole::User => {
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            MessageRole::Assistant => {
                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    refusal: None,
                    name: None,
                    audio: None,
                    tool_calls: None,
                    function_call: None,
                })
            }
        };
        messages.push(oai_msg);
    }

    let model = if request.model.is_empty() {
        default_model.to_string()
    } else {
        request.model.clone()
    };

    #[allow(deprecated)]
    let mut req = CreateChatCompletionRequest {
        model,
        messages,
        temperature: request.temperature.map(|t| t as f32),
        top_p: request.top_p.map(|p| p as f32),
        ..Default::default()
    };
    if legacy_max_tokens {
        #[allow(deprecated)]
        {
            req.max_tokens = request.max_tokens;
        }
    } else {
        req.max_completion_tokens = request.max_tokens;
    }

    if stream {
        req.stream = Some(true);
        req.stream_options = Some(ChatCompletionStreamOptions {
            include_usage: Some(true),
            include_obfuscation: None,
        });
    }

    req
}

pub(crate) fn map_finish_reason(reason: &FinishReason) -> StopReason {
    match reason {
        FinishReason::Length => StopReason::MaxTokens,
        FinishReason::ContentFilter => StopReason::ContentFilter,
        FinishReason::Stop | FinishReason::ToolCalls | FinishReason::FunctionCall => {
            StopReason::EndTurn
        }
    }
}

impl<C> LlmProvider for OpenAiCompatibleProvider<C>
where
    C: Config + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let oai_request = build_request(request, &self.model, self.legacy_max_tokens, false);

        let response = self
            .client
            .chat()
            .create(oai_request)
            .await
            .map_err(map_openai_error)?;

        let choice = response.choices.first();
        let content = choice
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let stop_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .map(map_finish_reason)
            .unwrap_or(StopReason::EndTurn);
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: response.id,
            content,
            model: response.model,
            stop_reason,
            usage,
        })
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        let oai_request = build_request(&request, &self.model, self.legacy_max_tokens, true);
        let client = self.client.clone();

        Box::pin(async_stream::try_stream! {
            let oai_stream = client
                .chat()
                .create_stream(oai_request)
                .await
                .map_err(map_openai_error)?;

            let mut inner = map_openai_stream(oai_stream);
            while let Some(event) = inner.next().await {
                yield event?;
            }
        })
    }
}

/// Map an `async_openai::error::OpenAIError` to an [`LlmError`].
pub(crate) fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "invalid_api_key"
                || error_type == "authentication_error"
                || api_err.message.contains("Incorrect API key")
                || api_err.message.contains("Invalid API key")
            {
                LlmError::AuthenticationFailed
            } else if code == "rate_limit_exceeded" || error_type == "rate_limit_error" {
                LlmError::RateLimited {
                    retry_after_ms: None,
                }
            } else if code == "context_length_exceeded"
                || api_err.message.contains("maximum context length")
            {
                LlmError::ContextLengthExceeded
            } else if code == "server_error" || error_type == "overloaded_error" {
                LlmError::Overloaded(api_err.message.clone())
            } else {
                LlmError::Provider {
                    message: err.to_string(),
                }
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status().map(|s| s.as_u16()) {
            Some(401) | Some(403) => LlmError::AuthenticationFailed,
            Some(429) => LlmError::RateLimited {
                retry_after_ms: None,
            },
            Some(503) | Some(529) => LlmError::Overloaded(err.to_string()),
            _ => LlmError::Provider {
                message: err.to_string(),
            },
        },
        OpenAIError::JSONDeserialize(_, content) => {
            LlmError::Deserialization(format!("failed to parse response: {content}"))
        }
        OpenAIError::StreamError(stream_err) => LlmError::Stream(stream_err.to_string()),
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Provider {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use confab_types::llm::Message;
    use confab_types::provider::{ModelConfig, ProviderKind};

    fn request(messages: Vec<Message>, system: Option<&str>) -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4o".to_string(),
            messages,
            system: system.map(str::to_string),
            max_tokens: Some(1024),
            temperature: Some(0.7),
            top_p: None,
            stream: false,
        }
    }

    #[test]
    fn test_build_request_messages() {
        let req = request(
            vec![
                Message::new(MessageRole::User, "Hello"),
                Message::new(MessageRole::Assistant, "Hi there!"),
            ],
            Some("Be helpful"),
        );
        let oai_req = build_request(&req, "gpt-4o", false, false);
        assert_eq!(oai_req.model, "gpt-4o");
        assert_eq!(oai_req.messages.len(), 3);
        assert_eq!(oai_req.max_completion_tokens, Some(1024));
        assert!(oai_req.stream.is_none());
        assert!(oai_req.stream_options.is_none());
    }

    #[test]
    #[allow(deprecated)]
    fn test_build_request_legacy_max_tokens() {
        let req = request(vec![Message::new(MessageRole::User, "Hello")], None);
        let oai_req = build_request(&req, "deepseek-chat", true, false);
        assert_eq!(oai_req.max_tokens, Some(1024));
        assert!(oai_req.max_completion_tokens.is_none());
    }

    #[test]
    fn test_build_request_streaming_requests_usage() {
        let req = request(vec![Message::new(MessageRole::User, "Hello")], None);
        let oai_req = build_request(&req, "gpt-4o", false, true);
        assert_eq!(oai_req.stream, Some(true));
        let opts = oai_req.stream_options.unwrap();
        assert_eq!(opts.include_usage, Some(true));
    }

    #[test]
    fn test_build_request_empty_model_uses_default() {
        let mut req = request(vec![], None);
        req.model = String::new();
        let oai_req = build_request(&req, "gpt-4o-mini", false, false);
        assert_eq!(oai_req.model, "gpt-4o-mini");
    }

    #[test]
    fn test_provider_name_from_kind() {
        let mut cfg = ModelConfig::new("m1", "ZHIPU", "glm-4-flash");
        cfg.api_key = Some("key".to_string());
        let resolved =
            config::from_model_config(ProviderKind::Zhipu, &cfg, Duration::from_secs(5)).unwrap();
        let provider = OpenAiCompatibleProvider::new(resolved).unwrap();
        assert_eq!(provider.name(), "zhipu");
        assert_eq!(provider.model(), "glm-4-flash");
    }

    #[test]
    fn test_map_finish_reason() {
        assert_eq!(map_finish_reason(&FinishReason::Length), StopReason::MaxTokens);
        assert_eq!(
            map_finish_reason(&FinishReason::ContentFilter),
            StopReason::ContentFilter
        );
        assert_eq!(map_finish_reason(&FinishReason::Stop), StopReason::EndTurn);
    }

    #[test]
    fn test_map_openai_error_api_auth() {
        use async_openai::error::{ApiError, OpenAIError};
        let api_err = ApiError {
            message: "Incorrect API key provided".to_string(),
            r#type: Some("authentication_error".to_string()),
            param: None,
            code: None,
        };
        let err = map_openai_error(OpenAIError::ApiError(api_err));
        assert!(matches!(err, LlmError::AuthenticationFailed));
    }

    #[test]
    fn test_map_openai_error_context_length() {
        use async_openai::error::{ApiError, OpenAIError};
        let api_err = ApiError {
            message: "This model's maximum context length is 8192 tokens".to_string(),
            r#type: None,
            param: None,
            code: Some("context_length_exceeded".to_string()),
        };
        let err = map_openai_error(OpenAIError::ApiError(api_err));
        assert!(matches!(err, LlmError::ContextLengthExceeded));
    }

    #[test]
    fn test_map_openai_error_invalid_argument() {
        use async_openai::error::OpenAIError;
        let err = map_openai_error(OpenAIError::InvalidArgument("bad arg".to_string()));
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }
}
