//! Baidu Qianfan (Wenxin Workshop) provider.
//!
//! Qianfan does not speak the OpenAI protocol: requests are authorized with
//! an OAuth access token in the query string, each model is served from
//! its own endpoint path, and errors arrive as `error_code` fields in
//! otherwise successful responses.

pub mod auth;
pub mod client;
pub mod embedding;
pub mod types;

use std::time::Duration;

use secrecy::SecretString;

use confab_types::llm::LlmError;
use confab_types::provider::{CredentialField, ModelConfig, ProviderKind};

pub use client::QianfanProvider;
pub use embedding::QianfanEmbedder;

use super::openai_compat::config::default_base_url;

const CHAT_PATH: &str = "/rpc/2.0/ai_custom/v1/wenxinworkshop/chat";
const EMBEDDING_PATH: &str = "/rpc/2.0/ai_custom/v1/wenxinworkshop/embeddings";

/// Default embedding endpoint when neither `endpoint` nor a known model is set.
const DEFAULT_EMBEDDING_ENDPOINT: &str = "embedding-v1";

pub struct QianfanConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub secret_key: SecretString,
    pub model: String,
    /// Path segment selecting the deployed model.
    pub endpoint: String,
    pub dimension: Option<u32>,
    pub timeout: Duration,
}

impl QianfanConfig {
    pub fn chat_url(&self) -> String {
        format!("{}{CHAT_PATH}/{}", self.base_url, self.endpoint)
    }

    pub fn embedding_url(&self) -> String {
        format!("{}{EMBEDDING_PATH}/{}", self.base_url, self.endpoint)
    }
}

fn missing(field: CredentialField) -> LlmError {
    LlmError::InvalidRequest(format!("missing required field '{field}'"))
}

/// Well-known chat model names and the endpoint path they are served from.
fn chat_endpoint(model: &str) -> String {
    match model {
        "ERNIE-Bot" | "ERNIE-Bot 3.5" | "ERNIE-3.5-8K" => "completions".to_string(),
        "ERNIE-Bot 4.0" | "ERNIE-4.0-8K" => "completions_pro".to_string(),
        "ERNIE-Bot-turbo" => "eb-instant".to_string(),
        "ERNIE-Speed-8K" => "ernie_speed".to_string(),
        other => other.to_lowercase(),
    }
}

fn embedding_endpoint(model: &str) -> String {
    match model {
        "" | "Embedding-V1" => DEFAULT_EMBEDDING_ENDPOINT.to_string(),
        "bge-large-zh" | "bge-large-en" | "tao-8k" => model.to_string(),
        other => other.to_lowercase(),
    }
}

/// Resolve a validated Qianfan [`ModelConfig`].
///
/// An explicit `endpoint` wins over the model-name lookup.
pub fn from_model_config(
    config: &ModelConfig,
    embedding: bool,
    timeout: Duration,
) -> Result<QianfanConfig, LlmError> {
    let api_key = config
        .credential(CredentialField::ApiKey)
        .ok_or_else(|| missing(CredentialField::ApiKey))?;
    let secret_key = config
        .credential(CredentialField::SecretKey)
        .ok_or_else(|| missing(CredentialField::SecretKey))?;

    let base_url = config
        .credential(CredentialField::BaseUrl)
        .or(default_base_url(ProviderKind::QFan))
        .ok_or_else(|| missing(CredentialField::BaseUrl))?
        .trim_end_matches('/')
        .to_string();
    reqwest::Url::parse(&base_url)
        .map_err(|e| LlmError::InvalidRequest(format!("invalid base url '{base_url}': {e}")))?;

    let configured = config
        .endpoint
        .as_deref()
        .map(|e| e.trim_matches('/'))
        .filter(|e| !e.trim().is_empty());
    let endpoint = match configured {
        Some(endpoint) => endpoint.to_string(),
        None if embedding => embedding_endpoint(&config.model),
        None => chat_endpoint(&config.model),
    };

    Ok(QianfanConfig {
        base_url,
        api_key: SecretString::from(api_key.to_string()),
        secret_key: SecretString::from(secret_key.to_string()),
        model: config.model.clone(),
        endpoint,
        dimension: config.dimension,
        timeout,
    })
}

/// Token errors: the cached access token must be dropped.
pub(crate) fn is_token_error(code: i64) -> bool {
    matches!(code, 110 | 111)
}

/// Map a body-level `error_code` to an [`LlmError`].
pub(crate) fn map_error_code(code: i64, message: &str) -> LlmError {
    match code {
        110 | 111 | 6 | 14 => LlmError::AuthenticationFailed,
        4 | 17 | 18 | 336501 | 336502 => LlmError::RateLimited {
            retry_after_ms: None,
        },
        336007 | 336103 => LlmError::ContextLengthExceeded,
        336100 => LlmError::Overloaded(message.to_string()),
        336003 | 336104 => LlmError::InvalidRequest(message.to_string()),
        _ => LlmError::Provider {
            message: format!("qianfan error {code}: {message}"),
        },
    }
}

/// Map a non-success HTTP status to an [`LlmError`].
pub(crate) fn map_status(status: reqwest::StatusCode, body: String) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: None,
        },
        503 => LlmError::Overloaded(body),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {body}"),
        },
    }
}
