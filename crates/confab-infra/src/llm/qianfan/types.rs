//! Baidu Qianfan (Wenxin Workshop) wire types.
//!
//! Qianfan reports most failures in a 200 response body carrying
//! `error_code`/`error_msg`, so every response type keeps those fields.

use serde::{Deserialize, Serialize};

/// Response of the OAuth client-credentials endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QianfanMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QianfanChatRequest {
    pub messages: Vec<QianfanMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QianfanUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

/// Body of a chat response, and of each SSE `data:` payload when streaming.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QianfanChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub is_end: bool,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<QianfanUsage>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QianfanEmbeddingRequest<'a> {
    pub input: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
pub struct QianfanEmbeddingData {
    pub embedding: Vec<f32>,
    pub index: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QianfanEmbeddingResponse {
    #[serde(default)]
    pub data: Vec<QianfanEmbeddingData>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_msg: Option<String>,
}
