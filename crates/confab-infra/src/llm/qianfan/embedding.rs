//! Qianfan embeddings.

use confab_core::llm::embedder::Embedder;
use confab_types::llm::LlmError;

use super::auth::QianfanAuth;
use super::types::{QianfanEmbeddingRequest, QianfanEmbeddingResponse};
use super::{QianfanConfig, is_token_error, map_error_code, map_status};
use crate::llm::openai_compat::http_client;

/// Inputs accepted per request by the embedding endpoints.
const MAX_BATCH: usize = 16;

pub struct QianfanEmbedder {
    http: reqwest::Client,
    auth: QianfanAuth,
    url: String,
    model: String,
    dimension: Option<u32>,
}

impl QianfanEmbedder {
    pub fn new(config: QianfanConfig) -> Result<Self, LlmError> {
        let http = http_client(config.timeout)?;
        let url = config.embedding_url();
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
            dimension: config.dimension,
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let token = self.auth.token().await?;
        let response = self
            .http
            .post(&self.url)
            .query(&[("access_token", token.as_str())])
            .json(&QianfanEmbeddingRequest { input: batch })
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

        let body: QianfanEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        if let Some(code) = body.error_code {
            if is_token_error(code) {
                self.auth.invalidate().await;
            }
            return Err(map_error_code(code, body.error_msg.as_deref().unwrap_or("")));
        }

        into_vectors(body, batch.len())
    }
}

fn into_vectors(body: QianfanEmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    let mut data = body.data;
    if data.len() != expected {
        return Err(LlmError::Deserialization(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

impl Embedder for QianfanEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<u32> {
        self.dimension
    }
}
