//! Access token exchange for Qianfan.
//!
//! Qianfan authenticates with an API key / secret key pair traded for a
//! short-lived access token. The token is cached until shortly before it
//! expires and shared by every request made through one client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::debug;

use confab_types::llm::LlmError;

use super::types::TokenResponse;

/// Refresh this long before the advertised expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

/// Shared token source. Clones share one cache.
#[derive(Clone)]
pub struct QianfanAuth {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    secret_key: SecretString,
    cached: Arc<Mutex<Option<CachedToken>>>,
}

impl QianfanAuth {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        api_key: SecretString,
        secret_key: SecretString,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            secret_key,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// A valid access token, fetching a fresh one when the cache is empty
    /// or about to expire. Concurrent callers wait on a single fetch.
    pub async fn token(&self) -> Result<String, LlmError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref()
            && Instant::now() < entry.expires_at
        {
            return Ok(entry.token.expose_secret().to_string());
        }

        let fetched = self.fetch().await?;
        let token = fetched.token.expose_secret().to_string();
        *cached = Some(fetched);
        Ok(token)
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(&self) -> Result<CachedToken, LlmError> {
        let url = format!("{}/oauth/2.0/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.api_key.expose_secret()),
                ("client_secret", self.secret_key.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("token request failed: {e}"),
            })?;

        let status = response.status();
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse token response: {e}")))?;

        parse_token(status, body)
    }
}

fn parse_token(status: reqwest::StatusCode, body: TokenResponse) -> Result<CachedToken, LlmError> {
    if let Some(error) = body.error {
        debug!(
            status = status.as_u16(),
            error = %error,
            description = body.error_description.as_deref().unwrap_or(""),
            "qianfan token request rejected"
        );
        return Err(LlmError::AuthenticationFailed);
    }

    let token = body.access_token.ok_or_else(|| LlmError::Provider {
        message: format!("token response (HTTP {status}) carried no access_token"),
    })?;
    let lifetime = Duration::from_secs(body.expires_in.unwrap_or(0));

    Ok(CachedToken {
        token: SecretString::from(token),
        expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
    })
}
