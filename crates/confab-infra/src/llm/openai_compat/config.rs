//! Connection settings for providers that speak the OpenAI protocol.
//!
//! Each [`ProviderKind`] served by the OpenAI-compatible adapter has a
//! default base URL; a config's `base_url` overrides it. Azure and Ollama
//! derive their URL from `base_url` instead.

use std::time::Duration;

use secrecy::SecretString;

use confab_types::llm::LlmError;
use confab_types::provider::{CredentialField, ModelConfig, ProviderKind};

/// Azure OpenAI REST API version sent as the `api-version` query param.
pub const AZURE_API_VERSION: &str = "2024-10-21";

/// Where and how to reach one OpenAI-compatible endpoint.
pub struct OpenAiCompatConfig {
    pub provider_name: String,
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    /// Azure deployment; selects Azure-style URLs and auth when set.
    pub azure_deployment: Option<String>,
    /// Send `max_tokens` instead of `max_completion_tokens`. Most
    /// non-OpenAI backends only understand the older field.
    pub legacy_max_tokens: bool,
    /// Requested embedding size, for models that support truncation.
    pub dimension: Option<u32>,
    pub timeout: Duration,
}

/// Default API base for providers with a fixed public endpoint.
///
/// `None` for providers whose base must come from the config.
pub fn default_base_url(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::OpenAi => Some("https://api.openai.com/v1"),
        ProviderKind::Gemini => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        ProviderKind::Claude => Some("https://api.anthropic.com/v1"),
        ProviderKind::QWen => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
        ProviderKind::Zhipu => Some("https://open.bigmodel.cn/api/paas/v4"),
        ProviderKind::Yi => Some("https://api.lingyiwanwu.com/v1"),
        ProviderKind::Douyin => Some("https://ark.cn-beijing.volces.com/api/v3"),
        ProviderKind::Deepseek => Some("https://api.deepseek.com/v1"),
        ProviderKind::Silicon => Some("https://api.siliconflow.cn/v1"),
        ProviderKind::Spark => Some("https://spark-api-open.xf-yun.com/v1"),
        ProviderKind::QFan => Some("https://aip.baidubce.com"),
        ProviderKind::AzureOpenAi | ProviderKind::Ollama => None,
    }
}

fn missing(field: CredentialField) -> LlmError {
    LlmError::InvalidRequest(format!("missing required field '{field}'"))
}

/// Resolve a validated [`ModelConfig`] into connection settings.
///
/// Fails only on values that cannot form a usable URL; credential
/// presence has already been checked by the provider catalog.
pub fn from_model_config(
    kind: ProviderKind,
    config: &ModelConfig,
    timeout: Duration,
) -> Result<OpenAiCompatConfig, LlmError> {
    let configured = config.credential(CredentialField::BaseUrl);

    let base_url = match kind {
        ProviderKind::Ollama => {
            let base = configured.ok_or_else(|| missing(CredentialField::BaseUrl))?;
            let base = base.trim_end_matches('/');
            if base.ends_with("/v1") {
                base.to_string()
            } else {
                format!("{base}/v1")
            }
        }
        ProviderKind::AzureOpenAi => configured
            .ok_or_else(|| missing(CredentialField::BaseUrl))?
            .trim_end_matches('/')
            .to_string(),
        _ => configured
            .or(default_base_url(kind))
            .ok_or_else(|| missing(CredentialField::BaseUrl))?
            .trim_end_matches('/')
            .to_string(),
    };
    reqwest::Url::parse(&base_url)
        .map_err(|e| LlmError::InvalidRequest(format!("invalid base url '{base_url}': {e}")))?;

    let azure_deployment = match kind {
        ProviderKind::AzureOpenAi => Some(
            config
                .credential(CredentialField::AzureDeploymentName)
                .ok_or_else(|| missing(CredentialField::AzureDeploymentName))?
                .to_string(),
        ),
        _ => None,
    };

    // Ollama runs without authentication; async-openai still wants a key.
    let api_key = config
        .credential(CredentialField::ApiKey)
        .unwrap_or("ollama")
        .to_string();

    Ok(OpenAiCompatConfig {
        provider_name: kind.tag().to_lowercase(),
        base_url,
        api_key: SecretString::from(api_key),
        model: config.model.clone(),
        azure_deployment,
        legacy_max_tokens: !matches!(kind, ProviderKind::OpenAi | ProviderKind::AzureOpenAi),
        dimension: config.dimension,
        timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn config(provider: &str) -> ModelConfig {
        let mut config = ModelConfig::new("m1", provider, "some-model");
        config.api_key = Some("sk-test".to_string());
        config
    }

    #[test]
    fn test_default_base_url_used_when_unset() {
        let resolved = from_model_config(ProviderKind::Deepseek, &config("DEEPSEEK"), TIMEOUT).unwrap();
        assert_eq!(resolved.base_url, "https://api.deepseek.com/v1");
        assert_eq!(resolved.provider_name, "deepseek");
        assert!(resolved.legacy_max_tokens);
        assert_eq!(resolved.api_key.expose_secret(), "sk-test");
    }

    #[test]
    fn test_configured_base_url_overrides_default() {
        let mut cfg = config("OPENAI");
        cfg.base_url = Some("https://proxy.internal/v1/".to_string());
        let resolved = from_model_config(ProviderKind::OpenAi, &cfg, TIMEOUT).unwrap();
        assert_eq!(resolved.base_url, "https://proxy.internal/v1");
        assert!(!resolved.legacy_max_tokens);
    }

    #[test]
    fn test_ollama_appends_v1_once() {
        let mut cfg = ModelConfig::new("m1", "OLLAMA", "llama3.1");
        cfg.base_url = Some("http://localhost:11434".to_string());
        let resolved = from_model_config(ProviderKind::Ollama, &cfg, TIMEOUT).unwrap();
        assert_eq!(resolved.base_url, "http://localhost:11434/v1");

        cfg.base_url = Some("http://localhost:11434/v1".to_string());
        let resolved = from_model_config(ProviderKind::Ollama, &cfg, TIMEOUT).unwrap();
        assert_eq!(resolved.base_url, "http://localhost:11434/v1");
        assert_eq!(resolved.api_key.expose_secret(), "ollama");
    }

    #[test]
    fn test_azure_carries_deployment() {
        let mut cfg = config("AZURE_OPENAI");
        cfg.base_url = Some("https://acme.openai.azure.com".to_string());
        cfg.azure_deployment_name = Some("gpt4o-prod".to_string());
        let resolved = from_model_config(ProviderKind::AzureOpenAi, &cfg, TIMEOUT).unwrap();
        assert_eq!(resolved.azure_deployment.as_deref(), Some("gpt4o-prod"));
    }

    #[test]
    fn test_unparseable_base_url_is_rejected() {
        let mut cfg = config("OPENAI");
        cfg.base_url = Some("not a url".to_string());
        assert!(matches!(
            from_model_config(ProviderKind::OpenAi, &cfg, TIMEOUT),
            Err(LlmError::InvalidRequest(_))
        ));
    }
}
