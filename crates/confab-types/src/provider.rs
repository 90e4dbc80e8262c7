//! Model configuration records and the closed set of provider families.
//!
//! A [`ModelConfig`] names one reachable backend: which provider family
//! serves it, which model, the credentials that family needs, and the
//! generation parameters to apply.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a model configuration is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    Chat,
    Embedding,
    TextImage,
    WebSearch,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Chat => write!(f, "CHAT"),
            ModelType::Embedding => write!(f, "EMBEDDING"),
            ModelType::TextImage => write!(f, "TEXT_IMAGE"),
            ModelType::WebSearch => write!(f, "WEB_SEARCH"),
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CHAT" => Ok(ModelType::Chat),
            "EMBEDDING" => Ok(ModelType::Embedding),
            "TEXT_IMAGE" => Ok(ModelType::TextImage),
            "WEB_SEARCH" => Ok(ModelType::WebSearch),
            other => Err(format!("invalid model type: '{other}'")),
        }
    }
}

/// Supported backend families.
///
/// This is a closed set: adding a provider means adding a variant here and
/// handling it in every exhaustive `match` over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderKind {
    #[serde(rename = "OPENAI")]
    OpenAi,
    #[serde(rename = "AZURE_OPENAI")]
    AzureOpenAi,
    Gemini,
    Ollama,
    Claude,
    QFan,
    QWen,
    Zhipu,
    Yi,
    Douyin,
    Deepseek,
    Silicon,
    Spark,
}

impl ProviderKind {
    /// Evaluation order used when identifying the provider of a config.
    pub const ALL: [ProviderKind; 13] = [
        ProviderKind::OpenAi,
        ProviderKind::AzureOpenAi,
        ProviderKind::Gemini,
        ProviderKind::Ollama,
        ProviderKind::Claude,
        ProviderKind::QFan,
        ProviderKind::QWen,
        ProviderKind::Zhipu,
        ProviderKind::Yi,
        ProviderKind::Douyin,
        ProviderKind::Deepseek,
        ProviderKind::Silicon,
        ProviderKind::Spark,
    ];

    /// Canonical tag stored in `ModelConfig::provider`.
    pub fn tag(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI",
            ProviderKind::AzureOpenAi => "AZURE_OPENAI",
            ProviderKind::Gemini => "GEMINI",
            ProviderKind::Ollama => "OLLAMA",
            ProviderKind::Claude => "CLAUDE",
            ProviderKind::QFan => "Q_FAN",
            ProviderKind::QWen => "Q_WEN",
            ProviderKind::Zhipu => "ZHIPU",
            ProviderKind::Yi => "YI",
            ProviderKind::Douyin => "DOUYIN",
            ProviderKind::Deepseek => "DEEPSEEK",
            ProviderKind::Silicon => "SILICON",
            ProviderKind::Spark => "SPARK",
        }
    }

    /// Whether this provider owns the given tag. Case and surrounding
    /// whitespace are ignored.
    pub fn claims(&self, tag: &str) -> bool {
        self.tag().eq_ignore_ascii_case(tag.trim())
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A configuration field that a provider may require before a client is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialField {
    #[serde(rename = "apiKey")]
    ApiKey,
    #[serde(rename = "secretKey")]
    SecretKey,
    #[serde(rename = "baseUrl")]
    BaseUrl,
    #[serde(rename = "azureDeploymentName")]
    AzureDeploymentName,
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialField::ApiKey => write!(f, "apiKey"),
            CredentialField::SecretKey => write!(f, "secretKey"),
            CredentialField::BaseUrl => write!(f, "baseUrl"),
            CredentialField::AzureDeploymentName => write!(f, "azureDeploymentName"),
        }
    }
}

/// A client capability that may or may not be offered by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    StreamingChat,
    Chat,
    Embedding,
    Image,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::StreamingChat,
        Capability::Chat,
        Capability::Embedding,
        Capability::Image,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::StreamingChat => write!(f, "streaming_chat"),
            Capability::Chat => write!(f, "chat"),
            Capability::Embedding => write!(f, "embedding"),
            Capability::Image => write!(f, "image"),
        }
    }
}

/// A named, provider-tagged configuration for reaching one backend.
///
/// Does NOT derive Debug: the manual impl below redacts `api_key` and
/// `secret_key` so they never reach log output.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    /// Provider tag, e.g. `"OPENAI"` or `"OLLAMA"`.
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Upper bound on generated tokens per response.
    #[serde(default)]
    pub response_limit: Option<u32>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub top_p: f64,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub gemini_project: Option<String>,
    #[serde(default)]
    pub gemini_location: Option<String>,
    #[serde(default)]
    pub azure_deployment_name: Option<String>,
    #[serde(default)]
    pub image_size: Option<String>,
    #[serde(default)]
    pub image_quality: Option<String>,
    #[serde(default)]
    pub image_style: Option<String>,
    /// Embedding vector size.
    #[serde(default)]
    pub dimension: Option<u32>,
}

fn default_temperature() -> f64 {
    0.2
}

impl ModelConfig {
    /// A chat config with default parameters and no credentials.
    pub fn new(id: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model_type: ModelType::Chat,
            provider: provider.into(),
            model: model.into(),
            name: None,
            response_limit: None,
            temperature: default_temperature(),
            top_p: 0.0,
            api_key: None,
            secret_key: None,
            base_url: None,
            endpoint: None,
            gemini_project: None,
            gemini_location: None,
            azure_deployment_name: None,
            image_size: None,
            image_quality: None,
            image_style: None,
            dimension: None,
        }
    }

    /// Value of a credential field, treating blank strings as absent.
    pub fn credential(&self, field: CredentialField) -> Option<&str> {
        let value = match field {
            CredentialField::ApiKey => self.api_key.as_deref(),
            CredentialField::SecretKey => self.secret_key.as_deref(),
            CredentialField::BaseUrl => self.base_url.as_deref(),
            CredentialField::AzureDeploymentName => self.azure_deployment_name.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Copy of this config with secrets replaced by their masked form.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.api_key = copy.api_key.as_deref().map(mask_secret);
        copy.secret_key = copy.secret_key.as_deref().map(mask_secret);
        copy
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("id", &self.id)
            .field("model_type", &self.model_type)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

/// Character that marks a secret as masked.
pub const MASK_CHAR: char = '*';

/// Whether a submitted secret is a masked echo of the stored value.
pub fn is_masked(value: &str) -> bool {
    value.contains(MASK_CHAR)
}

/// Mask a secret for display, keeping only the last four characters.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return MASK_CHAR.to_string().repeat(8);
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{tail}", MASK_CHAR.to_string().repeat(8))
}
