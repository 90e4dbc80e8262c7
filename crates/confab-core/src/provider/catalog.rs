//! Provider catalog: one capability checker per backend family.
//!
//! Pure logic over [`ModelConfig`] records. Nothing here performs I/O or
//! constructs a client; it decides which family owns a config, whether the
//! config carries the credentials that family needs, and what it can do.

use confab_types::error::ConfigError;
use confab_types::provider::{Capability, CredentialField, ModelConfig, ProviderKind};

/// Static description of one provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    /// Fields that must be non-blank, in the order they are checked.
    pub required: &'static [CredentialField],
    pub capabilities: &'static [Capability],
}

const CHAT_ONLY: &[Capability] = &[Capability::StreamingChat, Capability::Chat];

const CHAT_AND_EMBEDDING: &[Capability] = &[
    Capability::StreamingChat,
    Capability::Chat,
    Capability::Embedding,
];

const FULL: &[Capability] = &[
    Capability::StreamingChat,
    Capability::Chat,
    Capability::Embedding,
    Capability::Image,
];

const API_KEY: &[CredentialField] = &[CredentialField::ApiKey];

impl ProviderSpec {
    pub fn of(kind: ProviderKind) -> Self {
        let (required, capabilities): (&'static [CredentialField], &'static [Capability]) =
            match kind {
                ProviderKind::OpenAi => (API_KEY, FULL),
                ProviderKind::AzureOpenAi => (
                    &[
                        CredentialField::ApiKey,
                        CredentialField::BaseUrl,
                        CredentialField::AzureDeploymentName,
                    ],
                    FULL,
                ),
                ProviderKind::Gemini => (API_KEY, CHAT_AND_EMBEDDING),
                ProviderKind::Ollama => (&[CredentialField::BaseUrl], CHAT_AND_EMBEDDING),
                ProviderKind::Claude => (API_KEY, CHAT_ONLY),
                ProviderKind::QFan => (
                    &[CredentialField::ApiKey, CredentialField::SecretKey],
                    CHAT_AND_EMBEDDING,
                ),
                ProviderKind::QWen => (API_KEY, CHAT_AND_EMBEDDING),
                ProviderKind::Zhipu => (API_KEY, FULL),
                ProviderKind::Yi => (API_KEY, CHAT_ONLY),
                ProviderKind::Douyin => (API_KEY, CHAT_ONLY),
                ProviderKind::Deepseek => (API_KEY, CHAT_ONLY),
                ProviderKind::Silicon => (API_KEY, CHAT_AND_EMBEDDING),
                ProviderKind::Spark => (API_KEY, CHAT_ONLY),
            };
        Self {
            kind,
            required,
            capabilities,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Determine which provider family owns a config.
///
/// Families are tried in [`ProviderKind::ALL`] order; the first whose
/// predicate claims the tag wins. Tags are unique, so at most one can.
pub fn identify(config: &ModelConfig) -> Result<ProviderKind, ConfigError> {
    ProviderKind::ALL
        .into_iter()
        .find(|kind| kind.claims(&config.provider))
        .ok_or_else(|| ConfigError::UnknownProvider(config.provider.clone()))
}

/// Identify the provider and check every field it requires.
///
/// Returns the first missing field in the family's check order.
pub fn validate(config: &ModelConfig) -> Result<ProviderKind, ConfigError> {
    let kind = identify(config)?;
    let spec = ProviderSpec::of(kind);
    if let Some(field) = spec
        .required
        .iter()
        .copied()
        .find(|field| config.credential(*field).is_none())
    {
        return Err(ConfigError::MissingCredential {
            field,
            provider: kind.tag().to_string(),
            model_type: config.model_type,
        });
    }
    Ok(kind)
}

/// Whether a provider family offers a capability.
pub fn supports(kind: ProviderKind, capability: Capability) -> bool {
    ProviderSpec::of(kind).supports(capability)
}
