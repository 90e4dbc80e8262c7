use thiserror::Error;

use crate::llm::LlmError;
use crate::provider::{Capability, CredentialField, ModelType};

/// Errors from repository operations (used by trait definitions in confab-core).
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// A model configuration that cannot be turned into a working client.
///
/// Raised before any side effect and surfaced to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("{provider} {model_type} model is missing required field '{field}'")]
    MissingCredential {
        field: CredentialField,
        provider: String,
        model_type: ModelType,
    },

    #[error("model '{0}' not found")]
    ModelNotFound(String),

    #[error("no model selected and no default model configured")]
    NoModelSelected,

    #[error("model '{id}' is a {actual} model, expected {expected}")]
    WrongModelType {
        id: String,
        expected: ModelType,
        actual: ModelType,
    },

    #[error("provider {provider} does not support {capability}")]
    UnsupportedCapability {
        provider: String,
        capability: Capability,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors surfaced by a chat exchange.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] LlmError),

    #[error("conversation memory unavailable: {0}")]
    Memory(#[from] RepositoryError),

    #[error("generation timed out after {0}s")]
    Timeout(u64),

    #[error("empty message")]
    EmptyMessage,
}

/// Errors from the model and app management services.
#[derive(Debug, Clone, Error)]
pub enum ManagementError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
