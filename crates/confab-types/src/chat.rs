//! Conversation, turn, and stream fragment types for Confab.
//!
//! A conversation is an ordered log of turns. The chat core streams
//! [`StreamFragment`]s to callers and persists [`ConversationTurn`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub use crate::llm::MessageRole;

/// A single persisted message within a conversation.
///
/// Turns are immutable once written and ordered by insertion.
/// Assistant turns carry token usage and response timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub conversation_id: String,
    pub role: MessageRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    /// Prompt tokens billed for the exchange (assistant turns only).
    pub prompt_tokens: Option<u32>,
    /// Tokens generated for this turn (assistant turns only).
    pub completion_tokens: Option<u32>,
    /// Model that produced this turn (assistant turns only).
    pub model: Option<String>,
    /// Wall-clock generation time (assistant turns only).
    pub response_ms: Option<u64>,
}

impl ConversationTurn {
    fn new(
        conversation_id: &str,
        user_id: &str,
        role: MessageRole,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id: conversation_id.to_string(),
            role,
            text: text.into(),
            created_at: Utc::now(),
            user_id: user_id.to_string(),
            prompt_tokens: None,
            completion_tokens: None,
            model: None,
            response_ms: None,
        }
    }

    pub fn user(conversation_id: &str, user_id: &str, text: impl Into<String>) -> Self {
        Self::new(conversation_id, user_id, MessageRole::User, text)
    }

    pub fn assistant(conversation_id: &str, user_id: &str, text: impl Into<String>) -> Self {
        Self::new(conversation_id, user_id, MessageRole::Assistant, text)
    }

    pub fn system(conversation_id: &str, text: impl Into<String>) -> Self {
        Self::new(conversation_id, "system", MessageRole::System, text)
    }
}

/// Listing/index row for a user's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One unit of output delivered to the caller of a streaming chat.
///
/// Every request ends in exactly one terminal fragment (`Done` or
/// `Error`) unless the consumer went away first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFragment {
    Text {
        text: String,
    },
    Done {
        prompt_tokens: u32,
        completion_tokens: u32,
        total_tokens: u32,
        elapsed_ms: u64,
    },
    Error {
        message: String,
    },
}

impl StreamFragment {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamFragment::Text { .. })
    }
}

/// Inbound chat request, already associated with an authenticated user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Generated server-side when absent.
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    /// Overrides the app profile's system prompt.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Reload the conversation window from storage before generating.
    #[serde(default)]
    pub preload: bool,
    #[serde(skip)]
    pub user_id: String,
}

/// Result of a non-streaming chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextReply {
    pub conversation_id: String,
    pub text: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub elapsed_ms: u64,
}

/// Auxiliary derived-text features built on a prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeriveKind {
    Mindmap,
    Summary,
}

impl fmt::Display for DeriveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeriveKind::Mindmap => write!(f, "mindmap"),
            DeriveKind::Summary => write!(f, "summary"),
        }
    }
}

impl FromStr for DeriveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mindmap" => Ok(DeriveKind::Mindmap),
            "summary" => Ok(DeriveKind::Summary),
            other => Err(format!("invalid derive kind: '{other}'")),
        }
    }
}
