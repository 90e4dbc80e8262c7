//! Conversation turn and conversation index repository traits.
//!
//! `TurnRepository` is the durable backing of conversation memory.
//! `ConversationRepository` keeps the per-user listing rows in step with it.

use confab_types::chat::{Conversation, ConversationTurn};
use confab_types::error::RepositoryError;

/// Durable, append-only turn log keyed by conversation id.
///
/// Implementations must support lookups by conversation id ordered by
/// insertion without a full scan.
pub trait TurnRepository: Send + Sync {
    /// Append one turn. Turns are never updated afterwards.
    fn append_turn(
        &self,
        turn: &ConversationTurn,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The `limit` most recent turns of a conversation, oldest first.
    fn load_recent_turns(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationTurn>, RepositoryError>> + Send;

    /// Delete every turn of a conversation. Returns the number removed.
    fn delete_all_turns(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Per-user conversation listing.
pub trait ConversationRepository: Send + Sync {
    /// Create the conversation row if it does not exist yet.
    fn ensure_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
        title: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// A user's conversations, most recently updated first.
    fn list_conversations(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    fn rename_conversation(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Add token usage to the conversation totals and bump `updated_at`.
    fn add_usage(
        &self,
        conversation_id: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete the conversation row. Turns are removed separately.
    fn delete_conversation(
        &self,
        conversation_id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
