//! Conversation listing, history preview and clearing.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use confab_types::chat::{Conversation, ConversationTurn};
use confab_types::error::{ManagementError, RepositoryError};

use crate::memory::{ConversationMemory, Seed};
use crate::repository::conversation::{ConversationRepository, TurnRepository};

pub struct ConversationService<R: TurnRepository + ConversationRepository> {
    memory: Arc<ConversationMemory<R>>,
    preview_max_messages: usize,
}

impl<R: TurnRepository + ConversationRepository> ConversationService<R> {
    pub fn new(memory: Arc<ConversationMemory<R>>, preview_max_messages: usize) -> Self {
        Self {
            memory,
            preview_max_messages: preview_max_messages.max(1),
        }
    }

    fn repo(&self) -> &R {
        self.memory.repository()
    }

    /// Recent turns for display, oldest first.
    ///
    /// The same turns are seeded into the memory window, so a client that
    /// reopens a conversation continues from what it is showing.
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>, RepositoryError> {
        self.memory
            .seed_from_storage(conversation_id, self.preview_max_messages)
            .await
    }

    /// Start the conversation's window afresh with a system prompt.
    pub async fn seed_prompt(&self, conversation_id: &str, prompt: &str) {
        self.memory
            .seed(conversation_id, Seed::System(prompt.to_string()))
            .await;
    }

    /// Delete every turn of the conversation. The listing row is kept.
    pub async fn clear(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        self.memory.clear(conversation_id).await
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Conversation>, RepositoryError> {
        self.repo().list_conversations(user_id).await
    }

    pub async fn create(&self, user_id: &str, title: &str) -> Result<Conversation, ManagementError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ManagementError::InvalidInput(
                "title must not be empty".to_string(),
            ));
        }
        let id = Uuid::now_v7().simple().to_string();
        self.repo().ensure_conversation(&id, user_id, title).await?;
        let conversation = self
            .repo()
            .get_conversation(&id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        info!(conversation_id = %id, user_id, "created conversation");
        Ok(conversation)
    }

    pub async fn rename(&self, conversation_id: &str, title: &str) -> Result<(), ManagementError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ManagementError::InvalidInput(
                "title must not be empty".to_string(),
            ));
        }
        self.repo().rename_conversation(conversation_id, title).await?;
        Ok(())
    }

    /// Remove the conversation and all of its turns.
    pub async fn delete(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        self.memory.clear(conversation_id).await?;
        self.repo().delete_conversation(conversation_id).await?;
        info!(conversation_id, "deleted conversation");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryStore, gate};
    use std::time::Duration;

    fn service(preview: usize) -> (ConversationService<InMemoryStore>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::default());
        let memory = Arc::new(ConversationMemory::new(store.clone(), 2));
        (ConversationService::new(memory, preview), store)
    }

    async fn say(service: &ConversationService<InMemoryStore>, cid: &str, text: &str) {
        service
            .memory
            .append(cid, ConversationTurn::user(cid, "u1", text))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_history_returns_preview_and_seeds_window() {
        let (service, _store) = service(3);
        for text in ["a", "b", "c", "d"] {
            say(&service, "c1", text).await;
        }

        let turns = service.history("c1").await.unwrap();
        let texts: Vec<_> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c", "d"]);

        let window = service.memory.load("c1").await.unwrap();
        let texts: Vec<_> = window.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "d"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_history_does_not_drop_concurrent_append() {
        let (service, store) = service(100);
        let service = Arc::new(service);
        say(&service, "c1", "A").await;
        let (gate, control) = gate();
        *store.load_gate.lock().unwrap() = Some(gate);

        // History stalls after reading storage; an append arrives meanwhile.
        let history = tokio::spawn({
            let service = service.clone();
            async move { service.history("c1").await }
        });
        control.reached.await.unwrap();
        let append = tokio::spawn({
            let service = service.clone();
            async move { say(&service, "c1", "B").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        control.release.send(()).unwrap();
        let shown = history.await.unwrap().unwrap();
        append.await.unwrap();

        fn texts(turns: &[ConversationTurn]) -> Vec<&str> {
            turns.iter().map(|t| t.text.as_str()).collect()
        }
        assert_eq!(texts(&shown), vec!["A"]);
        assert_eq!(texts(&store.turns("c1")), vec!["A", "B"]);
        assert_eq!(texts(&service.memory.load("c1").await.unwrap()), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_create_and_rename() {
        let (service, store) = service(10);
        let created = service.create("u1", "Trip plans").await.unwrap();
        service.rename(&created.id, "Tokyo trip").await.unwrap();
        assert_eq!(
            store.conversation(&created.id).unwrap().title.as_deref(),
            Some("Tokyo trip")
        );
        assert_eq!(service.list("u1").await.unwrap().len(), 1);
        assert!(service.list("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let (service, _store) = service(10);
        assert!(matches!(
            service.create("u1", "  ").await.unwrap_err(),
            ManagementError::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_turns_and_row() {
        let (service, store) = service(10);
        let created = service.create("u1", "Scratch").await.unwrap();
        say(&service, &created.id, "hello").await;

        service.delete(&created.id).await.unwrap();
        assert!(store.turns(&created.id).is_empty());
        assert!(store.conversation(&created.id).is_none());
    }

    #[tokio::test]
    async fn test_seed_prompt_resets_window() {
        let (service, _store) = service(10);
        say(&service, "c1", "hello").await;
        service.seed_prompt("c1", "Be brief.").await;
        let snapshot = service.memory.snapshot("c1").await.unwrap();
        assert_eq!(snapshot.system.as_deref(), Some("Be brief."));
        assert!(snapshot.turns.is_empty());
    }
}
