//! ConversationMemory: the bounded context window used to prime generation.
//!
//! Windows are created lazily on first access and guarded by one async
//! mutex per conversation id. The shared `DashMap` is only touched long
//! enough to fetch that mutex, so work on different conversations never
//! serializes, while operations on the same conversation (including their
//! storage calls) are linearizable.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use confab_types::chat::ConversationTurn;
use confab_types::error::RepositoryError;

use super::window::Window;
use crate::repository::conversation::TurnRepository;

/// Explicit (re)initialization of a conversation window.
#[derive(Debug, Clone)]
pub enum Seed {
    /// Start the window afresh with this system prompt and no turns.
    /// Stored history is untouched and can be brought back with `reload`.
    System(String),
    /// Replace the window's turns with these, capped to the most recent N.
    /// The system prompt, if any, is kept.
    History(Vec<ConversationTurn>),
}

/// Copy of a window taken under its lock.
#[derive(Debug, Clone, Default)]
pub struct WindowSnapshot {
    pub system: Option<String>,
    pub turns: Vec<ConversationTurn>,
}

pub struct ConversationMemory<R: TurnRepository> {
    repo: Arc<R>,
    max_messages: usize,
    windows: DashMap<String, Arc<Mutex<Window>>>,
}

impl<R: TurnRepository> ConversationMemory<R> {
    /// `max_messages` is the window cap; values below 1 are raised to 1.
    pub fn new(repo: Arc<R>, max_messages: usize) -> Self {
        Self {
            repo,
            max_messages: max_messages.max(1),
            windows: DashMap::new(),
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Number of windows currently held in memory.
    pub fn resident(&self) -> usize {
        self.windows.len()
    }

    fn slot(&self, conversation_id: &str) -> Arc<Mutex<Window>> {
        self.windows
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Window::new())))
            .clone()
    }

    async fn ensure_loaded(
        &self,
        conversation_id: &str,
        window: &mut Window,
    ) -> Result<(), RepositoryError> {
        if !window.loaded {
            let turns = self
                .repo
                .load_recent_turns(conversation_id, self.max_messages)
                .await?;
            debug!(conversation_id, count = turns.len(), "loaded conversation window");
            window.replace(turns, self.max_messages);
        }
        Ok(())
    }

    /// The window's turns, oldest first, populating from storage on first access.
    pub async fn load(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>, RepositoryError> {
        Ok(self.snapshot(conversation_id).await?.turns)
    }

    /// The window's turns together with its seeded system prompt.
    pub async fn snapshot(&self, conversation_id: &str) -> Result<WindowSnapshot, RepositoryError> {
        let slot = self.slot(conversation_id);
        let mut window = slot.lock().await;
        self.ensure_loaded(conversation_id, &mut window).await?;
        window.touch();
        Ok(window.snapshot())
    }

    /// Persist a turn, then add it to the window.
    ///
    /// Returns the window as it stands right after the push, taken under the
    /// same lock. If storage rejects the turn the window is left unchanged.
    /// Eviction past the cap affects the in-memory window only.
    pub async fn append(
        &self,
        conversation_id: &str,
        turn: ConversationTurn,
    ) -> Result<WindowSnapshot, RepositoryError> {
        let slot = self.slot(conversation_id);
        let mut window = slot.lock().await;
        self.ensure_loaded(conversation_id, &mut window).await?;
        self.repo.append_turn(&turn).await?;
        window.push(turn, self.max_messages);
        window.touch();
        Ok(window.snapshot())
    }

    /// Overwrite the window. Nothing is written to storage.
    pub async fn seed(&self, conversation_id: &str, seed: Seed) {
        let slot = self.slot(conversation_id);
        let mut window = slot.lock().await;
        match seed {
            Seed::System(prompt) => {
                window.reset();
                window.system = Some(prompt);
            }
            Seed::History(turns) => window.replace(turns, self.max_messages),
        }
        window.touch();
        debug!(conversation_id, "seeded conversation window");
    }

    /// Read the `limit` most recent stored turns and seed them as the window.
    ///
    /// The read and the seed happen under the conversation's lock, so an
    /// append cannot land between them. Returns all `limit` turns; the
    /// window keeps at most its own cap of them.
    pub async fn seed_from_storage(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let slot = self.slot(conversation_id);
        let mut window = slot.lock().await;
        let turns = self.repo.load_recent_turns(conversation_id, limit).await?;
        window.replace(turns.clone(), self.max_messages);
        window.touch();
        debug!(conversation_id, count = turns.len(), "seeded conversation window from storage");
        Ok(turns)
    }

    /// Discard the in-memory turns and read them again from storage.
    pub async fn reload(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        let slot = self.slot(conversation_id);
        let mut window = slot.lock().await;
        window.loaded = false;
        self.ensure_loaded(conversation_id, &mut window).await?;
        window.touch();
        Ok(())
    }

    /// Delete the conversation's stored turns and reset its window.
    ///
    /// Clearing an already empty conversation is a no-op.
    pub async fn clear(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        let slot = self.slot(conversation_id);
        let mut window = slot.lock().await;
        let removed = self.repo.delete_all_turns(conversation_id).await?;
        window.reset();
        window.touch();
        info!(conversation_id, removed, "cleared conversation");
        Ok(())
    }

    /// Drop windows idle for at least `max_idle` that no request is using.
    ///
    /// Storage stays the source of truth; an evicted window is reloaded on
    /// next access. Returns the number of windows dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(window) => window.last_access.elapsed() < max_idle,
                Err(_) => true,
            }
        });
        let evicted = before.saturating_sub(self.windows.len());
        if evicted > 0 {
            debug!(evicted, "evicted idle conversation windows");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStore;
    use std::sync::atomic::Ordering;

    fn memory(cap: usize) -> (Arc<InMemoryStore>, ConversationMemory<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::default());
        (store.clone(), ConversationMemory::new(store, cap))
    }

    fn texts(turns: &[ConversationTurn]) -> Vec<String> {
        turns.iter().map(|t| t.text.clone()).collect()
    }

    #[tokio::test]
    async fn test_window_keeps_most_recent_two() {
        let (_, memory) = memory(2);
        for text in ["A", "B", "C"] {
            memory
                .append("c1", ConversationTurn::user("c1", "u1", text))
                .await
                .unwrap();
        }
        assert_eq!(texts(&memory.load("c1").await.unwrap()), vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_load_from_storage_returns_k_most_recent_in_order() {
        let (store, _) = memory(3);
        for i in 0..7 {
            store
                .append_turn(&ConversationTurn::user("c1", "u1", format!("t{i}")))
                .await
                .unwrap();
        }
        // Fresh memory over existing storage, as after a restart.
        let memory = ConversationMemory::new(store.clone(), 3);
        assert_eq!(
            texts(&memory.load("c1").await.unwrap()),
            vec!["t4", "t5", "t6"]
        );
    }

    #[tokio::test]
    async fn test_append_never_deletes_durable_history() {
        let (store, memory) = memory(2);
        for text in ["A", "B", "C", "D"] {
            memory
                .append("c1", ConversationTurn::user("c1", "u1", text))
                .await
                .unwrap();
        }
        assert_eq!(store.turns("c1").len(), 4);
        assert_eq!(memory.load("c1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_load_happens_once_per_window() {
        let (store, memory) = memory(5);
        memory.load("c1").await.unwrap();
        memory.load("c1").await.unwrap();
        memory
            .append("c1", ConversationTurn::user("c1", "u1", "x"))
            .await
            .unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_append_leaves_window_unchanged() {
        let (store, memory) = memory(5);
        memory
            .append("c1", ConversationTurn::user("c1", "u1", "kept"))
            .await
            .unwrap();
        store.fail_append.store(true, Ordering::SeqCst);
        let err = memory
            .append("c1", ConversationTurn::user("c1", "u1", "lost"))
            .await;
        assert!(matches!(err, Err(RepositoryError::Connection)));
        assert_eq!(texts(&memory.load("c1").await.unwrap()), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_load_failure_is_reported_not_empty() {
        let (store, memory) = memory(5);
        store.fail_load.store(true, Ordering::SeqCst);
        assert!(memory.load("c1").await.is_err());

        // The failed load must not leave an empty window marked as loaded.
        store.fail_load.store(false, Ordering::SeqCst);
        store
            .append_turn(&ConversationTurn::user("c1", "u1", "stored"))
            .await
            .unwrap();
        assert_eq!(texts(&memory.load("c1").await.unwrap()), vec!["stored"]);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (store, memory) = memory(5);
        memory
            .append("c1", ConversationTurn::user("c1", "u1", "A"))
            .await
            .unwrap();
        memory.seed("c1", Seed::History(store.turns("c1"))).await;

        memory.clear("c1").await.unwrap();
        let first = (memory.snapshot("c1").await.unwrap(), store.turns("c1"));
        memory.clear("c1").await.unwrap();
        let second = (memory.snapshot("c1").await.unwrap(), store.turns("c1"));

        assert!(first.0.turns.is_empty() && first.0.system.is_none());
        assert!(first.1.is_empty());
        assert!(second.0.turns.is_empty() && second.0.system.is_none());
        assert!(second.1.is_empty());
    }

    #[tokio::test]
    async fn test_seed_system_overwrites_window() {
        let (_, memory) = memory(5);
        memory
            .append("c1", ConversationTurn::user("c1", "u1", "A"))
            .await
            .unwrap();
        memory.seed("c1", Seed::System("first".to_string())).await;
        memory.seed("c1", Seed::System("second".to_string())).await;

        let snapshot = memory.snapshot("c1").await.unwrap();
        assert_eq!(snapshot.system.as_deref(), Some("second"));
        assert!(snapshot.turns.is_empty());
    }

    #[tokio::test]
    async fn test_seed_history_caps_and_keeps_system() {
        let (_, memory) = memory(2);
        memory.seed("c1", Seed::System("sys".to_string())).await;
        let history = ["A", "B", "C"]
            .iter()
            .map(|t| ConversationTurn::user("c1", "u1", *t))
            .collect();
        memory.seed("c1", Seed::History(history)).await;

        let snapshot = memory.snapshot("c1").await.unwrap();
        assert_eq!(snapshot.system.as_deref(), Some("sys"));
        assert_eq!(texts(&snapshot.turns), vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_reload_reads_storage_again() {
        let (store, memory) = memory(5);
        memory.seed("c1", Seed::System("sys".to_string())).await;
        store
            .append_turn(&ConversationTurn::user("c1", "u1", "written elsewhere"))
            .await
            .unwrap();
        assert!(memory.load("c1").await.unwrap().is_empty());

        memory.reload("c1").await.unwrap();
        assert_eq!(
            texts(&memory.load("c1").await.unwrap()),
            vec!["written elsewhere"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_to_same_conversation_are_not_lost() {
        let (store, memory) = memory(100);
        let memory = Arc::new(memory);
        let mut handles = Vec::new();
        for i in 0..20 {
            let memory = memory.clone();
            handles.push(tokio::spawn(async move {
                memory
                    .append("c1", ConversationTurn::user("c1", "u1", format!("m{i}")))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let window = memory.load("c1").await.unwrap();
        assert_eq!(window.len(), 20);
        // Window order matches storage order exactly.
        assert_eq!(texts(&window), texts(&store.turns("c1")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_append_returns_window_ending_with_own_turn() {
        let (_, memory) = memory(100);
        let memory = Arc::new(memory);
        let mut handles = Vec::new();
        for i in 0..20 {
            let memory = memory.clone();
            handles.push(tokio::spawn(async move {
                let text = format!("m{i}");
                let snapshot = memory
                    .append("c1", ConversationTurn::user("c1", "u1", text.as_str()))
                    .await
                    .unwrap();
                assert_eq!(snapshot.turns.last().unwrap().text, text);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_seed_from_storage_returns_limit_and_caps_window() {
        let (store, memory) = memory(2);
        for text in ["A", "B", "C", "D"] {
            store
                .append_turn(&ConversationTurn::user("c1", "u1", text))
                .await
                .unwrap();
        }
        memory.seed("c1", Seed::System("sys".to_string())).await;

        let shown = memory.seed_from_storage("c1", 3).await.unwrap();
        assert_eq!(texts(&shown), vec!["B", "C", "D"]);
        let snapshot = memory.snapshot("c1").await.unwrap();
        assert_eq!(snapshot.system.as_deref(), Some("sys"));
        assert_eq!(texts(&snapshot.turns), vec!["C", "D"]);
    }

    #[tokio::test]
    async fn test_different_conversations_do_not_block() {
        let (_, memory) = memory(5);
        let memory = Arc::new(memory);
        let slot = memory.slot("busy");
        let _held = slot.lock().await;

        let other = tokio::time::timeout(
            Duration::from_secs(1),
            memory.append("free", ConversationTurn::user("free", "u1", "hi")),
        )
        .await;
        assert!(matches!(other, Ok(Ok(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_drops_only_unused_windows() {
        let (_, memory) = memory(5);
        memory.load("old").await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;
        memory.load("fresh").await.unwrap();

        let evicted = memory.evict_idle(Duration::from_secs(60));
        assert_eq!(evicted, 1);
        assert_eq!(memory.resident(), 1);
        assert!(memory.windows.contains_key("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_keeps_windows_in_use() {
        let (_, memory) = memory(5);
        memory.load("c1").await.unwrap();
        let in_use = memory.slot("c1");
        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(memory.evict_idle(Duration::from_secs(60)), 0);
        drop(in_use);
        assert_eq!(memory.evict_idle(Duration::from_secs(60)), 1);
    }
}
