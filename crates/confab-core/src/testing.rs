//! In-memory fakes shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};

use confab_types::app::AppProfile;
use confab_types::chat::{Conversation, ConversationTurn};
use confab_types::error::RepositoryError;
use confab_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, StopReason, StreamEvent, Usage,
};
use confab_types::provider::{ModelConfig, ModelType, ProviderKind};

use crate::llm::box_embedder::BoxEmbedder;
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::embedder::Embedder;
use crate::llm::provider::{EventStream, LlmProvider};
use crate::provider::factory::ClientBuilder;
use crate::repository::app::AppProfileRepository;
use crate::repository::conversation::{ConversationRepository, TurnRepository};
use crate::repository::model_config::ModelConfigRepository;

pub type ManualEvents = mpsc::UnboundedSender<Result<StreamEvent, LlmError>>;

/// What a [`FakeProvider`] does when asked to generate.
#[derive(Clone)]
pub enum Script {
    /// Emit each chunk as a text delta, then usage (if any) and `Done`.
    Reply {
        chunks: Vec<String>,
        usage: Option<Usage>,
    },
    /// Emit the chunks, then fail with a provider error.
    FailAfter { chunks: Vec<String>, message: String },
    /// Forward whatever the test pushes into the paired sender.
    Manual(Arc<Mutex<Option<mpsc::UnboundedReceiver<Result<StreamEvent, LlmError>>>>>),
}

impl Script {
    pub fn reply(chunks: &[&str], usage: Usage) -> Self {
        Script::Reply {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            usage: Some(usage),
        }
    }

    pub fn fail_after(chunks: &[&str], message: &str) -> Self {
        Script::FailAfter {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            message: message.to_string(),
        }
    }

    pub fn manual() -> (Self, ManualEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Script::Manual(Arc::new(Mutex::new(Some(rx)))), tx)
    }
}

pub struct FakeProvider {
    name: String,
    model: String,
    script: Script,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl LlmProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.script {
            Script::Reply { chunks, usage } => Ok(CompletionResponse {
                id: "resp-1".to_string(),
                content: chunks.concat(),
                model: self.model.clone(),
                stop_reason: StopReason::EndTurn,
                usage: usage.unwrap_or_default(),
            }),
            Script::FailAfter { message, .. } => Err(LlmError::Provider {
                message: message.clone(),
            }),
            Script::Manual(_) => Err(LlmError::InvalidRequest(
                "manual script has no sync reply".to_string(),
            )),
        }
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        self.requests.lock().unwrap().push(request);
        match self.script.clone() {
            Script::Reply { chunks, usage } => Box::pin(async_stream::stream! {
                yield Ok(StreamEvent::Connected);
                for text in chunks {
                    yield Ok(StreamEvent::TextDelta { index: 0, text });
                }
                if let Some(usage) = usage {
                    yield Ok(StreamEvent::Usage(usage));
                }
                yield Ok(StreamEvent::Done);
            }),
            Script::FailAfter { chunks, message } => Box::pin(async_stream::stream! {
                for text in chunks {
                    yield Ok(StreamEvent::TextDelta { index: 0, text });
                }
                yield Err(LlmError::Provider { message });
            }),
            Script::Manual(slot) => {
                let rx = slot.lock().unwrap().take();
                Box::pin(async_stream::stream! {
                    if let Some(mut rx) = rx {
                        while let Some(event) = rx.recv().await {
                            yield event;
                        }
                    }
                })
            }
        }
    }
}

pub struct FakeEmbedder {
    model: String,
}

impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<u32> {
        Some(1)
    }
}

/// Builds [`FakeProvider`]s and counts how often it was asked to.
///
/// A config whose model is `"broken"` fails to build.
pub struct FakeBuilder {
    pub script: Script,
    pub builds: Arc<AtomicUsize>,
    pub seen_api_keys: Arc<Mutex<Vec<Option<String>>>>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl FakeBuilder {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            builds: Arc::new(AtomicUsize::new(0)),
            seen_api_keys: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ClientBuilder for FakeBuilder {
    fn build_chat(
        &self,
        kind: ProviderKind,
        config: &ModelConfig,
    ) -> Result<BoxLlmProvider, LlmError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.seen_api_keys.lock().unwrap().push(config.api_key.clone());
        if config.model == "broken" {
            return Err(LlmError::InvalidRequest("bad base url".to_string()));
        }
        Ok(BoxLlmProvider::new(FakeProvider {
            name: kind.tag().to_string(),
            model: config.model.clone(),
            script: self.script.clone(),
            requests: self.requests.clone(),
        }))
    }

    fn build_embedding(
        &self,
        _kind: ProviderKind,
        config: &ModelConfig,
    ) -> Result<BoxEmbedder, LlmError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(BoxEmbedder::new(FakeEmbedder {
            model: config.model.clone(),
        }))
    }
}

/// An OpenAI chat config that passes validation.
pub fn chat_config(id: &str) -> ModelConfig {
    let mut config = ModelConfig::new(id, "OPENAI", "gpt-test");
    config.api_key = Some("sk-test".to_string());
    config
}

/// Pause point inside a fake repository call.
///
/// The call that takes the gate signals `reached`, then waits until the test
/// fires or drops `release`.
pub struct Gate {
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Test-side ends of a [`Gate`].
pub struct GateControl {
    pub reached: oneshot::Receiver<()>,
    pub release: oneshot::Sender<()>,
}

pub fn gate() -> (Gate, GateControl) {
    let (reached_tx, reached_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    (
        Gate {
            reached: reached_tx,
            release: release_rx,
        },
        GateControl {
            reached: reached_rx,
            release: release_tx,
        },
    )
}

/// Wait at the gate in `slot`, if one is armed. Only the first caller waits.
async fn pass_gate(slot: &Mutex<Option<Gate>>) {
    let gate = slot.lock().unwrap().take();
    if let Some(gate) = gate {
        let _ = gate.reached.send(());
        let _ = gate.release.await;
    }
}

/// Turn and conversation storage held in memory, with switchable failures.
#[derive(Default)]
pub struct InMemoryStore {
    turns: Mutex<Vec<ConversationTurn>>,
    conversations: Mutex<HashMap<String, Conversation>>,
    pub fail_append: AtomicBool,
    pub fail_load: AtomicBool,
    pub loads: AtomicUsize,
    /// Armed gate pauses `load_recent_turns` after it has read storage.
    pub load_gate: Mutex<Option<Gate>>,
}

impl InMemoryStore {
    pub fn turns(&self, conversation_id: &str) -> Vec<ConversationTurn> {
        self.turns
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    pub fn conversation(&self, conversation_id: &str) -> Option<Conversation> {
        self.conversations.lock().unwrap().get(conversation_id).cloned()
    }
}

impl TurnRepository for InMemoryStore {
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<(), RepositoryError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        self.turns.lock().unwrap().push(turn.clone());
        Ok(())
    }

    async fn load_recent_turns(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        let all = self.turns(conversation_id);
        let skip = all.len().saturating_sub(limit);
        let recent = all.into_iter().skip(skip).collect();
        pass_gate(&self.load_gate).await;
        Ok(recent)
    }

    async fn delete_all_turns(&self, conversation_id: &str) -> Result<u64, RepositoryError> {
        let mut turns = self.turns.lock().unwrap();
        let before = turns.len();
        turns.retain(|t| t.conversation_id != conversation_id);
        Ok((before - turns.len()) as u64)
    }
}

impl ConversationRepository for InMemoryStore {
    async fn ensure_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
        title: &str,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        self.conversations
            .lock()
            .unwrap()
            .entry(conversation_id.to_string())
            .or_insert_with(|| Conversation {
                id: conversation_id.to_string(),
                user_id: user_id.to_string(),
                title: Some(title.to_string()),
                prompt_tokens: 0,
                completion_tokens: 0,
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.conversation(conversation_id))
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, RepositoryError> {
        let mut list: Vec<_> = self
            .conversations
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> Result<(), RepositoryError> {
        let mut map = self.conversations.lock().unwrap();
        let conversation = map.get_mut(conversation_id).ok_or(RepositoryError::NotFound)?;
        conversation.title = Some(title.to_string());
        Ok(())
    }

    async fn add_usage(
        &self,
        conversation_id: &str,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> Result<(), RepositoryError> {
        let mut map = self.conversations.lock().unwrap();
        if let Some(conversation) = map.get_mut(conversation_id) {
            conversation.prompt_tokens += u64::from(prompt_tokens);
            conversation.completion_tokens += u64::from(completion_tokens);
            conversation.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        self.conversations.lock().unwrap().remove(conversation_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryModelConfigs {
    configs: Mutex<HashMap<String, ModelConfig>>,
    /// Armed gate pauses `update` after the write.
    pub update_gate: Mutex<Option<Gate>>,
}

impl InMemoryModelConfigs {
    pub fn stored(&self, id: &str) -> Option<ModelConfig> {
        self.configs.lock().unwrap().get(id).cloned()
    }
}

impl ModelConfigRepository for InMemoryModelConfigs {
    async fn list(&self, model_type: Option<ModelType>) -> Result<Vec<ModelConfig>, RepositoryError> {
        let mut list: Vec<_> = self
            .configs
            .lock()
            .unwrap()
            .values()
            .filter(|c| model_type.is_none_or(|t| c.model_type == t))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    async fn get(&self, id: &str) -> Result<Option<ModelConfig>, RepositoryError> {
        Ok(self.configs.lock().unwrap().get(id).cloned())
    }

    async fn create(&self, config: &ModelConfig) -> Result<(), RepositoryError> {
        let mut map = self.configs.lock().unwrap();
        if map.contains_key(&config.id) {
            return Err(RepositoryError::Conflict(config.id.clone()));
        }
        map.insert(config.id.clone(), config.clone());
        Ok(())
    }

    async fn update(&self, config: &ModelConfig) -> Result<(), RepositoryError> {
        {
            let mut map = self.configs.lock().unwrap();
            let slot = map.get_mut(&config.id).ok_or(RepositoryError::NotFound)?;
            *slot = config.clone();
        }
        pass_gate(&self.update_gate).await;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        self.configs
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[derive(Default)]
pub struct InMemoryApps {
    apps: Mutex<HashMap<String, AppProfile>>,
    /// Armed gate pauses `update` after the write.
    pub update_gate: Mutex<Option<Gate>>,
}

impl InMemoryApps {
    pub fn stored(&self, id: &str) -> Option<AppProfile> {
        self.apps.lock().unwrap().get(id).cloned()
    }
}

impl AppProfileRepository for InMemoryApps {
    async fn list(&self) -> Result<Vec<AppProfile>, RepositoryError> {
        let mut list: Vec<_> = self.apps.lock().unwrap().values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    async fn get(&self, id: &str) -> Result<Option<AppProfile>, RepositoryError> {
        Ok(self.apps.lock().unwrap().get(id).cloned())
    }

    async fn create(&self, app: &AppProfile) -> Result<(), RepositoryError> {
        let mut map = self.apps.lock().unwrap();
        if map.contains_key(&app.id) {
            return Err(RepositoryError::Conflict(app.id.clone()));
        }
        map.insert(app.id.clone(), app.clone());
        Ok(())
    }

    async fn update(&self, app: &AppProfile) -> Result<(), RepositoryError> {
        {
            let mut map = self.apps.lock().unwrap();
            let slot = map.get_mut(&app.id).ok_or(RepositoryError::NotFound)?;
            *slot = app.clone();
        }
        pass_gate(&self.update_gate).await;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        self.apps
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}
