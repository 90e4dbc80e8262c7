//! ChatOrchestrator: one chat exchange from request to terminal fragment.
//!
//! Every streaming request runs on its own tokio task and moves through
//! `Resolving → MemoryLoaded → Generating → Streaming* → Completed | Failed`,
//! or `Cancelled` when the consumer goes away. The user turn is persisted
//! before generation starts and the assistant turn before `Done` is sent,
//! so a client that sees `Done` can immediately read the full exchange back.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use confab_types::chat::{ChatRequest, ConversationTurn, DeriveKind, StreamFragment, TextReply};
use confab_types::config::ChatConfig;
use confab_types::error::{ChatError, ConfigError};
use confab_types::llm::{CompletionRequest, Message, MessageRole, StreamEvent, Usage};
use confab_types::provider::{Capability, ModelConfig, ModelType};

use super::prompt;
use crate::app::AppStore;
use crate::llm::box_provider::BoxLlmProvider;
use crate::memory::ConversationMemory;
use crate::provider::factory::{ClientBuilder, ModelClientFactory};
use crate::repository::conversation::{ConversationRepository, TurnRepository};
use crate::stream::{StreamChannel, StreamReceiver, StreamSender};

/// Lifecycle of a single chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Resolving,
    MemoryLoaded,
    Generating,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for ChatPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChatPhase::Resolving => "resolving",
            ChatPhase::MemoryLoaded => "memory_loaded",
            ChatPhase::Generating => "generating",
            ChatPhase::Streaming => "streaming",
            ChatPhase::Completed => "completed",
            ChatPhase::Failed => "failed",
            ChatPhase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// How a streaming exchange ended, as seen by the generation task.
#[derive(Debug, Clone)]
pub enum ChatOutcome {
    Completed { usage: Usage, elapsed_ms: u64 },
    Failed(ChatError),
    Cancelled,
}

/// Handle to a running streaming exchange.
pub struct ChatStream {
    pub conversation_id: String,
    pub fragments: StreamReceiver,
    pub task: JoinHandle<ChatOutcome>,
}

/// Model, client and profile-derived settings for one request.
struct Resolved {
    config: ModelConfig,
    client: Arc<BoxLlmProvider>,
    prompt: Option<String>,
    knowledge_ids: Vec<String>,
}

pub struct ChatOrchestrator<R, B>
where
    R: TurnRepository + ConversationRepository + 'static,
    B: ClientBuilder,
{
    memory: Arc<ConversationMemory<R>>,
    factory: Arc<ModelClientFactory<B>>,
    apps: Arc<AppStore>,
    config: ChatConfig,
}

fn transition(conversation_id: &str, phase: ChatPhase) {
    debug!(conversation_id, %phase, "chat phase");
}

fn new_conversation_id() -> String {
    Uuid::now_v7().simple().to_string()
}

impl<R, B> ChatOrchestrator<R, B>
where
    R: TurnRepository + ConversationRepository + 'static,
    B: ClientBuilder,
{
    pub fn new(
        memory: Arc<ConversationMemory<R>>,
        factory: Arc<ModelClientFactory<B>>,
        apps: Arc<AppStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            memory,
            factory,
            apps,
            config,
        }
    }

    pub fn memory(&self) -> &Arc<ConversationMemory<R>> {
        &self.memory
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Start a streaming exchange.
    ///
    /// Returns immediately; fragments arrive on the returned receiver. A
    /// missing conversation id is generated here so the caller can report
    /// it before the first fragment.
    pub fn chat(self: &Arc<Self>, request: ChatRequest) -> ChatStream {
        let conversation_id = request
            .conversation_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_conversation_id);
        let (sender, fragments) =
            StreamChannel::new(self.config.stream_buffer, self.config.send_timeout());

        let span = info_span!(
            "chat.exchange",
            conversation_id = %conversation_id,
            user_id = %request.user_id,
        );
        let this = Arc::clone(self);
        let id = conversation_id.clone();
        let task = tokio::spawn(async move { this.run(id, request, sender).await }.instrument(span));

        ChatStream {
            conversation_id,
            fragments,
            task,
        }
    }

    async fn run(&self, conversation_id: String, request: ChatRequest, sender: StreamSender) -> ChatOutcome {
        let started = Instant::now();
        transition(&conversation_id, ChatPhase::Resolving);
        let resolved = match self.resolve(&request, Capability::StreamingChat) {
            Ok(resolved) => resolved,
            Err(e) => return fail(&sender, &conversation_id, e).await,
        };

        let (system, messages) = match self.prepare(&conversation_id, &request, &resolved).await {
            Ok(prepared) => prepared,
            Err(e) => return fail(&sender, &conversation_id, e).await,
        };

        transition(&conversation_id, ChatPhase::Generating);
        let completion = build_request(&resolved.config, system, messages, true);
        let span = info_span!(
            "chat.generate",
            gen_ai.system = resolved.client.name(),
            gen_ai.request.model = %completion.model,
            gen_ai.request.max_tokens = completion.max_tokens,
            gen_ai.request.temperature = ?completion.temperature,
            gen_ai.request.stream = true,
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            knowledge_ids = resolved.knowledge_ids.len(),
        );

        self.generate(&conversation_id, &request.user_id, &resolved, completion, &sender, started)
            .instrument(span)
            .await
    }

    async fn generate(
        &self,
        conversation_id: &str,
        user_id: &str,
        resolved: &Resolved,
        completion: CompletionRequest,
        sender: &StreamSender,
        started: Instant,
    ) -> ChatOutcome {
        let cancel = sender.cancellation();
        let deadline = tokio::time::sleep(self.config.generation_timeout());
        tokio::pin!(deadline);

        let mut events = resolved.client.stream(completion);
        let mut text = String::new();
        let mut usage = Usage::default();
        let mut streaming = false;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    transition(conversation_id, ChatPhase::Cancelled);
                    info!(conversation_id, chars = text.len(), "consumer went away, generation abandoned");
                    return ChatOutcome::Cancelled;
                }

                _ = &mut deadline => {
                    let err = ChatError::Timeout(self.config.generation_timeout_secs);
                    warn!(conversation_id, "generation timed out");
                    let _ = sender.error(err.to_string()).await;
                    sender.cancel();
                    transition(conversation_id, ChatPhase::Failed);
                    return ChatOutcome::Failed(err);
                }

                event = events.next() => match event {
                    Some(Ok(StreamEvent::TextDelta { text: delta, .. })) => {
                        if !streaming {
                            transition(conversation_id, ChatPhase::Streaming);
                            streaming = true;
                        }
                        text.push_str(&delta);
                        if sender.send(StreamFragment::Text { text: delta }).await.is_err() {
                            transition(conversation_id, ChatPhase::Cancelled);
                            return ChatOutcome::Cancelled;
                        }
                    }
                    Some(Ok(StreamEvent::Usage(reported))) => usage = reported,
                    Some(Ok(StreamEvent::Done)) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return fail(sender, conversation_id, e.into()).await,
                }
            }
        }
        drop(events);

        let span = tracing::Span::current();
        span.record("gen_ai.usage.input_tokens", usage.input_tokens);
        span.record("gen_ai.usage.output_tokens", usage.output_tokens);

        let elapsed = started.elapsed();
        let mut turn = ConversationTurn::assistant(conversation_id, user_id, text);
        turn.prompt_tokens = Some(usage.input_tokens);
        turn.completion_tokens = Some(usage.output_tokens);
        turn.model = Some(resolved.config.model.clone());
        turn.response_ms = Some(elapsed.as_millis() as u64);
        if let Err(e) = self.memory.append(conversation_id, turn).await {
            return fail(sender, conversation_id, e.into()).await;
        }
        self.record_usage(conversation_id, usage).await;

        transition(conversation_id, ChatPhase::Completed);
        let _ = sender.complete(usage, elapsed).await;
        info!(
            conversation_id,
            prompt_tokens = usage.input_tokens,
            completion_tokens = usage.output_tokens,
            elapsed_ms = elapsed.as_millis() as u64,
            "chat completed"
        );
        ChatOutcome::Completed {
            usage,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Non-streaming exchange. Same resolution and memory handling as
    /// [`Self::chat`], with a single `complete` call.
    pub async fn text(&self, request: ChatRequest) -> Result<TextReply, ChatError> {
        let conversation_id = request
            .conversation_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_conversation_id);
        let started = Instant::now();

        transition(&conversation_id, ChatPhase::Resolving);
        let resolved = self.resolve(&request, Capability::Chat)?;
        let (system, messages) = self.prepare(&conversation_id, &request, &resolved).await?;

        transition(&conversation_id, ChatPhase::Generating);
        let completion = build_request(&resolved.config, system, messages, false);
        let span = info_span!(
            "chat.complete",
            gen_ai.system = resolved.client.name(),
            gen_ai.request.model = %completion.model,
            gen_ai.request.stream = false,
        );
        let timeout = self.config.generation_timeout();
        let response = tokio::time::timeout(timeout, resolved.client.complete(&completion).instrument(span))
            .await
            .map_err(|_| ChatError::Timeout(self.config.generation_timeout_secs))??;

        let elapsed = started.elapsed();
        let mut turn = ConversationTurn::assistant(&conversation_id, &request.user_id, response.content.clone());
        turn.prompt_tokens = Some(response.usage.input_tokens);
        turn.completion_tokens = Some(response.usage.output_tokens);
        turn.model = Some(resolved.config.model.clone());
        turn.response_ms = Some(elapsed.as_millis() as u64);
        self.memory.append(&conversation_id, turn).await?;
        self.record_usage(&conversation_id, response.usage).await;
        transition(&conversation_id, ChatPhase::Completed);

        Ok(TextReply {
            conversation_id,
            text: response.content,
            model: resolved.config.model,
            prompt_tokens: response.usage.input_tokens,
            completion_tokens: response.usage.output_tokens,
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }

    /// Run a derived-text template (mind map, summary) over `text`.
    ///
    /// Stateless: no conversation is created and memory is not touched.
    pub async fn derive(
        &self,
        kind: DeriveKind,
        text: &str,
        model_id: Option<&str>,
    ) -> Result<String, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let (config, client) = self.resolve_model(model_id, Capability::Chat)?;
        let messages = vec![Message::new(MessageRole::User, prompt::render(kind, text))];
        let completion = build_request(&config, None, messages, false);

        let span = info_span!(
            "chat.derive",
            %kind,
            gen_ai.system = client.name(),
            gen_ai.request.model = %completion.model,
        );
        let response = tokio::time::timeout(
            self.config.generation_timeout(),
            client.complete(&completion).instrument(span),
        )
        .await
        .map_err(|_| ChatError::Timeout(self.config.generation_timeout_secs))??;
        Ok(response.content)
    }

    /// Resolve app profile, model config and client. No side effects.
    fn resolve(&self, request: &ChatRequest, capability: Capability) -> Result<Resolved, ChatError> {
        if request.message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let profile = request.app_id.as_deref().and_then(|id| self.apps.get(id));

        let model_id = request
            .model_id
            .clone()
            .or_else(|| profile.as_ref().and_then(|p| p.model_id.clone()));
        let prompt = request
            .prompt
            .clone()
            .or_else(|| profile.as_ref().and_then(|p| p.prompt.clone()));
        let knowledge_ids = profile.map(|p| p.knowledge_ids).unwrap_or_default();

        let (config, client) = self.resolve_model(model_id.as_deref(), capability)?;
        Ok(Resolved {
            config,
            client,
            prompt,
            knowledge_ids,
        })
    }

    fn resolve_model(
        &self,
        model_id: Option<&str>,
        capability: Capability,
    ) -> Result<(ModelConfig, Arc<BoxLlmProvider>), ConfigError> {
        let model_id = model_id
            .filter(|id| !id.trim().is_empty())
            .or(self.config.default_model_id.as_deref())
            .ok_or(ConfigError::NoModelSelected)?;
        let config = self
            .factory
            .config(model_id)
            .ok_or_else(|| ConfigError::ModelNotFound(model_id.to_string()))?;
        if config.model_type != ModelType::Chat {
            return Err(ConfigError::WrongModelType {
                id: config.id,
                expected: ModelType::Chat,
                actual: config.model_type,
            });
        }

        let client = match capability {
            Capability::StreamingChat => self.factory.streaming_client(model_id)?,
            _ => self.factory.chat_client(model_id)?,
        };
        let client = client.ok_or_else(|| ConfigError::UnsupportedCapability {
            provider: config.provider.clone(),
            capability,
        })?;
        Ok((config, client))
    }

    /// Persist the user turn and read the window it landed in.
    async fn prepare(
        &self,
        conversation_id: &str,
        request: &ChatRequest,
        resolved: &Resolved,
    ) -> Result<(Option<String>, Vec<Message>), ChatError> {
        if request.preload {
            self.memory.reload(conversation_id).await?;
        }
        self.memory
            .repository()
            .ensure_conversation(
                conversation_id,
                &request.user_id,
                &prompt::title_from_message(&request.message),
            )
            .await?;
        let snapshot = self
            .memory
            .append(
                conversation_id,
                ConversationTurn::user(conversation_id, &request.user_id, request.message.as_str()),
            )
            .await?;
        transition(conversation_id, ChatPhase::MemoryLoaded);

        let system = resolved.prompt.clone().or(snapshot.system);
        let messages = snapshot
            .turns
            .iter()
            .map(|turn| Message::new(turn.role, turn.text.as_str()))
            .collect();
        Ok((system, messages))
    }

    async fn record_usage(&self, conversation_id: &str, usage: Usage) {
        if let Err(e) = self
            .memory
            .repository()
            .add_usage(conversation_id, usage.input_tokens, usage.output_tokens)
            .await
        {
            warn!(conversation_id, error = %e, "failed to update conversation token totals");
        }
    }
}

async fn fail(sender: &StreamSender, conversation_id: &str, err: ChatError) -> ChatOutcome {
    warn!(conversation_id, error = %err, "chat failed");
    let _ = sender.error(err.to_string()).await;
    transition(conversation_id, ChatPhase::Failed);
    ChatOutcome::Failed(err)
}

fn build_request(
    config: &ModelConfig,
    system: Option<String>,
    messages: Vec<Message>,
    stream: bool,
) -> CompletionRequest {
    CompletionRequest {
        model: config.model.clone(),
        messages,
        system,
        max_tokens: config.response_limit,
        temperature: Some(config.temperature),
        top_p: (config.top_p > 0.0).then_some(config.top_p),
        stream,
    }
}
