//! The turn loop.
//!
//! One inbound user message becomes at most `max_rounds` model calls:
//!
//! 1. **Request** the model with the rolling history, the system instruction
//!    and the full tool catalog
//! 2. **Text only**: persist it as the assistant turn and return it
//! 3. **Calls**: dispatch each in order; the first result carrying a reply
//!    ends the turn with that text (no further model call)
//! 4. Otherwise append the calls and their results to the history and go to 1

use std::sync::Arc;
use std::time::Instant;
use chrono::Utc;
use offerdesk_config::{ModelConfig, OrchestratorConfig};
use offerdesk_core::error::{ProviderError, StoreError, ToolError};
use offerdesk_core::event::{DomainEvent, EventBus};
use offerdesk_core::message::{FileId, NewTurn, UserId};
use offerdesk_core::provider::{GenerateRequest, GenerateResponse, ModelTurn, Provider};
use offerdesk_core::store::{ConversationStore, FileMeta, FileStore};
use offerdesk_core::tool::{CallOutcome, CallResult};
use offerdesk_store::Stores;
use offerdesk_tools::{Dispatcher, catalog};
use tracing::{debug, error, info, warn};
use crate::history::HistoryFormatter;
use crate::instruction::SystemInstruction;

/// Why a turn ended without a reply.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("model returned neither text nor function calls")]
    NoResponse,

    #[error("no reply after {rounds} rounds")]
    MaxRounds { rounds: u32 },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TurnError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TurnError::NoResponse => FailureKind::NoResponse,
            TurnError::MaxRounds { .. } => FailureKind::MaxRounds,
            TurnError::Tool(_) | TurnError::Provider(_) | TurnError::Store(_) => FailureKind::Internal,
        }
    }
}

/// The caller-facing failure marker. Carries no model or store diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NoResponse,
    MaxRounds,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NoResponse => "no_response",
            FailureKind::MaxRounds => "max_rounds",
            FailureKind::Internal => "internal",
        }
    }
}

/// The message shown to the user; identical to the persisted assistant turn.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub attachment: Option<FileMeta>,
}

#[derive(Debug, Clone)]
pub enum TurnOutcome {
    Reply(Reply),
    Failed(FailureKind),
}

/// Loop state threaded from one round into the next.
#[derive(Debug, Clone, Default)]
pub struct RoundState {
    pub history: Vec<ModelTurn>,
    /// Rounds completed so far
    pub round: u32,
}

enum Step {
    Done(Reply),
    Next(RoundState),
}

/// The first call result that ends the turn, if any.
pub fn early_exit(results: &[CallResult]) -> Option<(&str, Option<&FileId>)> {
    results.iter().find_map(|r| match &r.outcome {
        CallOutcome::Reply { text, attachment } => Some((text.as_str(), attachment.as_ref())),
        CallOutcome::Continue => None,
    })
}

/// Drives a user's inbound message to a reply.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    dispatcher: Dispatcher,
    history: HistoryFormatter,
    conversations: Arc<dyn ConversationStore>,
    files: Arc<dyn FileStore>,
    instruction: Arc<dyn SystemInstruction>,
    event_bus: Arc<EventBus>,
    model: String,
    temperature: f32,
    max_output_tokens: Option<u32>,
    max_rounds: u32,
    history_limit: usize,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, stores: Stores, instruction: Arc<dyn SystemInstruction>) -> Self {
        let defaults = OrchestratorConfig::default();
        let model = ModelConfig::default();
        Self {
            provider,
            dispatcher: Dispatcher::new(stores.offers.clone(), stores.files.clone()),
            history: HistoryFormatter::new(stores.conversations.clone(), stores.files.clone()),
            conversations: stores.conversations,
            files: stores.files,
            instruction,
            event_bus: Arc::new(EventBus::default()),
            model: model.name,
            temperature: model.temperature,
            max_output_tokens: Some(model.max_output_tokens),
            max_rounds: defaults.max_rounds,
            history_limit: defaults.history_limit,
        }
    }

    /// Apply model and loop settings from configuration.
    pub fn configured(self, model: &ModelConfig, orchestrator: &OrchestratorConfig) -> Self {
        self.with_model(&model.name)
            .with_temperature(model.temperature)
            .with_max_output_tokens(model.max_output_tokens)
            .with_max_rounds(orchestrator.max_rounds)
            .with_history_limit(orchestrator.history_limit)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    /// Set the hard cap on model calls per turn. Zero is treated as one.
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    /// Set how many stored turns are replayed. Zero is treated as one.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Handle the latest inbound message of `user_id`.
    ///
    /// Errors are logged here and reduced to a [`FailureKind`].
    pub async fn handle(&self, user_id: &UserId) -> TurnOutcome {
        match self.run(user_id).await {
            Ok(reply) => TurnOutcome::Reply(reply),
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Turn failed");
                self.event_bus.publish(DomainEvent::TurnFailed {
                    user_id: user_id.to_string(),
                    reason: e.kind().as_str().into(),
                    timestamp: Utc::now(),
                });
                TurnOutcome::Failed(e.kind())
            }
        }
    }

    /// Run the loop for `user_id`. The inbound message must already be stored.
    pub async fn run(&self, user_id: &UserId) -> Result<Reply, TurnError> {
        let system_instruction = self.instruction.build(user_id).await?;
        let history = self.history.format(user_id, self.history_limit).await?;

        info!(
            user_id = %user_id,
            history = history.len(),
            max_rounds = self.max_rounds,
            "Processing turn"
        );

        let mut state = RoundState { history, round: 0 };
        while state.round < self.max_rounds {
            state = match self.round(user_id, &system_instruction, state).await? {
                Step::Done(reply) => return Ok(reply),
                Step::Next(next) => next,
            };
        }

        warn!(user_id = %user_id, rounds = self.max_rounds, "Round cap reached without a reply");
        Err(TurnError::MaxRounds { rounds: self.max_rounds })
    }

    async fn round(&self, user_id: &UserId, system_instruction: &str, state: RoundState) -> Result<Step, TurnError> {
        let round = state.round + 1;
        debug!(user_id = %user_id, round, "Requesting model");

        let response = self
            .provider
            .generate(GenerateRequest {
                model: self.model.clone(),
                history: state.history.clone(),
                system_instruction: system_instruction.to_string(),
                tools: catalog().to_vec(),
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            })
            .await?;
        self.publish_response(user_id, round, &response);

        if response.calls.is_empty() {
            let text = response.trimmed_text().ok_or(TurnError::NoResponse)?;
            let reply = self.persist(user_id, text.to_string(), None).await?;
            self.publish_completed(user_id, round, false);
            return Ok(Step::Done(reply));
        }

        let mut results = Vec::with_capacity(response.calls.len());
        for call in &response.calls {
            let started = Instant::now();
            let result = self.dispatcher.dispatch(user_id, call).await?;
            self.event_bus.publish(DomainEvent::ToolExecuted {
                user_id: user_id.to_string(),
                tool_name: call.name.clone(),
                success: result.is_success(),
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });
            results.push(result);
        }

        if let Some((text, attachment)) = early_exit(&results) {
            info!(user_id = %user_id, round, "Tool reply ends the turn");
            let reply = self.persist(user_id, text.to_string(), attachment.cloned()).await?;
            self.publish_completed(user_id, round, true);
            return Ok(Step::Done(reply));
        }

        let RoundState { mut history, .. } = state;
        history.push(ModelTurn::calls(&response.calls));
        history.push(ModelTurn::results(&results));
        Ok(Step::Next(RoundState { history, round }))
    }

    /// Store the reply as an assistant turn. An attachment that no longer
    /// resolves is dropped and the reply goes out as text only.
    async fn persist(&self, user_id: &UserId, text: String, attachment: Option<FileId>) -> Result<Reply, TurnError> {
        let attachment = match attachment {
            Some(id) => match self.files.resolve_file(&id).await {
                Ok(meta) => Some(meta),
                Err(e) => {
                    warn!(user_id = %user_id, file_id = %id, error = %e, "Sending reply without attachment");
                    None
                }
            },
            None => None,
        };

        let mut turn = NewTurn::assistant(user_id.clone(), text.clone());
        if let Some(meta) = &attachment {
            turn = turn.with_attachment(meta.id.clone());
        }
        self.conversations.append_turn(turn).await?;

        Ok(Reply { text, attachment })
    }

    fn publish_response(&self, user_id: &UserId, round: u32, response: &GenerateResponse) {
        self.event_bus.publish(DomainEvent::ResponseGenerated {
            user_id: user_id.to_string(),
            model: response.model.clone(),
            round,
            tokens_used: response.usage.as_ref().map_or(0, |u| u.total_tokens),
            timestamp: Utc::now(),
        });
    }

    fn publish_completed(&self, user_id: &UserId, rounds: u32, early_exit: bool) {
        self.event_bus.publish(DomainEvent::TurnCompleted {
            user_id: user_id.to_string(),
            rounds,
            early_exit,
            timestamp: Utc::now(),
        });
    }
}
