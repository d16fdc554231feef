//! The session loop: provider turns, tool execution, and event streaming.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use careers_core::error::{Error, ProviderError};
use careers_core::message::{Conversation, Message, Part, Role};
use careers_core::provider::{Provider, ProviderEvent, ProviderRequest, Usage};
use careers_core::tool::{ToolCall, ToolRegistry};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::prompt::CAREER_COUNSELOR_PROMPT;
use crate::stream_event::SessionEvent;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The model answered without requesting tools.
    Stop,
    /// The step ceiling was reached after a completed tool cycle.
    StepLimit,
}

/// Everything a run produced, delivered once the run is over.
#[derive(Debug)]
pub struct SessionOutcome {
    /// The inbound conversation extended with every message the run added,
    /// including partial work from a failed run.
    pub conversation: Conversation,
    pub steps: u32,
    pub usage: Usage,
    pub result: Result<Termination, Error>,
}

impl SessionOutcome {
    pub fn truncated(&self) -> bool {
        matches!(self.result, Ok(Termination::StepLimit))
    }
}

/// Handle to one in-flight run.
///
/// Events arrive in emission order and end with exactly one terminal event.
/// Dropping the handle (or the event receiver obtained from it) stops the
/// run at its next suspension point.
pub struct SessionRun {
    events: mpsc::Receiver<SessionEvent>,
    outcome: oneshot::Receiver<SessionOutcome>,
    cancel: CancellationToken,
}

impl SessionRun {
    /// Receive the next event, or `None` once the run is over.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Ask the run to stop. It emits a `cancelled` error event if anyone
    /// is still listening.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Keep only the event stream, for transports that just forward events.
    pub fn into_events(self) -> mpsc::Receiver<SessionEvent> {
        self.events
    }

    /// Drain every remaining event, then wait for the outcome.
    pub async fn collect(mut self) -> (Vec<SessionEvent>, Option<SessionOutcome>) {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        (events, self.outcome.await.ok())
    }
}

/// Per-run mutable state, owned by exactly one run task.
struct RunState {
    conversation: Conversation,
    steps: u32,
    usage: Usage,
    /// Every tool-call id present in the conversation.
    call_ids: HashSet<String>,
}

impl RunState {
    fn new(conversation: Conversation) -> Self {
        let call_ids = conversation
            .messages
            .iter()
            .flat_map(|m| m.tool_calls())
            .filter_map(|p| p.call_id())
            .map(str::to_string)
            .collect();
        Self {
            conversation,
            steps: 0,
            usage: Usage::default(),
            call_ids,
        }
    }

    /// Reserve `id` for a new tool call. Ids the conversation already holds
    /// get a numeric suffix so each tool-result still answers one call.
    fn claim_call_id(&mut self, id: String) -> String {
        if self.call_ids.insert(id.clone()) {
            return id;
        }
        let fresh = (2..)
            .map(|n| format!("{id}_{n}"))
            .find(|candidate| !self.call_ids.contains(candidate))
            .unwrap_or_default();
        debug!(reused = %id, renamed = %fresh, "Renaming reused tool-call id");
        self.call_ids.insert(fresh.clone());
        fresh
    }
}

/// Drives a conversation through provider turns and tool calls.
///
/// A `SessionLoop` holds only shared, read-only collaborators and settings,
/// so one instance serves any number of concurrent runs.
#[derive(Clone)]
pub struct SessionLoop {
    provider: Arc<dyn Provider>,
    model: String,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_steps: u32,
    time_budget: Duration,
}

impl SessionLoop {
    /// Create a session loop with the default limits: 5 steps, 30 seconds.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            tools,
            system_prompt: CAREER_COUNSELOR_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: None,
            max_steps: 5,
            time_budget: Duration::from_secs(30),
        }
    }

    /// Create a session loop with the model, limits and prompt from `config`.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &careers_config::AppConfig,
    ) -> Self {
        let mut session = Self::new(provider, &config.default_model, tools)
            .with_temperature(config.default_temperature)
            .with_max_steps(config.session.max_steps)
            .with_time_budget(config.session.time_budget());
        if let Some(max) = config.default_max_tokens {
            session = session.with_max_tokens(max);
        }
        if let Some(prompt) = &config.session.system_prompt_override {
            session = session.with_system_prompt(prompt);
        }
        session
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of tool cycles per run (at least 1).
    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max.max(1);
        self
    }

    /// Set the wall-clock budget for one run.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Check a conversation without starting a run.
    ///
    /// Covers its structure and every tool it references, so a run never
    /// reaches the provider with history the registry cannot account for.
    pub fn preflight(&self, conversation: &Conversation) -> Result<(), Error> {
        conversation.validate()?;
        for message in &conversation.messages {
            for part in message.tool_calls() {
                if let Part::ToolCall { tool_name, .. } = part {
                    self.tools.get(tool_name)?;
                }
            }
        }
        Ok(())
    }

    /// Start a run over `conversation`.
    ///
    /// Pre-flight failures are returned here, before any provider call and
    /// before any event exists. Must be called within a Tokio runtime.
    pub fn run(&self, conversation: Conversation) -> Result<SessionRun, Error> {
        self.preflight(&conversation)?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let this = self.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            let outcome = this.execute(conversation, tx, token).await;
            let _ = outcome_tx.send(outcome);
        });

        Ok(SessionRun {
            events: rx,
            outcome: outcome_rx,
            cancel,
        })
    }

    async fn execute(
        &self,
        conversation: Conversation,
        tx: mpsc::Sender<SessionEvent>,
        cancel: CancellationToken,
    ) -> SessionOutcome {
        info!(
            model = %self.model,
            messages = conversation.len(),
            max_steps = self.max_steps,
            "Session run started"
        );

        let mut state = RunState::new(conversation);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tx.closed() => Err(Error::Cancelled),
            r = tokio::time::timeout(self.time_budget, self.drive(&mut state, &tx)) => {
                r.unwrap_or_else(|_| Err(Error::TimedOut {
                    budget_secs: self.time_budget.as_secs(),
                }))
            }
        };

        let terminal = match &result {
            Ok(termination) => {
                info!(steps = state.steps, ?termination, "Session run finished");
                SessionEvent::Finish {
                    steps: state.steps,
                    truncated: *termination == Termination::StepLimit,
                    usage: state.usage,
                }
            }
            Err(e) => {
                warn!(steps = state.steps, error = %e, "Session run failed");
                SessionEvent::from_error(e)
            }
        };
        let _ = tx.send(terminal).await;

        SessionOutcome {
            conversation: state.conversation,
            steps: state.steps,
            usage: state.usage,
            result,
        }
    }

    async fn drive(
        &self,
        state: &mut RunState,
        tx: &mpsc::Sender<SessionEvent>,
    ) -> Result<Termination, Error> {
        let tool_definitions = self.tools.definitions();

        loop {
            let request = ProviderRequest {
                model: self.model.clone(),
                system: Some(self.system_prompt.clone()),
                messages: state.conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            debug!(step = state.steps + 1, "Requesting provider turn");
            let mut stream = self.provider.stream(request).await?;

            let mut text = String::new();
            let mut calls: Vec<ToolCall> = Vec::new();
            let mut ended = false;

            while let Some(item) = stream.recv().await {
                match item? {
                    ProviderEvent::TextDelta { text: delta } => {
                        text.push_str(&delta);
                        emit(tx, SessionEvent::TextDelta { delta }).await?;
                    }
                    ProviderEvent::ToolCall { mut call } => {
                        call.id = state.claim_call_id(call.id);
                        emit(
                            tx,
                            SessionEvent::ToolCall {
                                call_id: call.id.clone(),
                                tool_name: call.name.clone(),
                                input: call.input.clone(),
                            },
                        )
                        .await?;
                        calls.push(call);
                    }
                    ProviderEvent::End { usage, .. } => {
                        if let Some(usage) = usage {
                            state.usage += usage;
                        }
                        ended = true;
                        break;
                    }
                }
            }

            if !ended {
                return Err(ProviderError::StreamInterrupted(
                    "provider stream closed without an end event".into(),
                )
                .into());
            }

            let mut parts = Vec::with_capacity(calls.len() + 1);
            if !text.is_empty() {
                parts.push(Part::text(text));
            }
            parts.extend(calls.iter().map(|call| Part::ToolCall {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                input: call.input.clone(),
            }));
            if !parts.is_empty() {
                state
                    .conversation
                    .push(Message::new(Role::Assistant, parts));
            }

            if calls.is_empty() {
                return Ok(Termination::Stop);
            }

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                debug!(tool = %call.name, call_id = %call.id, "Executing tool");
                let result = self.tools.execute(call).await?;
                emit(
                    tx,
                    SessionEvent::ToolResult {
                        call_id: result.call_id.clone(),
                        tool_name: result.name.clone(),
                        output: result.output.clone(),
                    },
                )
                .await?;
                results.push(Part::ToolResult {
                    call_id: result.call_id,
                    tool_name: result.name,
                    output: result.output,
                });
            }
            state.conversation.push(Message::tool(results));
            state.steps += 1;

            if state.steps >= self.max_steps {
                warn!(max_steps = self.max_steps, "Step ceiling reached, truncating run");
                return Ok(Termination::StepLimit);
            }
        }
    }
}

/// Send one event; a closed channel means nobody is listening anymore.
async fn emit(tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) -> Result<(), Error> {
    tx.send(event).await.map_err(|_| Error::Cancelled)
}
