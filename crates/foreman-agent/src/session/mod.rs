//! Agent sessions and the completion-request loop.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use foreman_llm::{
    Client, CompletionError, FinishReason, Message, Request, Response, ResponseAccumulator,
    Role, StreamEventStream, ToolCall, ToolChoice,
};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::config::{ModelConfig, SessionConfig};
use crate::editor::EditApplier;
use crate::errors::{AgentError, ProtocolError};
use crate::events::{EventEmitter, EventKind, NoopEventEmitter, SessionEvent};
use crate::interpreter::CommandInterpreter;
use crate::prompts;
use crate::tools;
use crate::transcript::Transcript;

mod dispatch;
mod editor;
mod state;
#[cfg(test)]
mod tests;

use dispatch::ToolFlow;
pub use state::{SessionState, TurnOutcome};

/// What a session is: the manager orchestrates tools and delegation, the
/// editor holds a plain conversation whose replies become edits.
enum RoleBindings {
    Manager {
        interpreter: Arc<dyn CommandInterpreter>,
        applier: Arc<dyn EditApplier>,
    },
    Editor,
}

/// One agent conversation: transcript, cost accounting, and the loop that
/// drives it. Exactly one completion request is in flight at a time; all
/// mutation happens through `&mut self`.
pub struct Session {
    id: String,
    role: RoleBindings,
    model: Arc<ModelConfig>,
    config: SessionConfig,
    client: Arc<Client>,
    emitter: Arc<dyn EventEmitter>,
    transcript: Transcript,
    state: SessionState,
    cost: f64,
    commit_hashes: BTreeSet<String>,
    abort_requested: Arc<AtomicBool>,
    abort_notify: Arc<Notify>,
}

/// Cloneable cancellation handle. Takes effect at stream-accumulation and
/// backoff points; the turn aborts without corrupting the transcript.
#[derive(Clone)]
pub struct AbortHandle {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl AbortHandle {
    pub fn request_abort(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

impl Session {
    pub fn manager(
        model: Arc<ModelConfig>,
        client: Arc<Client>,
        config: SessionConfig,
        interpreter: Arc<dyn CommandInterpreter>,
        applier: Arc<dyn EditApplier>,
    ) -> Result<Self, AgentError> {
        Self::manager_with_emitter(
            model,
            client,
            config,
            interpreter,
            applier,
            Arc::new(NoopEventEmitter),
        )
    }

    pub fn manager_with_emitter(
        model: Arc<ModelConfig>,
        client: Arc<Client>,
        config: SessionConfig,
        interpreter: Arc<dyn CommandInterpreter>,
        applier: Arc<dyn EditApplier>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<Self, AgentError> {
        Self::new(
            RoleBindings::Manager { interpreter, applier },
            model,
            client,
            config,
            emitter,
            Arc::new(AtomicBool::new(false)),
            Arc::new(Notify::new()),
        )
    }

    /// Editor sessions are built only by the delegation spawner; they share
    /// the parent's cancellation pair so an interrupt reaches the child.
    pub(crate) fn editor(
        model: Arc<ModelConfig>,
        client: Arc<Client>,
        config: SessionConfig,
        emitter: Arc<dyn EventEmitter>,
        abort_requested: Arc<AtomicBool>,
        abort_notify: Arc<Notify>,
    ) -> Result<Self, AgentError> {
        Self::new(
            RoleBindings::Editor,
            model,
            client,
            config,
            emitter,
            abort_requested,
            abort_notify,
        )
    }

    fn new(
        role: RoleBindings,
        model: Arc<ModelConfig>,
        client: Arc<Client>,
        config: SessionConfig,
        emitter: Arc<dyn EventEmitter>,
        abort_requested: Arc<AtomicBool>,
        abort_notify: Arc<Notify>,
    ) -> Result<Self, AgentError> {
        let session = Self {
            id: Uuid::new_v4().to_string(),
            role,
            model,
            config,
            client,
            emitter,
            transcript: Transcript::new(),
            state: SessionState::Idle,
            cost: 0.0,
            commit_hashes: BTreeSet::new(),
            abort_requested,
            abort_notify,
        };
        session.emit(SessionEvent::new(EventKind::SessionStart, &session.id))?;
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_manager(&self) -> bool {
        matches!(self.role, RoleBindings::Manager { .. })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Cumulative dollar cost of this session, including folded-in
    /// delegation cost.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn commit_hashes(&self) -> &BTreeSet<String> {
        &self.commit_hashes
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Settle the current turn's messages. Called by the harness between
    /// user turns.
    pub fn settle_turn(&mut self) {
        self.transcript.settle();
    }

    /// Discard conversation state for a fresh task, keeping cost and commit
    /// accounting. Also clears a terminal state, so the harness can reuse
    /// the session for the next task.
    pub fn reset(&mut self) {
        self.transcript = Transcript::new();
        self.state = SessionState::Idle;
        self.abort_requested.store(false, Ordering::SeqCst);
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            requested: self.abort_requested.clone(),
            notify: self.abort_notify.clone(),
        }
    }

    /// Run one user turn through the plan -> act -> observe cycle until the
    /// model replies without tool calls, the task is declared finished, or
    /// the turn aborts.
    pub async fn submit(
        &mut self,
        user_input: impl Into<String>,
    ) -> Result<TurnOutcome, AgentError> {
        if self.state == SessionState::Terminated {
            return Err(AgentError::SessionTerminated);
        }
        let user_input = user_input.into();
        self.emit(
            SessionEvent::new(EventKind::UserInput, &self.id).with("content", user_input.clone()),
        )?;
        self.transcript.append(Message::user(user_input));

        let outcome = Box::pin(self.drive_turn()).await;
        match &outcome {
            Ok(_) => {}
            Err(AgentError::Cancelled) => {
                self.transcript.rollback_unresolved();
                let _ = self.emit(SessionEvent::turn_aborted(&self.id, "cancelled"));
                self.force_idle();
            }
            // Protocol errors are fatal; state is left as-is for post-mortem.
            Err(AgentError::Protocol(_)) => {}
            Err(error) => {
                let _ = self.emit(SessionEvent::turn_aborted(&self.id, &error.to_string()));
                self.force_idle();
            }
        }
        outcome
    }

    async fn drive_turn(&mut self) -> Result<TurnOutcome, AgentError> {
        let mut rounds = 0usize;
        loop {
            if self.abort_was_requested() {
                return Err(AgentError::Cancelled);
            }
            if rounds >= self.config.max_tool_rounds_per_input {
                self.emit(
                    SessionEvent::new(EventKind::RoundLimit, &self.id)
                        .with("rounds", rounds as u64),
                )?;
                let text = self.latest_assistant_text();
                self.transition_to(SessionState::Idle)?;
                return Ok(TurnOutcome::Reply(text));
            }

            let unresolved = self.transcript.unresolved_call_ids();
            if !unresolved.is_empty() {
                return Err(ProtocolError::UnresolvedCalls(unresolved).into());
            }

            let request = self.build_request();
            self.transition_to(SessionState::AwaitingCompletion)?;
            let response = self.request_completion(request).await?;
            self.cost += self.model.cost_of(&response.usage);

            let tool_calls = response.message.tool_calls.clone();
            let narration = self.narration_for(&response, &tool_calls);
            self.emit(
                SessionEvent::new(EventKind::AssistantReply, &self.id)
                    .with("content", narration.clone())
                    .with("tool_call_count", tool_calls.len() as u64),
            )?;

            if tool_calls.is_empty() || !self.is_manager() {
                self.transcript.append(Message::assistant(narration.clone()));
                self.transition_to(SessionState::Idle)?;
                return Ok(TurnOutcome::Reply(narration));
            }

            self.transcript.append(Message::assistant_with_tool_calls(
                Some(narration.clone()),
                tool_calls.clone(),
            ));
            self.transition_to(SessionState::Dispatching)?;
            match self.dispatch_batch(&tool_calls, &narration).await? {
                ToolFlow::Finished => {
                    self.emit(SessionEvent::new(EventKind::TaskFinished, &self.id))?;
                    self.transition_to(SessionState::Terminated)?;
                    return Ok(TurnOutcome::Finished);
                }
                ToolFlow::Continue => {}
            }

            let unresolved = self.transcript.unresolved_call_ids();
            if !unresolved.is_empty() {
                return Err(ProtocolError::UnresolvedCalls(unresolved).into());
            }
            rounds += 1;
        }
    }

    /// Send one request, classifying failures: transient errors back off
    /// and retry, output cutoffs continue via assistant prefill, everything
    /// else aborts the turn. Nothing touches the transcript until a stream
    /// completes successfully.
    async fn request_completion(&mut self, request: Request) -> Result<Response, AgentError> {
        let mut attempt: u32 = 0;
        let mut continuation: Option<String> = None;
        loop {
            if self.abort_was_requested() {
                return Err(AgentError::Cancelled);
            }
            let outgoing = match &continuation {
                Some(partial) => request.with_assistant_prefix(partial),
                None => request.clone(),
            };
            let stream = match self.client.stream(outgoing).await {
                Ok(stream) => stream,
                Err(error) if error.is_transient() => {
                    attempt += 1;
                    self.backoff(attempt, error).await?;
                    continue;
                }
                Err(error) => return Err(error.into()),
            };

            self.transition_to(SessionState::Accumulating)?;
            let mut accumulator = match &continuation {
                Some(partial) => ResponseAccumulator::continuing_from(partial),
                None => ResponseAccumulator::new(),
            };
            match self.drain_stream(stream, &mut accumulator).await {
                Ok(()) => {}
                Err(AgentError::Completion(error)) if error.is_transient() => {
                    self.transition_to(SessionState::AwaitingCompletion)?;
                    attempt += 1;
                    self.backoff(attempt, error).await?;
                    continue;
                }
                Err(error) => return Err(error),
            }

            if accumulator.finish_reason() == Some(&FinishReason::Length) {
                if !self.model.supports_assistant_prefill {
                    return Err(AgentError::Exhausted(
                        "output limit reached and the model does not support reply continuation"
                            .to_string(),
                    ));
                }
                continuation = Some(accumulator.text().to_string());
                self.emit(
                    SessionEvent::new(EventKind::ContinuationIssued, &self.id)
                        .with("accumulated_chars", accumulator.text().len() as u64),
                )?;
                self.transition_to(SessionState::AwaitingCompletion)?;
                attempt = 0;
                continue;
            }

            let response =
                accumulator.into_response(Uuid::new_v4().to_string(), self.model.name.clone())?;
            return Ok(response);
        }
    }

    async fn drain_stream(
        &mut self,
        mut stream: StreamEventStream,
        accumulator: &mut ResponseAccumulator,
    ) -> Result<(), AgentError> {
        loop {
            let next = tokio::select! {
                event = stream.next() => event,
                _ = self.abort_notify.notified() => {
                    if self.abort_was_requested() {
                        return Err(AgentError::Cancelled);
                    }
                    continue;
                }
            };
            let Some(event) = next else {
                return Ok(());
            };
            accumulator.absorb(&event?);
        }
    }

    async fn backoff(&mut self, attempt: u32, error: CompletionError) -> Result<(), AgentError> {
        let Some(delay_ms) = self.config.retry.delay_for_attempt_ms(attempt) else {
            return Err(error.into());
        };
        self.emit(SessionEvent::retry_scheduled(&self.id, attempt, delay_ms))?;
        let sleep = tokio::time::sleep(Duration::from_millis(delay_ms));
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(()),
                _ = self.abort_notify.notified() => {
                    if self.abort_was_requested() {
                        return Err(AgentError::Cancelled);
                    }
                }
            }
        }
    }

    fn build_request(&self) -> Request {
        let (system, tools) = match &self.role {
            RoleBindings::Manager { .. } => {
                (prompts::MANAGER_SYSTEM, Some(tools::tool_definitions()))
            }
            RoleBindings::Editor => (prompts::EDITOR_SYSTEM, None),
        };
        let mut messages = Vec::with_capacity(self.transcript.len() + 1);
        messages.push(Message::system(system));
        messages.extend(self.transcript.messages().cloned());
        let tool_choice = tools.as_ref().map(|_| ToolChoice::auto());
        Request {
            model: self.model.name.clone(),
            messages,
            tools,
            tool_choice,
            temperature: self.config.temperature,
            max_tokens: self.model.max_output_tokens,
            provider: None,
        }
    }

    /// The assistant narration carried on the appended message and handed
    /// to `make_edits` as context. Synthesized when the model called tools
    /// without saying anything.
    fn narration_for(&self, response: &Response, tool_calls: &[ToolCall]) -> String {
        let text = response.text();
        if !text.is_empty() || tool_calls.is_empty() {
            return text.to_string();
        }
        let first = &tool_calls[0];
        let explanation = serde_json::from_str::<Value>(&first.arguments)
            .ok()
            .and_then(|args| {
                args.get("explanation")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
        prompts::synthesized_narration(&first.name, &first.arguments, explanation.as_deref())
    }

    fn latest_assistant_text(&self) -> String {
        self.transcript
            .messages()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(|message| message.text().to_string())
            .unwrap_or_default()
    }

    fn transition_to(&mut self, next: SessionState) -> Result<(), AgentError> {
        if !self.state.can_transition_to(&next) {
            return Err(ProtocolError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            }
            .into());
        }
        self.state = next;
        Ok(())
    }

    fn force_idle(&mut self) {
        if self.state != SessionState::Terminated {
            self.state = SessionState::Idle;
        }
    }

    fn abort_was_requested(&self) -> bool {
        self.abort_requested.load(Ordering::SeqCst)
    }

    fn emit(&self, event: SessionEvent) -> Result<(), AgentError> {
        self.emitter.emit(event)
    }
}
