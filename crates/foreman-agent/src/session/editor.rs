//! The delegation spawner: builds and runs an isolated editor session for
//! one `make_edits` call, then folds its cost and commits into the parent.

use super::{Session, TurnOutcome};
use crate::editor::EditResult;
use crate::errors::AgentError;
use crate::events::{EventKind, SessionEvent};
use crate::prompts;

const EDIT_CONFIRMATION: &str = "I have asked the editor engineer to make changes to the code.";

impl Session {
    /// Run one delegated edit to completion, blocking the manager loop.
    ///
    /// The editor session shares the model configuration but owns a fresh
    /// transcript seeded with a single synthesized instruction. On return
    /// the parent has absorbed the editor's cost and any commits; the
    /// editor session is dropped. Failures inside the editor come back as
    /// a failed `EditResult`, not an error, so the manager can surface
    /// them to the model.
    pub async fn spawn_editor(
        &mut self,
        explanation: &str,
        narration: &str,
    ) -> Result<EditResult, AgentError> {
        let applier = self.applier()?;
        let mut child_config = self.config.clone();
        child_config.repo_map_tokens = 0;
        child_config.cache_prompts = false;
        child_config.suggest_shell_commands = false;
        child_config.temperature = None;

        self.emit(
            SessionEvent::new(EventKind::EditDelegated, &self.id)
                .with("explanation", explanation),
        )?;
        let mut child = Session::editor(
            self.model.clone(),
            self.client.clone(),
            child_config,
            self.emitter.clone(),
            self.abort_requested.clone(),
            self.abort_notify.clone(),
        )?;

        let instruction = format!("{narration}\n{}", prompts::edit_focus_prompt(explanation));
        let run = child.submit(instruction).await;
        let cost_delta = child.cost();

        let result = match run {
            Ok(TurnOutcome::Reply(reply)) => match applier.apply(&reply).await {
                Ok(outcome) => EditResult {
                    success: true,
                    cost_delta,
                    commit_hashes: outcome.commit_hashes,
                    message: EDIT_CONFIRMATION.to_string(),
                },
                Err(error) => EditResult {
                    success: false,
                    cost_delta,
                    commit_hashes: Vec::new(),
                    message: format!("The editor engineer could not apply the changes: {error}"),
                },
            },
            Ok(TurnOutcome::Finished) => EditResult {
                success: false,
                cost_delta,
                commit_hashes: Vec::new(),
                message: "The editor engineer ended the conversation without making changes."
                    .to_string(),
            },
            Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
            Err(AgentError::Protocol(error)) => return Err(error.into()),
            Err(error) => EditResult {
                success: false,
                cost_delta,
                commit_hashes: Vec::new(),
                message: format!("The editor engineer failed: {error}"),
            },
        };

        self.cost += result.cost_delta;
        self.commit_hashes.extend(result.commit_hashes.iter().cloned());
        self.emit(SessionEvent::edit_completed(
            &self.id,
            result.success,
            result.cost_delta,
        ))?;
        Ok(result)
    }
}
