//! Tool dispatch: one parse -> execute -> resolve pass per requested call.

use std::sync::Arc;

use foreman_llm::{Message, ToolCall};

use super::{RoleBindings, Session};
use crate::editor::EditApplier;
use crate::errors::{AgentError, ProtocolError};
use crate::events::SessionEvent;
use crate::interpreter::CommandInterpreter;
use crate::prompts::ACTION_PAUSE_SUFFIX;
use crate::tools::{ManagerTool, ToolParseError};

/// Whether the loop keeps cycling after a dispatched batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ToolFlow {
    Continue,
    Finished,
}

impl Session {
    /// Dispatch a batch of tool calls in order. Malformed arguments become
    /// error tool results so the model can correct itself; `stop_edits`
    /// short-circuits the batch with no result message; unknown names are
    /// fatal.
    pub(super) async fn dispatch_batch(
        &mut self,
        calls: &[ToolCall],
        narration: &str,
    ) -> Result<ToolFlow, AgentError> {
        for call in calls {
            self.emit(SessionEvent::tool_dispatched(&self.id, &call.id, &call.name))?;
            let tool = match ManagerTool::parse(&call.name, &call.arguments) {
                Ok(tool) => tool,
                Err(ToolParseError::UnknownTool(name)) => {
                    return Err(ProtocolError::UnknownTool(name).into());
                }
                Err(ToolParseError::Arguments(error)) => {
                    self.record_tool_result(&call.id, error.to_string(), true)?;
                    continue;
                }
            };

            let (result_text, is_error) = match tool {
                ManagerTool::StopEdits => return Ok(ToolFlow::Finished),
                ManagerTool::AddFile { filepath, .. } => self.add_file(&filepath).await?,
                ManagerTool::RemoveFile { filepath, .. } => self.remove_file(&filepath).await?,
                ManagerTool::CheckFiles { .. } => self.check_files().await?,
                ManagerTool::MakeEdits { explanation, .. } => {
                    self.make_edits(&explanation, narration).await?
                }
            };
            let content = if is_error {
                result_text
            } else {
                format!("{result_text}{ACTION_PAUSE_SUFFIX}")
            };
            self.record_tool_result(&call.id, content, is_error)?;
        }
        Ok(ToolFlow::Continue)
    }

    fn record_tool_result(
        &mut self,
        call_id: &str,
        content: String,
        is_error: bool,
    ) -> Result<(), AgentError> {
        let index = self.transcript.append(Message::tool_response(call_id, content));
        self.transcript.resolve(call_id, index)?;
        self.emit(SessionEvent::tool_resolved(&self.id, call_id, is_error))?;
        Ok(())
    }

    async fn add_file(&mut self, filepath: &str) -> Result<(String, bool), AgentError> {
        match self.interpreter()?.run(&format!("/add {filepath}")).await {
            Ok(_) => Ok((format!("I have added the file {filepath} to the chat."), false)),
            Err(AgentError::Interpreter(message)) => {
                Ok((format!("I could not add the file {filepath}: {message}"), true))
            }
            Err(error) => Err(error),
        }
    }

    async fn remove_file(&mut self, filepath: &str) -> Result<(String, bool), AgentError> {
        match self.interpreter()?.run(&format!("/drop {filepath}")).await {
            Ok(_) => Ok((
                format!("I have removed the file {filepath} from the chat."),
                false,
            )),
            Err(AgentError::Interpreter(message)) => Ok((
                format!("I could not remove the file {filepath}: {message}"),
                true,
            )),
            Err(error) => Err(error),
        }
    }

    async fn check_files(&mut self) -> Result<(String, bool), AgentError> {
        match self.interpreter()?.run("/ls").await {
            Ok(listing) => Ok((
                format!("I am checking the files already in the chat.\n{listing}"),
                false,
            )),
            Err(AgentError::Interpreter(message)) => {
                Ok((format!("I could not list the chat files: {message}"), true))
            }
            Err(error) => Err(error),
        }
    }

    async fn make_edits(
        &mut self,
        explanation: &str,
        narration: &str,
    ) -> Result<(String, bool), AgentError> {
        let result = self.spawn_editor(explanation, narration).await?;
        Ok((result.message.clone(), !result.success))
    }

    fn interpreter(&self) -> Result<Arc<dyn CommandInterpreter>, AgentError> {
        match &self.role {
            RoleBindings::Manager { interpreter, .. } => Ok(interpreter.clone()),
            RoleBindings::Editor => Err(AgentError::Interpreter(
                "editor sessions have no command interpreter".to_string(),
            )),
        }
    }

    pub(super) fn applier(&self) -> Result<Arc<dyn EditApplier>, AgentError> {
        match &self.role {
            RoleBindings::Manager { applier, .. } => Ok(applier.clone()),
            RoleBindings::Editor => Err(AgentError::Interpreter(
                "editor sessions cannot delegate further edits".to_string(),
            )),
        }
    }
}
