use std::collections::BTreeSet;

use thiserror::Error;

/// Internal-consistency violations. Fatal by policy: these indicate a bug
/// in the orchestration itself and are never converted into tool-result
/// content or retried.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("tool call '{0}' was never requested by an assistant message")]
    UnknownCall(String),
    #[error("tool call '{0}' already has a response recorded")]
    AlreadyResolved(String),
    #[error("message {index} is not a tool response addressed to call '{call_id}'")]
    ResponseMismatch { call_id: String, index: usize },
    #[error("request blocked: unresolved tool calls remain: {0:?}")]
    UnresolvedCalls(BTreeSet<String>),
    #[error("unknown tool requested by the service: {0}")]
    UnknownTool(String),
    #[error("invalid session state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Top-level error for the agent crate.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Completion(#[from] foreman_llm::CompletionError),
    #[error("turn exhausted: {0}")]
    Exhausted(String),
    #[error("turn cancelled")]
    Cancelled,
    #[error("command interpreter failure: {0}")]
    Interpreter(String),
    #[error("session already terminated by stop_edits")]
    SessionTerminated,
}
