//! Manager/editor agent orchestration loop.
//!
//! A manager [`Session`] drives a multi-turn, streaming tool-calling
//! conversation: tool calls mutate the shared working set through a
//! [`CommandInterpreter`], `make_edits` delegates to an isolated editor
//! session whose cost and commits fold back into the manager, and
//! `stop_edits` ends the task with [`TurnOutcome::Finished`]. The
//! transcript pairs every tool call with exactly one response message and
//! treats violations as fatal protocol errors.

pub mod config;
pub mod editor;
pub mod errors;
pub mod events;
pub mod interpreter;
pub mod prompts;
pub mod session;
pub mod tools;
pub mod transcript;

pub use config::{ModelConfig, SessionConfig};
pub use editor::{EditApplier, EditApplyError, EditApplyOutcome, EditResult};
pub use errors::{AgentError, ProtocolError};
pub use events::{
    BufferedEventEmitter, EventData, EventEmitter, EventKind, NoopEventEmitter, SessionEvent,
};
pub use interpreter::{CommandInterpreter, InMemoryInterpreter};
pub use session::{AbortHandle, Session, SessionState, TurnOutcome};
pub use tools::{ArgumentError, ManagerTool, ToolParseError, tool_definitions};
pub use transcript::Transcript;
