//! Session event surface. This is the crate's observability layer: the
//! embedding harness renders or records events; tests assert on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AgentError;

pub type EventData = HashMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStart,
    UserInput,
    AssistantReply,
    ToolDispatched,
    ToolResolved,
    EditDelegated,
    EditCompleted,
    RetryScheduled,
    ContinuationIssued,
    RoundLimit,
    TaskFinished,
    TurnAborted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub session_id: String,
    pub data: EventData,
}

impl SessionEvent {
    pub fn new(kind: EventKind, session_id: impl Into<String>) -> Self {
        Self {
            kind,
            session_id: session_id.into(),
            data: EventData::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn retry_scheduled(session_id: impl Into<String>, attempt: u32, delay_ms: u64) -> Self {
        Self::new(EventKind::RetryScheduled, session_id)
            .with("attempt", attempt as u64)
            .with("delay_ms", delay_ms)
    }

    pub fn tool_dispatched(
        session_id: impl Into<String>,
        call_id: &str,
        tool_name: &str,
    ) -> Self {
        Self::new(EventKind::ToolDispatched, session_id)
            .with("call_id", call_id)
            .with("tool_name", tool_name)
    }

    pub fn tool_resolved(
        session_id: impl Into<String>,
        call_id: &str,
        is_error: bool,
    ) -> Self {
        Self::new(EventKind::ToolResolved, session_id)
            .with("call_id", call_id)
            .with("is_error", is_error)
    }

    pub fn edit_completed(session_id: impl Into<String>, success: bool, cost_delta: f64) -> Self {
        Self::new(EventKind::EditCompleted, session_id)
            .with("success", success)
            .with("cost_delta", cost_delta)
    }

    pub fn turn_aborted(session_id: impl Into<String>, reason: &str) -> Self {
        Self::new(EventKind::TurnAborted, session_id).with("reason", reason)
    }
}

pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: SessionEvent) -> Result<(), AgentError>;
}

#[derive(Default)]
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: SessionEvent) -> Result<(), AgentError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct BufferedEventEmitter {
    inner: Arc<Mutex<Vec<SessionEvent>>>,
}

impl BufferedEventEmitter {
    pub fn snapshot(&self) -> Vec<SessionEvent> {
        let guard = self.inner.lock().expect("buffered emitter mutex poisoned");
        guard.clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<SessionEvent> {
        self.snapshot()
            .into_iter()
            .filter(|event| event.kind == kind)
            .collect()
    }
}

impl EventEmitter for BufferedEventEmitter {
    fn emit(&self, event: SessionEvent) -> Result<(), AgentError> {
        let mut guard = self.inner.lock().expect("buffered emitter mutex poisoned");
        guard.push(event);
        Ok(())
    }
}
