//! Conversation log plus the tool-call registry that pairs every requested
//! tool call with exactly one tool-role response message.

use std::collections::{BTreeMap, BTreeSet};

use foreman_llm::{Message, Role};
use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

/// Ordered, append-only message log split into the settled prefix and the
/// current unsettled suffix, with registry state tracking which tool calls
/// have been answered.
///
/// Indices are global across both segments and remain stable under
/// `settle`; only `rollback_to` invalidates indices at or past the cut.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    settled: Vec<Message>,
    current: Vec<Message>,
    pending: BTreeMap<String, usize>,
    resolved: BTreeMap<String, usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its index. An assistant message carrying
    /// tool calls registers each call id as pending.
    pub fn append(&mut self, message: Message) -> usize {
        let index = self.len();
        if message.role == Role::Assistant {
            for call in &message.tool_calls {
                self.pending.insert(call.id.clone(), index);
            }
        }
        self.current.push(message);
        index
    }

    /// Record the tool-role response for a pending call.
    pub fn resolve(&mut self, call_id: &str, message_index: usize) -> Result<(), ProtocolError> {
        if self.resolved.contains_key(call_id) {
            return Err(ProtocolError::AlreadyResolved(call_id.to_string()));
        }
        if !self.pending.contains_key(call_id) {
            return Err(ProtocolError::UnknownCall(call_id.to_string()));
        }
        let message = self
            .message(message_index)
            .ok_or_else(|| ProtocolError::ResponseMismatch {
                call_id: call_id.to_string(),
                index: message_index,
            })?;
        if message.role != Role::Tool || message.tool_call_id.as_deref() != Some(call_id) {
            return Err(ProtocolError::ResponseMismatch {
                call_id: call_id.to_string(),
                index: message_index,
            });
        }
        self.pending.remove(call_id);
        self.resolved.insert(call_id.to_string(), message_index);
        Ok(())
    }

    pub fn unresolved_call_ids(&self) -> BTreeSet<String> {
        self.pending.keys().cloned().collect()
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    pub fn len(&self) -> usize {
        self.settled.len() + self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settled.is_empty() && self.current.is_empty()
    }

    pub fn message(&self, index: usize) -> Option<&Message> {
        if index < self.settled.len() {
            self.settled.get(index)
        } else {
            self.current.get(index - self.settled.len())
        }
    }

    pub fn messages(&self) -> impl DoubleEndedIterator<Item = &Message> {
        self.settled.iter().chain(self.current.iter())
    }

    pub fn settled_messages(&self) -> &[Message] {
        &self.settled
    }

    pub fn current_messages(&self) -> &[Message] {
        &self.current
    }

    /// Move the current suffix into the settled prefix. Called by the
    /// harness between user turns; indices are unaffected.
    pub fn settle(&mut self) {
        self.settled.append(&mut self.current);
    }

    /// Truncate the current suffix so the transcript ends before `index`.
    /// Registry entries for removed messages are dropped.
    pub fn rollback_to(&mut self, index: usize) {
        let keep = index.saturating_sub(self.settled.len());
        self.current.truncate(keep);
        self.pending.retain(|_, at| *at < index);
        self.resolved.retain(|_, at| *at < index);
    }

    /// Discard the in-flight assistant message owning any unresolved calls,
    /// along with everything after it. Used by cancellation to restore the
    /// one-call-one-response invariant before returning control.
    ///
    /// Returns the number of messages removed.
    pub fn rollback_unresolved(&mut self) -> usize {
        let Some(cut) = self.pending.values().min().copied() else {
            return 0;
        };
        let before = self.len();
        self.rollback_to(cut);
        before - self.len()
    }
}
