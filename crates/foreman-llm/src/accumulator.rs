//! Folds a stream of completion events into a finalized [`Response`].

use std::collections::BTreeMap;

use crate::errors::CompletionError;
use crate::stream::StreamEvent;
use crate::types::{FinishReason, Message, Response, ToolCall, Usage};

/// A tool call still being streamed, keyed by the index the service
/// assigned. The id and name arrive on the first fragment; argument text
/// accumulates across fragments.
#[derive(Clone, Debug, Default, PartialEq)]
struct PendingToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Local accumulator for one request/response cycle.
///
/// Lives on the loop's stack and is discarded (or rebuilt from a
/// continuation prefix) between attempts, so no partial state can leak
/// across turns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResponseAccumulator {
    text: String,
    calls: BTreeMap<u32, PendingToolCall>,
    finish: Option<FinishReason>,
    usage: Option<Usage>,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with partial content from an earlier output-limited attempt, so
    /// continuation streams append to what was already received.
    pub fn continuing_from(partial: &str) -> Self {
        Self {
            text: partial.to_string(),
            ..Self::default()
        }
    }

    pub fn absorb(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta { delta } => self.text.push_str(delta),
            StreamEvent::ToolCallDelta {
                index,
                id,
                name,
                arguments,
            } => {
                let call = self.calls.entry(*index).or_default();
                if call.id.is_none() {
                    call.id = id.clone();
                }
                if call.name.is_none() {
                    call.name = name.clone();
                }
                call.arguments.push_str(arguments);
            }
            StreamEvent::Finish { reason, usage } => {
                self.finish = Some(reason.clone());
                if usage.is_some() {
                    self.usage = *usage;
                }
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.finish.as_ref()
    }

    /// Finalize into a response. Fails if the service never identified a
    /// streamed call, which would make the one-call-one-response pairing
    /// impossible downstream.
    pub fn into_response(
        self,
        id: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Response, CompletionError> {
        let mut tool_calls = Vec::with_capacity(self.calls.len());
        for (index, call) in self.calls {
            let call_id = call.id.ok_or_else(|| {
                CompletionError::Decode(format!("streamed tool call #{index} carried no id"))
            })?;
            let name = call.name.ok_or_else(|| {
                CompletionError::Decode(format!("streamed tool call #{index} carried no name"))
            })?;
            tool_calls.push(ToolCall {
                id: call_id,
                name,
                arguments: call.arguments,
            });
        }

        let content = if self.text.is_empty() {
            None
        } else {
            Some(self.text)
        };
        let finish_reason = self.finish.unwrap_or(FinishReason::Other("unknown".to_string()));
        Ok(Response {
            id: id.into(),
            model: model.into(),
            message: Message::assistant_with_tool_calls(content, tool_calls),
            finish_reason,
            usage: self.usage.unwrap_or_default(),
        })
    }
}
