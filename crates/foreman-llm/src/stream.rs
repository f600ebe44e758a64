use std::pin::Pin;

use futures::Stream;

use crate::errors::CompletionError;
use crate::types::{FinishReason, Usage};

/// One streamed fragment of a completion response.
///
/// Tool-call fragments are keyed by the index the service assigns to each
/// in-flight call, not by id: the id and name arrive on the first fragment
/// and later fragments carry only argument text.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    TextDelta {
        delta: String,
    },
    ToolCallDelta {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    Finish {
        reason: FinishReason,
        usage: Option<Usage>,
    },
}

pub type StreamEventStream =
    Pin<Box<dyn Stream<Item = Result<StreamEvent, CompletionError>> + Send>>;
