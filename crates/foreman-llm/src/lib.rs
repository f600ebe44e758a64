//! Completion-service client for the Foreman agent loop.
//!
//! Wire types, a provider-indexed client, an OpenAI-compatible streaming
//! adapter, and the stream accumulator the orchestration loop folds
//! responses through. Failures come back pre-classified so the loop can
//! decide between retry, continuation, and turn abort.

pub mod accumulator;
pub mod client;
pub mod errors;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod sse;
pub mod stream;
pub mod types;

pub use accumulator::ResponseAccumulator;
pub use client::Client;
pub use errors::CompletionError;
pub use openai::{OpenAiAdapter, OpenAiFactory};
pub use provider::{ProviderAdapter, ProviderFactory, register_provider_factory};
pub use retry::RetryPolicy;
pub use stream::{StreamEvent, StreamEventStream};
pub use types::{
    FinishReason, Message, Request, Response, Role, ToolCall, ToolChoice, ToolDefinition, Usage,
};
