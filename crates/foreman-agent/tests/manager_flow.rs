//! End-to-end manager flow through the public API only.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use foreman_agent::{
    EditApplier, EditApplyError, EditApplyOutcome, InMemoryInterpreter, ModelConfig, Session,
    SessionConfig, SessionState, TurnOutcome,
};
use foreman_llm::{
    Client, CompletionError, FinishReason, ProviderAdapter, Request, StreamEvent,
    StreamEventStream, Usage,
};

struct ReplayAdapter {
    turns: Mutex<VecDeque<Vec<StreamEvent>>>,
}

#[async_trait]
impl ProviderAdapter for ReplayAdapter {
    fn name(&self) -> &str {
        "replay"
    }

    async fn stream(&self, _request: Request) -> Result<StreamEventStream, CompletionError> {
        let events = self
            .turns
            .lock()
            .expect("turns mutex")
            .pop_front()
            .ok_or_else(|| CompletionError::Configuration("script exhausted".to_string()))?;
        let items: Vec<Result<StreamEvent, CompletionError>> =
            events.into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

struct NoopApplier;

#[async_trait]
impl EditApplier for NoopApplier {
    async fn apply(&self, _reply: &str) -> Result<EditApplyOutcome, EditApplyError> {
        Ok(EditApplyOutcome::default())
    }
}

fn finish(reason: FinishReason) -> StreamEvent {
    StreamEvent::Finish {
        reason,
        usage: Some(Usage {
            prompt_tokens: 50,
            completion_tokens: 5,
            total_tokens: 55,
        }),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn add_file_then_stop_edits_across_two_turns() {
    let adapter = Arc::new(ReplayAdapter {
        turns: Mutex::new(VecDeque::from(vec![
            vec![
                StreamEvent::TextDelta {
                    delta: "I need util.py in context.".to_string(),
                },
                StreamEvent::ToolCallDelta {
                    index: 0,
                    id: Some("call-1".to_string()),
                    name: Some("add_file".to_string()),
                    arguments: r#"{"explanation":"referenced by the bug","filepath":"util.py"}"#
                        .to_string(),
                },
                finish(FinishReason::ToolCalls),
            ],
            vec![
                StreamEvent::TextDelta {
                    delta: "The context is ready.".to_string(),
                },
                finish(FinishReason::Stop),
            ],
            vec![
                StreamEvent::ToolCallDelta {
                    index: 0,
                    id: Some("call-2".to_string()),
                    name: Some("stop_edits".to_string()),
                    arguments: String::new(),
                },
                finish(FinishReason::ToolCalls),
            ],
        ])),
    });

    let interpreter = Arc::new(InMemoryInterpreter::new());
    let mut session = Session::manager(
        Arc::new(ModelConfig::default()),
        Arc::new(Client::with_provider(adapter)),
        SessionConfig::default(),
        interpreter.clone(),
        Arc::new(NoopApplier),
    )
    .expect("session");

    let outcome = session.submit("fix the bug in util.py").await.expect("turn one");
    assert_eq!(outcome, TurnOutcome::Reply("The context is ready.".to_string()));
    assert!(interpreter.files().contains("util.py"));
    assert!(session.transcript().unresolved_call_ids().is_empty());

    session.settle_turn();
    let outcome = session.submit("anything left?").await.expect("turn two");
    assert_eq!(outcome, TurnOutcome::Finished);
    assert_eq!(session.state(), SessionState::Terminated);
}
