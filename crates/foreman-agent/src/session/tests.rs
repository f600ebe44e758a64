use super::*;
use crate::editor::{EditApplyError, EditApplyOutcome};
use crate::events::BufferedEventEmitter;
use crate::interpreter::InMemoryInterpreter;
use crate::prompts::ACTION_PAUSE_SUFFIX;

use async_trait::async_trait;
use foreman_llm::{ProviderAdapter, StreamEvent, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;

enum ScriptedTurn {
    Events(Vec<StreamEvent>),
    EventsThenError(Vec<StreamEvent>, CompletionError),
    Fail(CompletionError),
}

struct ScriptedAdapter {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedAdapter {
    fn new(turns: Vec<ScriptedTurn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(VecDeque::from(turns)),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("requests mutex").clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: Request) -> Result<StreamEventStream, CompletionError> {
        self.requests.lock().expect("requests mutex").push(request);
        match self.turns.lock().expect("turns mutex").pop_front() {
            Some(ScriptedTurn::Events(events)) => {
                let items: Vec<Result<StreamEvent, CompletionError>> =
                    events.into_iter().map(Ok).collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Some(ScriptedTurn::EventsThenError(events, error)) => {
                let mut items: Vec<Result<StreamEvent, CompletionError>> =
                    events.into_iter().map(Ok).collect();
                items.push(Err(error));
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Some(ScriptedTurn::Fail(error)) => Err(error),
            None => Err(CompletionError::Configuration(
                "adapter script exhausted".to_string(),
            )),
        }
    }
}

struct ScriptedApplier {
    commits: Vec<String>,
    fail: bool,
    replies: Mutex<Vec<String>>,
}

impl ScriptedApplier {
    fn succeeding(commits: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            commits: commits.into_iter().map(str::to_string).collect(),
            fail: false,
            replies: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            commits: Vec::new(),
            fail: true,
            replies: Mutex::new(Vec::new()),
        })
    }

    fn replies(&self) -> Vec<String> {
        self.replies.lock().expect("replies mutex").clone()
    }
}

#[async_trait]
impl EditApplier for ScriptedApplier {
    async fn apply(&self, reply: &str) -> Result<EditApplyOutcome, EditApplyError> {
        self.replies
            .lock()
            .expect("replies mutex")
            .push(reply.to_string());
        if self.fail {
            return Err(EditApplyError("no edit blocks found in reply".to_string()));
        }
        Ok(EditApplyOutcome {
            commit_hashes: self.commits.clone(),
        })
    }
}

fn test_usage() -> Usage {
    Usage {
        prompt_tokens: 100,
        completion_tokens: 10,
        total_tokens: 110,
    }
}

// With the test model prices, one response costs this much.
const RESPONSE_COST: f64 = 0.0013;

fn finish(reason: FinishReason) -> StreamEvent {
    StreamEvent::Finish {
        reason,
        usage: Some(test_usage()),
    }
}

fn text_reply(text: &str) -> ScriptedTurn {
    ScriptedTurn::Events(vec![
        StreamEvent::TextDelta {
            delta: text.to_string(),
        },
        finish(FinishReason::Stop),
    ])
}

fn tool_calls_turn(narration: Option<&str>, calls: Vec<(&str, &str, &str)>) -> ScriptedTurn {
    let mut events = Vec::new();
    if let Some(text) = narration {
        events.push(StreamEvent::TextDelta {
            delta: text.to_string(),
        });
    }
    for (index, (id, name, arguments)) in calls.into_iter().enumerate() {
        events.push(StreamEvent::ToolCallDelta {
            index: index as u32,
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            arguments: String::new(),
        });
        events.push(StreamEvent::ToolCallDelta {
            index: index as u32,
            id: None,
            name: None,
            arguments: arguments.to_string(),
        });
    }
    events.push(finish(FinishReason::ToolCalls));
    ScriptedTurn::Events(events)
}

fn transient() -> CompletionError {
    CompletionError::transient(Some(429), "rate limited")
}

struct Harness {
    adapter: Arc<ScriptedAdapter>,
    interpreter: Arc<InMemoryInterpreter>,
    applier: Arc<ScriptedApplier>,
    emitter: BufferedEventEmitter,
    session: Session,
}

fn test_model() -> ModelConfig {
    ModelConfig {
        name: "test-model".to_string(),
        context_window_tokens: 128_000,
        max_output_tokens: Some(4_096),
        supports_assistant_prefill: false,
        input_cost_per_mtok: 10.0,
        output_cost_per_mtok: 30.0,
    }
}

fn fast_retry_config() -> SessionConfig {
    SessionConfig {
        retry: foreman_llm::RetryPolicy {
            initial_delay_ms: 1,
            backoff_factor: 2.0,
            ceiling_ms: 1_000,
        },
        ..SessionConfig::default()
    }
}

fn manager(turns: Vec<ScriptedTurn>) -> Harness {
    manager_with(turns, fast_retry_config(), test_model(), false)
}

fn manager_with(
    turns: Vec<ScriptedTurn>,
    config: SessionConfig,
    model: ModelConfig,
    failing_applier: bool,
) -> Harness {
    let adapter = ScriptedAdapter::new(turns);
    let client = Arc::new(Client::with_provider(adapter.clone()));
    let interpreter = Arc::new(InMemoryInterpreter::new());
    let applier = if failing_applier {
        ScriptedApplier::failing()
    } else {
        ScriptedApplier::succeeding(vec!["abc123"])
    };
    let emitter = BufferedEventEmitter::default();
    let session = Session::manager_with_emitter(
        Arc::new(model),
        client,
        config,
        interpreter.clone(),
        applier.clone(),
        Arc::new(emitter.clone()),
    )
    .expect("session");
    Harness {
        adapter,
        interpreter,
        applier,
        emitter,
        session,
    }
}

fn add_file_args(filepath: &str) -> String {
    format!(r#"{{"explanation":"need context","filepath":"{filepath}"}}"#)
}

#[tokio::test(flavor = "current_thread")]
async fn plain_reply_is_a_normal_idle_point() {
    let mut harness = manager(vec![text_reply("Nothing to change.")]);
    let outcome = harness.session.submit("review this").await.expect("turn");
    assert_eq!(outcome, TurnOutcome::Reply("Nothing to change.".to_string()));
    assert_eq!(harness.session.state(), SessionState::Idle);
    assert_eq!(harness.adapter.requests().len(), 1);

    let messages: Vec<&Message> = harness.session.transcript().messages().collect();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
}

#[tokio::test(flavor = "current_thread")]
async fn add_file_dispatch_confirms_and_resolves() {
    let mut harness = manager(vec![
        tool_calls_turn(
            Some("I need to see the file."),
            vec![("call-1", "add_file", &add_file_args("a.py"))],
        ),
        text_reply("File added, proceeding."),
    ]);
    let outcome = harness.session.submit("fix the bug").await.expect("turn");
    assert_eq!(
        outcome,
        TurnOutcome::Reply("File added, proceeding.".to_string())
    );

    // The tool result confirms the path and carries the pause advisory.
    let transcript = harness.session.transcript();
    let tool_message = transcript
        .messages()
        .find(|message| message.role == Role::Tool)
        .expect("tool message");
    assert!(tool_message.text().contains("a.py"));
    assert!(tool_message.text().ends_with(ACTION_PAUSE_SUFFIX));
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("call-1"));
    assert_eq!(transcript.resolved_count(), 1);
    assert!(transcript.unresolved_call_ids().is_empty());
    assert!(harness.interpreter.files().contains("a.py"));

    // The follow-up request replays the paired call and response.
    let requests = harness.adapter.requests();
    assert_eq!(requests.len(), 2);
    let replay = &requests[1].messages;
    let assistant = replay
        .iter()
        .find(|message| !message.tool_calls.is_empty())
        .expect("assistant with tool calls");
    assert_eq!(assistant.tool_calls[0].id, "call-1");
    assert_eq!(replay.last().expect("last").role, Role::Tool);
}

#[tokio::test(flavor = "current_thread")]
async fn batch_of_calls_yields_one_response_each_before_next_request() {
    let mut harness = manager(vec![
        tool_calls_turn(
            Some("Adjusting context."),
            vec![
                ("call-1", "add_file", &add_file_args("a.py")),
                (
                    "call-2",
                    "remove_file",
                    r#"{"explanation":"stale","filepath":"b.py"}"#,
                ),
            ],
        ),
        text_reply("Context updated."),
    ]);
    harness.session.submit("adjust files").await.expect("turn");

    let requests = harness.adapter.requests();
    let replay = &requests[1].messages;
    let tool_responses: Vec<&Message> = replay
        .iter()
        .filter(|message| message.role == Role::Tool)
        .collect();
    assert_eq!(tool_responses.len(), 2);
    let ids: Vec<&str> = tool_responses
        .iter()
        .map(|message| message.tool_call_id.as_deref().expect("call id"))
        .collect();
    assert_eq!(ids, vec!["call-1", "call-2"]);
    assert!(harness.session.transcript().unresolved_call_ids().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn check_files_returns_the_populated_listing() {
    let mut harness = manager(vec![
        tool_calls_turn(
            Some("Checking context."),
            vec![("call-1", "check_files", "{}")],
        ),
        text_reply("ok"),
    ]);
    harness
        .interpreter
        .run("/add src/app.py")
        .await
        .expect("seed working set");
    harness.session.submit("what files are loaded?").await.expect("turn");

    let tool_message_text = harness
        .session
        .transcript()
        .messages()
        .find(|message| message.role == Role::Tool)
        .expect("tool message")
        .text()
        .to_string();
    assert!(tool_message_text.contains("src/app.py"));
}

#[tokio::test(flavor = "current_thread")]
async fn stop_edits_finishes_without_a_tool_result() {
    let mut harness = manager(vec![tool_calls_turn(
        Some("All changes are in."),
        vec![("call-9", "stop_edits", "")],
    )]);
    let outcome = harness.session.submit("wrap up").await.expect("turn");
    assert_eq!(outcome, TurnOutcome::Finished);
    assert_eq!(harness.session.state(), SessionState::Terminated);
    assert_eq!(harness.adapter.requests().len(), 1);

    // No tool-role message is ever routed back to the model.
    assert!(
        harness
            .session
            .transcript()
            .messages()
            .all(|message| message.role != Role::Tool)
    );

    let error = harness
        .session
        .submit("one more thing")
        .await
        .expect_err("terminated session");
    assert!(matches!(error, AgentError::SessionTerminated));
    assert_eq!(harness.adapter.requests().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn calls_batched_after_stop_edits_are_not_dispatched() {
    let mut harness = manager(vec![tool_calls_turn(
        None,
        vec![
            ("call-1", "stop_edits", ""),
            ("call-2", "add_file", &add_file_args("a.py")),
        ],
    )]);
    let outcome = harness.session.submit("finish").await.expect("turn");
    assert_eq!(outcome, TurnOutcome::Finished);
    assert!(harness.interpreter.files().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn make_edits_then_stop_edits_folds_cost_and_commits() {
    let mut harness = manager(vec![
        tool_calls_turn(
            Some("Apply the rename to a.py."),
            vec![(
                "call-1",
                "make_edits",
                r#"{"explanation":"rename the helper","filepath":"a.py"}"#,
            )],
        ),
        text_reply("Here is the exact change to make."),
        text_reply("The edit is done."),
        tool_calls_turn(Some("Wrapping up."), vec![("call-2", "stop_edits", "")]),
    ]);

    let outcome = harness.session.submit("rename the helper").await.expect("turn");
    assert_eq!(outcome, TurnOutcome::Reply("The edit is done.".to_string()));

    // The editor ran in its own conversation: no tools advertised, a single
    // synthesized instruction carrying narration and the change request.
    let requests = harness.adapter.requests();
    assert_eq!(requests.len(), 3);
    let editor_request = &requests[1];
    assert!(editor_request.tools.is_none());
    assert_eq!(editor_request.messages.len(), 2);
    assert_eq!(editor_request.messages[0].text(), prompts::EDITOR_SYSTEM);
    let instruction = editor_request.messages[1].text();
    assert!(instruction.contains("Apply the rename to a.py."));
    assert!(instruction.contains("rename the helper"));

    // The applier saw the editor's reply; commits and cost folded up.
    assert_eq!(
        harness.applier.replies(),
        vec!["Here is the exact change to make.".to_string()]
    );
    assert!(harness.session.commit_hashes().contains("abc123"));
    let expected = 3.0 * RESPONSE_COST;
    assert!((harness.session.cost() - expected).abs() < 1e-12);

    // Nothing from the editor's conversation leaked into the parent log.
    assert!(
        harness
            .session
            .transcript()
            .messages()
            .all(|message| message.text() != "Here is the exact change to make.")
    );

    // Second turn: the terminal signal, with no further service calls after.
    harness.session.settle_turn();
    let outcome = harness.session.submit("anything else?").await.expect("turn");
    assert_eq!(outcome, TurnOutcome::Finished);
    assert_eq!(harness.adapter.requests().len(), 4);
}

#[tokio::test(flavor = "current_thread")]
async fn failed_edit_application_surfaces_as_error_tool_result() {
    let mut harness = manager_with(
        vec![
            tool_calls_turn(
                Some("Change it."),
                vec![(
                    "call-1",
                    "make_edits",
                    r#"{"explanation":"change it","filepath":"a.py"}"#,
                )],
            ),
            text_reply("Let me reconsider."),
            text_reply("I will try a different instruction."),
        ],
        fast_retry_config(),
        test_model(),
        true,
    );
    let outcome = harness.session.submit("change it").await.expect("turn");
    assert_eq!(
        outcome,
        TurnOutcome::Reply("I will try a different instruction.".to_string())
    );

    let tool_message_text = harness
        .session
        .transcript()
        .messages()
        .find(|message| message.role == Role::Tool)
        .expect("tool message")
        .text()
        .to_string();
    assert!(tool_message_text.contains("could not apply"));
    assert!(harness.session.commit_hashes().is_empty());
    assert!(harness.session.transcript().unresolved_call_ids().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn transient_failures_retry_with_doubling_backoff() {
    let mut harness = manager(vec![
        ScriptedTurn::Fail(transient()),
        ScriptedTurn::Fail(transient()),
        ScriptedTurn::Fail(transient()),
        text_reply("recovered"),
    ]);
    let outcome = harness.session.submit("go").await.expect("turn");
    assert_eq!(outcome, TurnOutcome::Reply("recovered".to_string()));
    assert_eq!(harness.adapter.requests().len(), 4);

    let delays: Vec<u64> = harness
        .emitter
        .of_kind(EventKind::RetryScheduled)
        .iter()
        .map(|event| event.data["delay_ms"].as_u64().expect("delay"))
        .collect();
    assert_eq!(delays, vec![1, 2, 4]);
    for pair in delays.windows(2) {
        assert!(pair[1] >= 2 * pair[0]);
    }
}

#[tokio::test(flavor = "current_thread")]
async fn exceeding_the_retry_ceiling_escalates() {
    let mut config = fast_retry_config();
    config.retry.ceiling_ms = 2;
    let mut harness = manager_with(
        vec![
            ScriptedTurn::Fail(transient()),
            ScriptedTurn::Fail(transient()),
            ScriptedTurn::Fail(transient()),
        ],
        config,
        test_model(),
        false,
    );
    let error = harness.session.submit("go").await.expect_err("exhausted retries");
    assert!(matches!(
        error,
        AgentError::Completion(CompletionError::Transient { .. })
    ));
    // Delays 1 and 2 fit under the ceiling; the third attempt does not.
    assert_eq!(harness.emitter.of_kind(EventKind::RetryScheduled).len(), 2);
    assert_eq!(harness.adapter.requests().len(), 3);
    assert_eq!(harness.session.state(), SessionState::Idle);
}

#[tokio::test(flavor = "current_thread")]
async fn mid_stream_transient_failure_discards_partial_output() {
    let mut harness = manager(vec![
        ScriptedTurn::EventsThenError(
            vec![StreamEvent::TextDelta {
                delta: "par".to_string(),
            }],
            transient(),
        ),
        text_reply("clean"),
    ]);
    let outcome = harness.session.submit("go").await.expect("turn");
    assert_eq!(outcome, TurnOutcome::Reply("clean".to_string()));
    assert_eq!(harness.emitter.of_kind(EventKind::RetryScheduled).len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn context_overflow_aborts_without_touching_the_transcript() {
    let mut harness = manager(vec![ScriptedTurn::Fail(CompletionError::ContextOverflow(
        "maximum context length exceeded".to_string(),
    ))]);
    let error = harness.session.submit("go").await.expect_err("overflow");
    assert!(matches!(
        error,
        AgentError::Completion(CompletionError::ContextOverflow(_))
    ));
    // Only the user message went in; no partial assistant message.
    assert_eq!(harness.session.transcript().len(), 1);
    assert_eq!(harness.adapter.requests().len(), 1);
    assert_eq!(harness.session.state(), SessionState::Idle);
    assert_eq!(harness.emitter.of_kind(EventKind::TurnAborted).len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn malformed_requests_are_not_retried() {
    let mut harness = manager(vec![ScriptedTurn::Fail(CompletionError::MalformedRequest(
        "invalid tool schema".to_string(),
    ))]);
    let error = harness.session.submit("go").await.expect_err("malformed");
    assert!(matches!(
        error,
        AgentError::Completion(CompletionError::MalformedRequest(_))
    ));
    assert!(harness.emitter.of_kind(EventKind::RetryScheduled).is_empty());
    assert_eq!(harness.adapter.requests().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn output_cutoff_continues_via_assistant_prefix() {
    let mut model = test_model();
    model.supports_assistant_prefill = true;
    let mut harness = manager_with(
        vec![
            ScriptedTurn::Events(vec![
                StreamEvent::TextDelta {
                    delta: "Hello ".to_string(),
                },
                finish(FinishReason::Length),
            ]),
            text_reply("world."),
        ],
        fast_retry_config(),
        model,
        false,
    );
    let outcome = harness.session.submit("greet").await.expect("turn");
    assert_eq!(outcome, TurnOutcome::Reply("Hello world.".to_string()));

    let requests = harness.adapter.requests();
    assert_eq!(requests.len(), 2);
    let prefix = requests[1].messages.last().expect("prefix message");
    assert_eq!(prefix.role, Role::Assistant);
    assert_eq!(prefix.text(), "Hello ");
    assert_eq!(
        harness.emitter.of_kind(EventKind::ContinuationIssued).len(),
        1
    );
}

#[tokio::test(flavor = "current_thread")]
async fn output_cutoff_without_prefill_support_exhausts_the_turn() {
    let mut harness = manager(vec![ScriptedTurn::Events(vec![
        StreamEvent::TextDelta {
            delta: "Hello ".to_string(),
        },
        finish(FinishReason::Length),
    ])]);
    let error = harness.session.submit("greet").await.expect_err("exhausted");
    assert!(matches!(error, AgentError::Exhausted(_)));
    assert_eq!(harness.session.transcript().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn malformed_tool_arguments_become_an_error_result() {
    let mut harness = manager(vec![
        tool_calls_turn(
            Some("Adding a file."),
            vec![("call-1", "add_file", "{\"explanation\": ")],
        ),
        text_reply("Let me fix those arguments."),
    ]);
    let outcome = harness.session.submit("go").await.expect("turn");
    assert_eq!(
        outcome,
        TurnOutcome::Reply("Let me fix those arguments.".to_string())
    );

    let tool_message_text = harness
        .session
        .transcript()
        .messages()
        .find(|message| message.role == Role::Tool)
        .expect("tool message")
        .text()
        .to_string();
    assert!(tool_message_text.contains("invalid arguments"));
    // The malformed call is still resolved so the next request is legal.
    assert!(harness.session.transcript().unresolved_call_ids().is_empty());
    assert!(harness.interpreter.files().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_tool_names_are_fatal_protocol_errors() {
    let mut harness = manager(vec![tool_calls_turn(
        None,
        vec![("call-1", "launch_rocket", "{}")],
    )]);
    let error = harness.session.submit("go").await.expect_err("unknown tool");
    assert!(matches!(
        error,
        AgentError::Protocol(ProtocolError::UnknownTool(name)) if name == "launch_rocket"
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn round_limit_stops_the_automatic_cycle() {
    let mut config = fast_retry_config();
    config.max_tool_rounds_per_input = 1;
    let mut harness = manager_with(
        vec![tool_calls_turn(
            Some("Adding the file."),
            vec![("call-1", "add_file", &add_file_args("a.py"))],
        )],
        config,
        test_model(),
        false,
    );
    let outcome = harness.session.submit("go").await.expect("turn");
    assert_eq!(outcome, TurnOutcome::Reply("Adding the file.".to_string()));
    assert_eq!(harness.adapter.requests().len(), 1);
    assert_eq!(harness.emitter.of_kind(EventKind::RoundLimit).len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn missing_narration_is_synthesized_from_the_first_call() {
    let mut harness = manager(vec![
        tool_calls_turn(None, vec![("call-1", "add_file", &add_file_args("a.py"))]),
        text_reply("done"),
    ]);
    harness.session.submit("go").await.expect("turn");

    let assistant_text = harness
        .session
        .transcript()
        .messages()
        .find(|message| !message.tool_calls.is_empty())
        .expect("assistant message")
        .text()
        .to_string();
    assert!(assistant_text.contains("`add_file`"));
    assert!(assistant_text.contains("need context"));
}

#[tokio::test(flavor = "current_thread")]
async fn cancellation_during_backoff_aborts_the_turn() {
    let mut config = fast_retry_config();
    config.retry.initial_delay_ms = 5_000;
    config.retry.ceiling_ms = 60_000;
    let mut harness = manager_with(
        vec![ScriptedTurn::Fail(transient())],
        config,
        test_model(),
        false,
    );
    let handle = harness.session.abort_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.request_abort();
    });
    let error = harness.session.submit("go").await.expect_err("cancelled");
    assert!(matches!(error, AgentError::Cancelled));
    assert_eq!(harness.session.transcript().len(), 1);
    assert_eq!(harness.session.state(), SessionState::Idle);
}

#[tokio::test(flavor = "current_thread")]
async fn cancellation_during_delegation_rolls_back_the_pending_call() {
    let mut config = fast_retry_config();
    config.retry.initial_delay_ms = 5_000;
    config.retry.ceiling_ms = 60_000;
    let mut harness = manager_with(
        vec![
            tool_calls_turn(
                Some("Delegating."),
                vec![(
                    "call-1",
                    "make_edits",
                    r#"{"explanation":"change it","filepath":"a.py"}"#,
                )],
            ),
            // The editor's request stalls in backoff until the abort lands.
            ScriptedTurn::Fail(transient()),
        ],
        config,
        test_model(),
        false,
    );
    let handle = harness.session.abort_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.request_abort();
    });
    let error = harness.session.submit("go").await.expect_err("cancelled");
    assert!(matches!(error, AgentError::Cancelled));

    // The assistant message with the unresolved call was rolled back; the
    // transcript is consistent again.
    assert_eq!(harness.session.transcript().len(), 1);
    assert!(harness.session.transcript().unresolved_call_ids().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn settled_and_current_messages_all_reach_the_request() {
    let mut harness = manager(vec![text_reply("first"), text_reply("second")]);
    harness.session.submit("turn one").await.expect("turn");
    harness.session.settle_turn();
    harness.session.submit("turn two").await.expect("turn");

    let requests = harness.adapter.requests();
    let second = &requests[1].messages;
    // System prompt, then the settled first turn, then the new user input.
    assert_eq!(second.len(), 4);
    assert_eq!(second[0].role, Role::System);
    assert_eq!(second[1].text(), "turn one");
    assert_eq!(second[2].text(), "first");
    assert_eq!(second[3].text(), "turn two");
}

#[tokio::test(flavor = "current_thread")]
async fn manager_requests_advertise_the_tool_schema() {
    let mut harness = manager(vec![text_reply("ok")]);
    harness.session.submit("go").await.expect("turn");

    let requests = harness.adapter.requests();
    let tools = requests[0].tools.as_ref().expect("tools");
    let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, vec!["add_file", "remove_file", "make_edits", "stop_edits"]);
    assert_eq!(
        requests[0].tool_choice.as_ref().expect("tool choice").mode,
        "auto"
    );
    assert_eq!(requests[0].temperature, Some(1.0));
}
