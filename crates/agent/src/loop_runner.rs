//! The control-loop state machine.
//!
//! States: awaiting the model, dispatching tools, suspended, done. The
//! conversation is the only state that survives a suspension — there is
//! no hidden execution pointer, so a suspended run resumes by appending
//! the resolving tool result and calling [`AgentLoop::run`] again.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wegweiser_core::error::{Error, RoutingError, ToolError};
use wegweiser_core::message::{Conversation, Message, Role};
use wegweiser_core::provider::{Provider, ProviderRequest};
use wegweiser_core::tool::{ToolCall, ToolRegistry};

use crate::router::{NextAction, route};

/// How a loop invocation handed control back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model produced a plain-text turn; the conversation is complete
    /// for this cycle. The caller classifies the content further.
    Completed(String),

    /// The model asked for human input. Nothing has been appended beyond
    /// the tool-call-bearing assistant message; the caller resolves the
    /// call with a tool result carrying the human's answer, then re-runs.
    Suspended {
        question: String,
        tool_call_id: String,
    },

    /// The configured cycle bound was hit before the model terminated.
    Exhausted,
}

/// The agent loop that orchestrates model calls and tool execution.
pub struct AgentLoop {
    /// The text-generation collaborator
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Default max tokens per response
    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// The behavioral contract prepended to every conversation
    system_prompt: String,

    /// Maximum model/tool cycles per invocation
    max_cycles: u32,

    /// Per-tool-call execution timeout
    tool_timeout_secs: u64,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            system_prompt: system_prompt.into(),
            max_cycles: 15,
            tool_timeout_secs: 10,
        }
    }

    /// Set the maximum number of model/tool cycles.
    pub fn with_max_cycles(mut self, max: u32) -> Self {
        self.max_cycles = max;
        self
    }

    /// Set the default max tokens per model response.
    pub fn with_max_tokens(mut self, max: Option<u32>) -> Self {
        self.max_tokens = max;
        self
    }

    /// Set the per-tool-call timeout.
    pub fn with_tool_timeout(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = secs;
        self
    }

    /// Drive the loop until it terminates, suspends, or exhausts its
    /// cycle budget.
    ///
    /// A provider failure is fatal for the cycle and is not retried —
    /// silently retrying a stateful multi-turn conversation risks
    /// duplicate tool dispatch. Tool failures are non-fatal and become
    /// message content the model can react to.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<LoopOutcome, Error> {
        // Invariant: every dispatched tool call is answered before the
        // next model step. A caller re-entering with unresolved calls
        // broke the resume protocol.
        let unanswered = conversation.unanswered_tool_calls();
        if !unanswered.is_empty() {
            return Err(Error::Internal(format!(
                "Cannot run with unresolved tool calls: {}",
                unanswered.join(", ")
            )));
        }

        self.ensure_system_prompt(conversation);

        info!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            "Starting control loop"
        );

        let tool_definitions = self.tools.definitions();

        for cycle in 1..=self.max_cycles {
            debug!(conversation_id = %conversation.id, cycle, "Model step");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response = self.provider.complete(request).await?;
            let assistant = response.message;
            conversation.push(assistant.clone());

            match route(&assistant) {
                NextAction::Terminate => {
                    return Ok(LoopOutcome::Completed(assistant.content));
                }
                NextAction::SuspendForHuman => {
                    // The first call carries the question. Nothing is
                    // appended here — the call stays unanswered until the
                    // caller resolves it.
                    let first = &assistant.tool_calls[0];
                    let question = serde_json::from_str::<serde_json::Value>(&first.arguments)
                        .ok()
                        .and_then(|v| v["question"].as_str().map(str::to_string))
                        .unwrap_or_else(|| assistant.content.clone());

                    info!(tool_call_id = %first.id, "Suspending for human input");
                    return Ok(LoopOutcome::Suspended {
                        question,
                        tool_call_id: first.id.clone(),
                    });
                }
                NextAction::InvokeTools => {
                    self.dispatch_tools(conversation, &assistant.tool_calls).await?;
                }
            }
        }

        warn!(
            conversation_id = %conversation.id,
            max_cycles = self.max_cycles,
            "Cycle budget exhausted"
        );
        Ok(LoopOutcome::Exhausted)
    }

    /// Make the system prompt message 0, inserting or refreshing it.
    fn ensure_system_prompt(&self, conversation: &mut Conversation) {
        if conversation.messages.first().map(|m| m.role) != Some(Role::System) {
            conversation
                .messages
                .insert(0, Message::system(&self.system_prompt));
        } else {
            conversation.messages[0] = Message::system(&self.system_prompt);
        }
    }

    /// Execute every tool call of one assistant turn and append one tool
    /// result per call, in call order.
    ///
    /// Calls run concurrently (independent, read-only network calls) but
    /// results are reassembled in the originating order, not completion
    /// order. All names and argument shapes are checked before anything
    /// executes, so a routing error never leaves partial results behind.
    /// A routing error is fatal for the cycle only: every issued call is
    /// resolved with error text before the error propagates, so the
    /// conversation stays re-entrant and a later turn can recover.
    async fn dispatch_tools(
        &self,
        conversation: &mut Conversation,
        tool_calls: &[wegweiser_core::message::MessageToolCall],
    ) -> Result<(), Error> {
        let mut calls = Vec::with_capacity(tool_calls.len());
        let mut routing_error = None;
        for tc in tool_calls {
            if self.tools.get(&tc.name).is_none() {
                routing_error = Some(RoutingError::UnknownTool(tc.name.clone()));
                break;
            }
            match serde_json::from_str(&tc.arguments) {
                Ok(arguments) => calls.push(ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                }),
                Err(e) => {
                    routing_error = Some(RoutingError::MalformedCall {
                        call_id: tc.id.clone(),
                        reason: format!("arguments are not valid JSON: {e}"),
                    });
                    break;
                }
            }
        }

        if let Some(err) = routing_error {
            for tc in tool_calls {
                conversation.push(Message::tool_result(&tc.id, format!("Error: {err}")));
            }
            return Err(err.into());
        }

        debug!(tool_count = calls.len(), "Dispatching tool calls");

        let timeout = std::time::Duration::from_secs(self.tool_timeout_secs);
        let executions = calls.iter().map(|call| async move {
            match tokio::time::timeout(timeout, self.tools.execute(call)).await {
                Err(_) => {
                    let err = ToolError::Timeout {
                        tool_name: call.name.clone(),
                        timeout_secs: self.tool_timeout_secs,
                    };
                    warn!(tool = %call.name, "Tool call timed out");
                    Ok(Message::tool_result(&call.id, format!("Error: {err}")))
                }
                Ok(Err(routing)) => Err(Error::Routing(routing)),
                Ok(Ok(Ok(result))) => Ok(Message::tool_result(&call.id, result.output)),
                Ok(Ok(Err(tool_err))) => {
                    warn!(tool = %call.name, error = %tool_err, "Tool execution failed");
                    Ok(Message::tool_result(&call.id, format!("Error: {tool_err}")))
                }
            }
        });

        // join_all preserves input order regardless of completion order.
        for result in join_all(executions).await {
            conversation.push(result?);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wegweiser_core::error::ProviderError;
    use wegweiser_core::message::MessageToolCall;
    use wegweiser_core::provider::{ProviderResponse, ToolDefinition};
    use wegweiser_core::tool::{Tool, ToolResult};
    use wegweiser_tools::HUMAN_FEEDBACK_TOOL_NAME;

    /// A provider that replays a scripted sequence of assistant messages.
    struct ScriptedProvider {
        script: Mutex<Vec<Message>>,
    }

    impl ScriptedProvider {
        fn new(mut messages: Vec<Message>) -> Self {
            messages.reverse();
            Self {
                script: Mutex::new(messages),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let message = self
                .script
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ProviderError::Network("script exhausted".into()))?;
            Ok(ProviderResponse {
                message,
                usage: None,
                model: "scripted-model".into(),
            })
        }
    }

    /// A tool that sleeps, then echoes its own name.
    struct DelayedTool {
        name: &'static str,
        delay_ms: u64,
    }

    #[async_trait]
    impl Tool for DelayedTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult, ToolError> {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            Ok(ToolResult::ok("", format!("{} output", self.name)))
        }
    }

    /// A tool that always fails internally.
    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "failing".into(),
                reason: "connection refused".into(),
            })
        }
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn assistant_with_calls(calls: Vec<MessageToolCall>) -> Message {
        let mut msg = Message::assistant("");
        msg.tool_calls = calls;
        msg
    }

    fn agent(provider: ScriptedProvider, tools: ToolRegistry) -> AgentLoop {
        AgentLoop::new(
            Arc::new(provider),
            "test-model",
            0.7,
            Arc::new(tools),
            "You are a study advisor.",
        )
    }

    #[tokio::test]
    async fn plain_answer_completes_without_tools() {
        let provider = ScriptedProvider::new(vec![Message::assistant("5")]);
        let loop_ = agent(provider, ToolRegistry::new());

        let mut conv = Conversation::new();
        conv.push(Message::user("Addiere 2 und 3."));

        let outcome = loop_.run(&mut conv).await.unwrap();
        assert_eq!(outcome, LoopOutcome::Completed("5".into()));
        // system + user + assistant
        assert_eq!(conv.messages.len(), 3);
        assert_eq!(conv.messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn empty_assistant_message_terminates() {
        let provider = ScriptedProvider::new(vec![Message::assistant("")]);
        let loop_ = agent(provider, ToolRegistry::new());

        let mut conv = Conversation::new();
        conv.push(Message::user("hello"));

        let outcome = loop_.run(&mut conv).await.unwrap();
        assert_eq!(outcome, LoopOutcome::Completed(String::new()));
    }

    #[tokio::test]
    async fn tool_results_appended_in_call_order_not_completion_order() {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(DelayedTool {
            name: "slow",
            delay_ms: 80,
        }));
        tools.register(Box::new(DelayedTool {
            name: "fast",
            delay_ms: 0,
        }));

        let provider = ScriptedProvider::new(vec![
            assistant_with_calls(vec![
                tool_call("call_slow", "slow", "{}"),
                tool_call("call_fast", "fast", "{}"),
            ]),
            Message::assistant("done"),
        ]);
        let loop_ = agent(provider, tools);

        let mut conv = Conversation::new();
        conv.push(Message::user("go"));

        let outcome = loop_.run(&mut conv).await.unwrap();
        assert_eq!(outcome, LoopOutcome::Completed("done".into()));

        let results: Vec<&Message> = conv
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_call_id.as_deref(), Some("call_slow"));
        assert_eq!(results[1].tool_call_id.as_deref(), Some("call_fast"));
        assert!(conv.unanswered_tool_calls().is_empty());
    }

    #[tokio::test]
    async fn tool_failure_becomes_error_text_result() {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(FailingTool));

        let provider = ScriptedProvider::new(vec![
            assistant_with_calls(vec![tool_call("call_1", "failing", "{}")]),
            Message::assistant("I could not reach that source."),
        ]);
        let loop_ = agent(provider, tools);

        let mut conv = Conversation::new();
        conv.push(Message::user("go"));

        let outcome = loop_.run(&mut conv).await.unwrap();
        assert!(matches!(outcome, LoopOutcome::Completed(_)));

        let result = conv
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(result.content.contains("Error:"));
        assert!(result.content.contains("connection refused"));
    }

    #[tokio::test]
    async fn unknown_tool_is_fatal_routing_error() {
        let provider = ScriptedProvider::new(vec![assistant_with_calls(vec![tool_call(
            "call_1",
            "teleport",
            "{}",
        )])]);
        let loop_ = agent(provider, ToolRegistry::new());

        let mut conv = Conversation::new();
        conv.push(Message::user("go"));

        let err = loop_.run(&mut conv).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Routing(RoutingError::UnknownTool(name)) if name == "teleport"
        ));
        // Every issued call was resolved with error text, so the
        // conversation is not left with dangling calls.
        let result = conv
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
        assert!(result.content.contains("Unknown tool"));
        assert!(conv.unanswered_tool_calls().is_empty());
    }

    #[tokio::test]
    async fn conversation_survives_a_routing_error() {
        let provider = ScriptedProvider::new(vec![
            assistant_with_calls(vec![tool_call("call_1", "teleport", "{}")]),
            Message::assistant("Let me answer without that."),
        ]);
        let loop_ = agent(provider, ToolRegistry::new());

        let mut conv = Conversation::new();
        conv.push(Message::user("go"));

        let err = loop_.run(&mut conv).await.unwrap_err();
        assert!(matches!(err, Error::Routing(_)));

        // The session continues: the next turn takes a model step
        // instead of tripping the unresolved-calls guard.
        conv.push(Message::user("try again"));
        let outcome = loop_.run(&mut conv).await.unwrap();
        assert_eq!(
            outcome,
            LoopOutcome::Completed("Let me answer without that.".into())
        );
    }

    #[tokio::test]
    async fn malformed_arguments_are_fatal() {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(DelayedTool {
            name: "fast",
            delay_ms: 0,
        }));

        let provider = ScriptedProvider::new(vec![assistant_with_calls(vec![tool_call(
            "call_1",
            "fast",
            "not json",
        )])]);
        let loop_ = agent(provider, tools);

        let mut conv = Conversation::new();
        conv.push(Message::user("go"));

        let err = loop_.run(&mut conv).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Routing(RoutingError::MalformedCall { .. })
        ));
        assert!(conv.unanswered_tool_calls().is_empty());
    }

    #[tokio::test]
    async fn human_feedback_call_suspends_with_question_and_id() {
        let provider = ScriptedProvider::new(vec![assistant_with_calls(vec![tool_call(
            "call_hf",
            HUMAN_FEEDBACK_TOOL_NAME,
            r#"{"question": "Income priority?"}"#,
        )])]);
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(wegweiser_tools::human_feedback::HumanFeedbackTool));
        let loop_ = agent(provider, tools);

        let mut conv = Conversation::new();
        conv.push(Message::user("advise me"));

        let outcome = loop_.run(&mut conv).await.unwrap();
        assert_eq!(
            outcome,
            LoopOutcome::Suspended {
                question: "Income priority?".into(),
                tool_call_id: "call_hf".into(),
            }
        );
        // Zero tool results appended; the call stays unanswered.
        assert!(!conv.messages.iter().any(|m| m.role == Role::Tool));
        assert_eq!(conv.unanswered_tool_calls(), vec!["call_hf"]);
    }

    #[tokio::test]
    async fn suspended_conversation_resumes_after_answer() {
        let provider = ScriptedProvider::new(vec![
            assistant_with_calls(vec![tool_call(
                "call_hf",
                HUMAN_FEEDBACK_TOOL_NAME,
                r#"{"question": "Income priority?"}"#,
            )]),
            Message::assistant("Then I recommend industrial engineering."),
        ]);
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(wegweiser_tools::human_feedback::HumanFeedbackTool));
        let loop_ = agent(provider, tools);

        let mut conv = Conversation::new();
        conv.push(Message::user("advise me"));

        let outcome = loop_.run(&mut conv).await.unwrap();
        let LoopOutcome::Suspended { tool_call_id, .. } = outcome else {
            panic!("expected suspension");
        };

        // The caller resolves the call and re-enters the loop.
        conv.push(Message::tool_result(&tool_call_id, "Yes, income matters most."));
        let outcome = loop_.run(&mut conv).await.unwrap();
        assert_eq!(
            outcome,
            LoopOutcome::Completed("Then I recommend industrial engineering.".into())
        );
    }

    #[tokio::test]
    async fn re_entry_with_unresolved_calls_is_rejected() {
        let provider = ScriptedProvider::new(vec![]);
        let loop_ = agent(provider, ToolRegistry::new());

        let mut conv = Conversation::new();
        conv.push(Message::user("go"));
        conv.push(assistant_with_calls(vec![tool_call(
            "call_1",
            "web_search",
            "{}",
        )]));

        let err = loop_.run(&mut conv).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn cycle_budget_exhaustion_is_distinct_outcome() {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(DelayedTool {
            name: "fast",
            delay_ms: 0,
        }));

        // The model never stops calling tools.
        let script: Vec<Message> = (0..5)
            .map(|i| {
                assistant_with_calls(vec![tool_call(&format!("call_{i}"), "fast", "{}")])
            })
            .collect();
        let provider = ScriptedProvider::new(script);
        let loop_ = agent(provider, tools).with_max_cycles(3);

        let mut conv = Conversation::new();
        conv.push(Message::user("go"));

        let outcome = loop_.run(&mut conv).await.unwrap();
        assert_eq!(outcome, LoopOutcome::Exhausted);
    }

    #[tokio::test]
    async fn provider_failure_is_fatal_not_retried() {
        struct FailingProvider;

        #[async_trait]
        impl Provider for FailingProvider {
            fn name(&self) -> &str {
                "failing"
            }
            async fn complete(
                &self,
                _request: ProviderRequest,
            ) -> Result<ProviderResponse, ProviderError> {
                Err(ProviderError::Timeout("deadline exceeded".into()))
            }
        }

        let loop_ = AgentLoop::new(
            Arc::new(FailingProvider),
            "test-model",
            0.7,
            Arc::new(ToolRegistry::new()),
            "prompt",
        );

        let mut conv = Conversation::new();
        conv.push(Message::user("go"));

        let err = loop_.run(&mut conv).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Timeout(_))));
    }

    #[tokio::test]
    async fn slow_tool_degrades_to_timeout_text() {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(DelayedTool {
            name: "glacial",
            delay_ms: 5_000,
        }));

        let provider = ScriptedProvider::new(vec![
            assistant_with_calls(vec![tool_call("call_1", "glacial", "{}")]),
            Message::assistant("moving on"),
        ]);
        let loop_ = agent(provider, tools).with_tool_timeout(0);

        let mut conv = Conversation::new();
        conv.push(Message::user("go"));

        let outcome = loop_.run(&mut conv).await.unwrap();
        assert_eq!(outcome, LoopOutcome::Completed("moving on".into()));

        let result = conv
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(result.content.contains("timed out"));
    }

    #[tokio::test]
    async fn system_prompt_is_prepended_once_and_refreshed() {
        let provider = ScriptedProvider::new(vec![
            Message::assistant("first"),
            Message::assistant("second"),
        ]);
        let loop_ = agent(provider, ToolRegistry::new());

        let mut conv = Conversation::new();
        conv.push(Message::user("one"));
        loop_.run(&mut conv).await.unwrap();

        conv.push(Message::user("two"));
        loop_.run(&mut conv).await.unwrap();

        let system_count = conv
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        assert_eq!(system_count, 1);
        assert_eq!(conv.messages[0].role, Role::System);
    }
}
