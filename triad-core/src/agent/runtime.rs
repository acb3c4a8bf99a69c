//! Agent invocation loop
//!
//! One call to [`AgentRuntime::run`] is one isolated agent invocation: a
//! fresh model connection, a history that starts from the system prompt
//! and the task text, and a transcript that is handed back to the caller
//! when a terminal token appears or the message cap is reached.

use tracing::{debug, info, warn};

use super::model::{ChatMessage, ChatRequest, ModelProvider};
use super::transcript::{Item, Message, StopReason, Transcript, TASK_SOURCE};
use super::AgentRole;
use crate::pipeline::{EventSink, PipelineEvent};
use crate::tools::ToolSet;
use crate::Result;

/// Source label of tool result messages
pub const TOOL_SOURCE: &str = "tool";

/// When an invocation stops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    /// Case-sensitive tokens looked for in the agent's own text
    pub tokens: Vec<String>,
    /// Cap on transcript messages, task included; also caps model calls
    pub max_messages: usize,
}

impl Termination {
    /// Default termination of a role with the given message cap
    pub fn for_role(role: AgentRole, max_messages: usize) -> Self {
        Self {
            tokens: role.terminal_tokens().iter().map(|t| t.to_string()).collect(),
            max_messages,
        }
    }

    /// First terminal token present in `text`
    pub fn matched(&self, text: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|t| text.contains(t.as_str()))
            .map(String::as_str)
    }
}

/// Everything that defines one agent
///
/// Built fresh for every phase execution so no state can leak between
/// invocations.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub name: String,
    pub role: AgentRole,
    pub model: String,
    pub system_prompt: String,
    pub tools: ToolSet,
    pub termination: Termination,
}

/// Runs agents against a model provider
pub struct AgentRuntime<'a> {
    provider: &'a dyn ModelProvider,
}

impl<'a> AgentRuntime<'a> {
    pub fn new(provider: &'a dyn ModelProvider) -> Self {
        Self { provider }
    }

    /// Invoke an agent on a task
    ///
    /// Tool calls run strictly in emission order. A turn carrying both
    /// text and tool calls runs its tools before termination is checked.
    /// Model transport failures abort the invocation.
    pub async fn run(
        &self,
        spec: &AgentSpec,
        task: &str,
        events: &mut dyn EventSink,
    ) -> Result<Transcript> {
        let model = self.provider.open(&spec.model)?;
        let definitions = spec.tools.definitions();
        let max = spec.termination.max_messages;

        info!(
            agent = %spec.name,
            model = %spec.model,
            tools = spec.tools.len(),
            max_messages = max,
            "Starting agent"
        );

        let mut history = vec![
            ChatMessage::system(spec.system_prompt.clone()),
            ChatMessage::user(task),
        ];
        let mut messages = vec![Message::text(TASK_SOURCE, task)];
        let mut model_calls = 0usize;

        let stop = loop {
            if messages.len() >= max || model_calls >= max {
                warn!(agent = %spec.name, messages = messages.len(), "Message cap reached");
                break StopReason::MessageLimit(max);
            }

            let request = ChatRequest {
                messages: history.clone(),
                tools: definitions.clone(),
            };
            let response = model.complete(&request).await?;
            model_calls += 1;

            let text = response.content.clone();
            if !text.trim().is_empty() || response.tool_calls.is_empty() {
                messages.push(Message::text(&spec.name, text.clone()));
                if !text.trim().is_empty() {
                    events.emit(PipelineEvent::AgentMessage {
                        agent: spec.name.clone(),
                        text: text.clone(),
                    });
                }
            }

            history.push(ChatMessage::assistant(
                text.clone(),
                response.tool_calls.clone(),
            ));

            if !response.tool_calls.is_empty() {
                let calls: Vec<Item> = response
                    .tool_calls
                    .iter()
                    .map(|c| Item::ToolCall {
                        id: c.id.clone(),
                        name: c.name.clone(),
                        arguments: c.arguments.clone(),
                    })
                    .collect();
                messages.push(Message::items(&spec.name, calls));

                let mut results = Vec::with_capacity(response.tool_calls.len());
                for call in &response.tool_calls {
                    events.emit(PipelineEvent::ToolCall {
                        agent: spec.name.clone(),
                        tool: call.name.clone(),
                        brief: spec.tools.brief(&call.name, &call.arguments),
                    });

                    let output = spec.tools.invoke(&call.name, &call.arguments).await;
                    debug!(
                        agent = %spec.name,
                        tool = %call.name,
                        is_error = output.is_error,
                        "Tool returned"
                    );

                    events.emit(PipelineEvent::ToolResult {
                        agent: spec.name.clone(),
                        tool: call.name.clone(),
                        summary: spec.tools.summarize(&call.name, &output),
                        is_error: output.is_error,
                    });

                    history.push(ChatMessage::tool_result(&call.id, output.text.clone()));
                    results.push(Item::ToolResult {
                        call_id: call.id.clone(),
                        name: call.name.clone(),
                        output: output.text,
                        is_error: output.is_error,
                    });
                }
                messages.push(Message::items(TOOL_SOURCE, results));
            }

            if let Some(token) = spec.termination.matched(&text) {
                info!(agent = %spec.name, token, messages = messages.len(), "Agent finished");
                break StopReason::Token(token.to_string());
            }
        };

        Ok(Transcript::new(spec.name.clone(), messages, stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ChatResponse, Content, ToolCall, APPROVED, CHANGES_REQUESTED};
    use crate::pipeline::NullSink;
    use crate::testing::{FakeRepository, FakeTracker, ScriptedProvider};
    use crate::tools::RunContext;
    use std::sync::Arc;

    fn spec(role: AgentRole, max_messages: usize) -> (AgentSpec, Arc<FakeRepository>) {
        let repo = Arc::new(FakeRepository::new());
        let ctx = RunContext::new(Arc::new(FakeTracker::new()), repo.clone(), "dev");
        let spec = AgentSpec {
            name: role.name().to_string(),
            role,
            model: "test-model".to_string(),
            system_prompt: "system".to_string(),
            tools: ToolSet::for_role(role, &ctx),
            termination: Termination::for_role(role, max_messages),
        };
        (spec, repo)
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_termination_is_case_sensitive() {
        let t = Termination::for_role(AgentRole::Architect, 30);
        assert_eq!(t.matched("Verdict: APPROVED"), Some(APPROVED));
        assert_eq!(t.matched("CHANGES_REQUESTED"), Some(CHANGES_REQUESTED));
        assert_eq!(t.matched("approved"), None);
    }

    #[tokio::test]
    async fn test_runs_tools_then_stops_on_token() {
        let provider = ScriptedProvider::new(vec![vec![
            ChatResponse::tools(vec![tool_call(
                "c1",
                "create_branch",
                r#"{"branch_name":"feature/ABC-1"}"#,
            )]),
            ChatResponse::text("Branch ready. PHASE_COMPLETE"),
        ]]);
        let (spec, repo) = spec(AgentRole::Developer, 60);
        let mut events: Vec<PipelineEvent> = Vec::new();

        let transcript = AgentRuntime::new(&provider)
            .run(&spec, "Read Jira ticket ABC-1", &mut events)
            .await
            .unwrap();

        assert_eq!(
            transcript.stop_reason(),
            &StopReason::Token("PHASE_COMPLETE".into())
        );
        // task, call batch, result batch, final text
        assert_eq!(transcript.len(), 4);
        assert!(transcript.messages()[0].is_task());
        assert_eq!(repo.branches(), vec!["feature/ABC-1".to_string()]);
        assert_eq!(provider.opened(), vec!["test-model".to_string()]);

        assert!(matches!(events[0], PipelineEvent::ToolCall { ref tool, .. } if tool == "create_branch"));
        assert!(matches!(events[1], PipelineEvent::ToolResult { is_error: false, .. }));
        assert!(matches!(events[2], PipelineEvent::AgentMessage { .. }));
    }

    #[tokio::test]
    async fn test_tools_run_before_termination_in_same_turn() {
        let provider = ScriptedProvider::new(vec![vec![ChatResponse {
            content: "Submitting. APPROVED".to_string(),
            tool_calls: vec![tool_call("c1", "approve_pull_request", r#"{"pr_number":3}"#)],
            ..Default::default()
        }]]);
        let (spec, repo) = spec(AgentRole::Architect, 30);

        let transcript = AgentRuntime::new(&provider)
            .run(&spec, "Review Pull Request #3", &mut NullSink)
            .await
            .unwrap();

        assert_eq!(transcript.stop_reason(), &StopReason::Token("APPROVED".into()));
        assert_eq!(repo.reviews_submitted().len(), 1);
        // task, text, call batch, result batch
        assert_eq!(transcript.len(), 4);
    }

    #[tokio::test]
    async fn test_message_cap_stops_runaway_agent() {
        let looping: Vec<ChatResponse> = (0..10)
            .map(|i| {
                ChatResponse::tools(vec![tool_call(
                    &format!("c{}", i),
                    "get_repo_tree",
                    "{}",
                )])
            })
            .collect();
        let provider = ScriptedProvider::new(vec![looping]);
        let (spec, _) = spec(AgentRole::Developer, 5);

        let transcript = AgentRuntime::new(&provider)
            .run(&spec, "task", &mut NullSink)
            .await
            .unwrap();

        assert_eq!(transcript.stop_reason(), &StopReason::MessageLimit(5));
        assert!(transcript.stop_reason().is_forced());
        // task + two full tool turns
        assert_eq!(transcript.len(), 5);
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_errors_are_fed_back() {
        let provider = ScriptedProvider::new(vec![vec![
            ChatResponse::tools(vec![tool_call("c1", "merge_pull_request", "{}")]),
            ChatResponse::text("No merge tool. PHASE_COMPLETE"),
        ]]);
        let (spec, _) = spec(AgentRole::Developer, 60);

        let transcript = AgentRuntime::new(&provider)
            .run(&spec, "task", &mut NullSink)
            .await
            .unwrap();

        let Content::Items(items) = &transcript.messages()[2].content else {
            panic!("expected tool results");
        };
        assert!(matches!(&items[0], Item::ToolResult { is_error: true, output, .. } if output.starts_with("Error: ")));

        // The error text is in the history the model sees next
        let second = &provider.requests()[1];
        assert!(second.messages.last().unwrap().content.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_lowercase_token_does_not_terminate() {
        let provider = ScriptedProvider::new(vec![vec![
            ChatResponse::text("phase_complete soon"),
            ChatResponse::text("Done. PHASE_COMPLETE"),
        ]]);
        let (spec, _) = spec(AgentRole::ProductManager, 20);

        let transcript = AgentRuntime::new(&provider)
            .run(&spec, "task", &mut NullSink)
            .await
            .unwrap();
        assert_eq!(transcript.len(), 3);
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_model_error_aborts() {
        let provider = ScriptedProvider::new(vec![vec![]]);
        let (spec, _) = spec(AgentRole::ProductManager, 20);
        let err = AgentRuntime::new(&provider)
            .run(&spec, "task", &mut NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Model(_)));
    }
}
