//! Tool registry
//!
//! Tools are the only way an agent touches the outside world. Every tool
//! failure is converted into `Error: ...` result text at this boundary so
//! the acting agent can see it and decide how to recover; nothing raised
//! by a tool ends the run.

mod context;
mod repository;
mod tracker;

pub use context::{BranchCursor, RunContext};
pub use repository::{
    AddPrReview, ApprovePullRequest, CreateBranch, CreateOrUpdateFile, CreatePullRequest,
    GetFileContent, GetPrDiff, GetPrFiles, GetPrReviewComments, GetPrReviews, GetRepoTree,
};
pub use tracker::{AddJiraComment, CreateJiraIssue, GetJiraIssue, TransitionJiraIssue};

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::agent::{AgentRole, ToolDefinition};
use crate::{Error, Result};

/// Name of the tool that files the issue
pub const CREATE_ISSUE_TOOL: &str = "create_jira_issue";

/// Name of the tool that opens the pull request
pub const CREATE_PULL_REQUEST_TOOL: &str = "create_pull_request";

/// A callable the model may invoke
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name advertised to the model
    fn name(&self) -> &'static str;

    /// Description advertised to the model
    fn description(&self) -> &'static str;

    /// JSON schema of the argument object
    fn parameters(&self) -> Value;

    /// Run the tool
    async fn call(&self, args: Value) -> Result<String>;

    /// Short rendering of the arguments for display
    fn brief(&self, args: &Value) -> String {
        let compact = args.to_string();
        if compact == "{}" || compact == "null" {
            String::new()
        } else {
            shorten(&compact, 60)
        }
    }

    /// Short rendering of a successful result for display
    fn summarize(&self, output: &str) -> String {
        shorten(output.lines().next().unwrap_or(""), 80)
    }
}

/// Result text of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    fn ok(text: String) -> Self {
        Self {
            text,
            is_error: false,
        }
    }

    fn error(err: &Error) -> Self {
        Self {
            text: format!("Error: {}", err),
            is_error: true,
        }
    }
}

/// The fixed set of tools available to one agent
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool (builder pattern)
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    /// The tool set a role is allowed to use
    pub fn for_role(role: AgentRole, ctx: &RunContext) -> Self {
        match role {
            AgentRole::ProductManager => Self::new().with(CreateJiraIssue::new(ctx)),
            AgentRole::Developer => Self::new()
                .with(GetJiraIssue::new(ctx))
                .with(GetRepoTree::new(ctx))
                .with(GetFileContent::new(ctx))
                .with(CreateBranch::new(ctx))
                .with(CreateOrUpdateFile::new(ctx))
                .with(CreatePullRequest::new(ctx))
                .with(AddJiraComment::new(ctx))
                .with(TransitionJiraIssue::new(ctx)),
            AgentRole::Architect => Self::new()
                .with(GetPrDiff::new(ctx))
                .with(GetPrFiles::new(ctx))
                .with(GetFileContent::new(ctx))
                .with(AddPrReview::new(ctx))
                .with(ApprovePullRequest::new(ctx)),
            AgentRole::DeveloperFix => Self::new()
                .with(GetPrReviews::new(ctx))
                .with(GetPrReviewComments::new(ctx))
                .with(GetRepoTree::new(ctx))
                .with(GetFileContent::new(ctx))
                .with(CreateOrUpdateFile::new(ctx))
                .with(AddJiraComment::new(ctx)),
        }
    }

    /// Names of all tools, in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions advertised to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Brief rendering of raw arguments for display
    pub fn brief(&self, name: &str, raw_args: &str) -> String {
        match (self.get(name), parse_raw_args(raw_args)) {
            (Some(tool), Ok(args)) => tool.brief(&args),
            _ => shorten(raw_args, 60),
        }
    }

    /// Display summary of an invocation result
    pub fn summarize(&self, name: &str, output: &ToolOutput) -> String {
        match self.get(name) {
            Some(tool) if !output.is_error => tool.summarize(&output.text),
            _ => shorten(output.text.lines().next().unwrap_or(""), 80),
        }
    }

    /// Invoke a tool by name with the model's raw argument text
    ///
    /// Never fails: unknown tools, malformed arguments and tool errors all
    /// come back as error result text.
    pub async fn invoke(&self, name: &str, raw_args: &str) -> ToolOutput {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "Model called a tool outside its tool set");
            return ToolOutput::error(&Error::Agent(format!(
                "unknown tool '{}'. Available tools: {}",
                name,
                self.names().join(", ")
            )));
        };

        let args = match parse_raw_args(raw_args) {
            Ok(args) => args,
            Err(e) => {
                return ToolOutput::error(&Error::InvalidArguments {
                    tool: name.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        match tool.call(args).await {
            Ok(text) => {
                debug!(tool = name, bytes = text.len(), "Tool call succeeded");
                ToolOutput::ok(text)
            }
            Err(e) => {
                debug!(tool = name, error = %e, "Tool call failed");
                ToolOutput::error(&e)
            }
        }
    }
}

fn parse_raw_args(raw: &str) -> serde_json::Result<Value> {
    if raw.trim().is_empty() {
        Ok(Value::Object(Default::default()))
    } else {
        serde_json::from_str(raw)
    }
}

/// Deserialize a tool's argument object into its typed form
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| Error::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Accept `17`, `"17"` or `"#17"` for numeric parameters
pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u64),
        Text(String),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(n) => Ok(n),
        Number::Text(s) => s
            .trim()
            .trim_start_matches('#')
            .parse()
            .map_err(|_| de::Error::custom(format!("expected a number, got \"{}\"", s))),
    }
}

/// Cut text to at most `max` characters, marking the cut
pub(crate) fn shorten(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRepository, FakeTracker};
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echo a number"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"n": {"type": "integer"}}, "required": ["n"]})
        }

        async fn call(&self, args: Value) -> Result<String> {
            #[derive(Deserialize)]
            struct Args {
                #[serde(deserialize_with = "lenient_u64")]
                n: u64,
            }
            let args: Args = parse_args(self.name(), args)?;
            if args.n == 0 {
                return Err(Error::NotFound("zero".to_string()));
            }
            Ok(format!("n={}", args.n))
        }
    }

    #[tokio::test]
    async fn test_invoke_accepts_string_numbers() {
        let tools = ToolSet::new().with(Echo);
        assert_eq!(tools.invoke("echo", r#"{"n": 17}"#).await.text, "n=17");
        assert_eq!(tools.invoke("echo", r#"{"n": "17"}"#).await.text, "n=17");
        assert_eq!(tools.invoke("echo", r##"{"n": "#17"}"##).await.text, "n=17");
    }

    #[tokio::test]
    async fn test_invoke_errors_become_results() {
        let tools = ToolSet::new().with(Echo);

        let out = tools.invoke("echo", r#"{"n": 0}"#).await;
        assert!(out.is_error);
        assert_eq!(out.text, "Error: Not found: zero");

        let out = tools.invoke("echo", r#"{"n": "many"}"#).await;
        assert!(out.is_error);
        assert!(out.text.starts_with("Error: Invalid arguments for echo"));

        let out = tools.invoke("echo", "{not json").await;
        assert!(out.is_error);

        let out = tools.invoke("merge_pull_request", "{}").await;
        assert!(out.is_error);
        assert!(out.text.contains("unknown tool 'merge_pull_request'"));
    }

    #[test]
    fn test_role_tool_sets() {
        let ctx = RunContext::new(
            Arc::new(FakeTracker::new()),
            Arc::new(FakeRepository::new()),
            "dev",
        );

        assert_eq!(
            ToolSet::for_role(AgentRole::ProductManager, &ctx).names(),
            vec!["create_jira_issue"]
        );
        assert_eq!(
            ToolSet::for_role(AgentRole::Developer, &ctx).names(),
            vec![
                "get_jira_issue",
                "get_repo_tree",
                "get_file_content",
                "create_branch",
                "create_or_update_file",
                "create_pull_request",
                "add_jira_comment",
                "transition_jira_issue",
            ]
        );
        assert_eq!(
            ToolSet::for_role(AgentRole::Architect, &ctx).names(),
            vec![
                "get_pr_diff",
                "get_pr_files",
                "get_file_content",
                "add_pr_review",
                "approve_pull_request",
            ]
        );
        assert_eq!(
            ToolSet::for_role(AgentRole::DeveloperFix, &ctx).names(),
            vec![
                "get_pr_reviews",
                "get_pr_review_comments",
                "get_repo_tree",
                "get_file_content",
                "create_or_update_file",
                "add_jira_comment",
            ]
        );
    }

    #[test]
    fn test_no_tool_set_can_merge() {
        let ctx = RunContext::new(
            Arc::new(FakeTracker::new()),
            Arc::new(FakeRepository::new()),
            "dev",
        );
        for role in AgentRole::all() {
            let tools = ToolSet::for_role(*role, &ctx);
            assert!(tools.names().iter().all(|n| !n.contains("merge")));
            for def in tools.definitions() {
                assert_eq!(def.parameters["type"], "object");
            }
        }
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("abcdef", 3), "abc…");
        assert_eq!(shorten("abc", 3), "abc");
    }
}
