//! Tracker tools

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, shorten, RunContext, Tool};
use crate::tracker::NewIssue;
use crate::Result;

fn default_issue_type() -> String {
    "Task".to_string()
}

/// Files a new issue in the configured project
#[derive(Debug, Clone)]
pub struct CreateJiraIssue {
    ctx: RunContext,
}

impl CreateJiraIssue {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[derive(Deserialize)]
struct CreateIssueArgs {
    summary: String,
    description: String,
    #[serde(default)]
    acceptance_criteria: Option<String>,
    #[serde(default = "default_issue_type")]
    issue_type: String,
}

#[async_trait]
impl Tool for CreateJiraIssue {
    fn name(&self) -> &'static str {
        super::CREATE_ISSUE_TOOL
    }

    fn description(&self) -> &'static str {
        "Create a Jira issue in the configured project. The issue is assigned to the \
         authenticated user when possible. Returns the issue key and URL."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string", "description": "One-line issue title"},
                "description": {"type": "string", "description": "Detailed description"},
                "acceptance_criteria": {
                    "type": "string",
                    "description": "Definition-of-done checklist, appended to the description"
                },
                "issue_type": {
                    "type": "string",
                    "description": "Task, Story or Bug. Defaults to Task"
                }
            },
            "required": ["summary", "description"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: CreateIssueArgs = parse_args(self.name(), args)?;
        let issue = NewIssue {
            summary: args.summary,
            description: args.description,
            acceptance_criteria: args.acceptance_criteria,
            issue_type: args.issue_type,
        };

        let created = self.ctx.tracker().create_issue(&issue).await?;
        Ok(format!(
            "Created Jira issue: {}\nURL: {}\nAssigned to: {}",
            created.key,
            created.url,
            created.assignee.as_deref().unwrap_or("could not assign")
        ))
    }

    fn brief(&self, args: &Value) -> String {
        shorten(args["summary"].as_str().unwrap_or(""), 60)
    }
}

#[derive(Deserialize)]
struct IssueKeyArgs {
    issue_key: String,
}

/// Reads an issue
#[derive(Debug, Clone)]
pub struct GetJiraIssue {
    ctx: RunContext,
}

impl GetJiraIssue {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[async_trait]
impl Tool for GetJiraIssue {
    fn name(&self) -> &'static str {
        "get_jira_issue"
    }

    fn description(&self) -> &'static str {
        "Get the full details of a Jira issue as JSON: key, summary, description, \
         status, issue type and assignee."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issue_key": {"type": "string", "description": "Issue key, e.g. ABC-123"}
            },
            "required": ["issue_key"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: IssueKeyArgs = parse_args(self.name(), args)?;
        let issue = self.ctx.tracker().get_issue(args.issue_key.trim()).await?;
        Ok(serde_json::to_string_pretty(&issue)?)
    }

    fn brief(&self, args: &Value) -> String {
        args["issue_key"].as_str().unwrap_or("").to_string()
    }

    fn summarize(&self, output: &str) -> String {
        serde_json::from_str::<Value>(output)
            .ok()
            .and_then(|v| v["summary"].as_str().map(|s| shorten(s, 70)))
            .unwrap_or_else(|| "read issue".to_string())
    }
}

/// Comments on an issue
#[derive(Debug, Clone)]
pub struct AddJiraComment {
    ctx: RunContext,
}

impl AddJiraComment {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[derive(Deserialize)]
struct CommentArgs {
    issue_key: String,
    comment: String,
}

#[async_trait]
impl Tool for AddJiraComment {
    fn name(&self) -> &'static str {
        "add_jira_comment"
    }

    fn description(&self) -> &'static str {
        "Add a comment to a Jira issue."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issue_key": {"type": "string", "description": "Issue key, e.g. ABC-123"},
                "comment": {"type": "string", "description": "Comment text"}
            },
            "required": ["issue_key", "comment"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: CommentArgs = parse_args(self.name(), args)?;
        let key = args.issue_key.trim();
        self.ctx.tracker().add_comment(key, &args.comment).await?;
        Ok(format!("Added comment to {}", key))
    }

    fn brief(&self, args: &Value) -> String {
        args["issue_key"].as_str().unwrap_or("").to_string()
    }
}

/// Moves an issue to another status
#[derive(Debug, Clone)]
pub struct TransitionJiraIssue {
    ctx: RunContext,
}

impl TransitionJiraIssue {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[derive(Deserialize)]
struct TransitionArgs {
    issue_key: String,
    status: String,
}

#[async_trait]
impl Tool for TransitionJiraIssue {
    fn name(&self) -> &'static str {
        "transition_jira_issue"
    }

    fn description(&self) -> &'static str {
        "Move a Jira issue to the status with the given name, e.g. \"In Progress\" \
         or \"In Review\". Unknown statuses list the available ones."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "issue_key": {"type": "string", "description": "Issue key, e.g. ABC-123"},
                "status": {"type": "string", "description": "Target status name"}
            },
            "required": ["issue_key", "status"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: TransitionArgs = parse_args(self.name(), args)?;
        let key = args.issue_key.trim();
        self.ctx.tracker().transition(key, args.status.trim()).await?;
        Ok(format!("Moved {} to {}", key, args.status.trim()))
    }

    fn brief(&self, args: &Value) -> String {
        format!(
            "{} → {}",
            args["issue_key"].as_str().unwrap_or(""),
            args["status"].as_str().unwrap_or("")
        )
    }
}
