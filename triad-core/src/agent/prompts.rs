//! Agent prompt templates
//!
//! System prompts and task texts are embedded templates with `{{VARIABLE}}`
//! placeholders. Task texts only ever receive scalar artifacts (an issue
//! key, a pull request number, a branch name), never another phase's
//! transcript.

use std::collections::HashMap;

use crate::agent::AgentRole;

const PRODUCT_MANAGER_PROMPT: &str = include_str!("prompts/product_manager.md");
const DEVELOPER_PROMPT: &str = include_str!("prompts/developer.md");
const DEVELOPER_FIX_PROMPT: &str = include_str!("prompts/developer_fix.md");
const ARCHITECT_PROMPT: &str = include_str!("prompts/architect.md");

const DEVELOPER_TASK: &str = include_str!("prompts/task_developer.md");
const ARCHITECT_TASK: &str = include_str!("prompts/task_architect.md");
const DEVELOPER_FIX_TASK: &str = include_str!("prompts/task_developer_fix.md");
const DEVELOPER_FIX_COMMENT: &str = include_str!("prompts/task_developer_fix_comment.md");

/// Get the raw system prompt template for a role
pub fn get_template(role: AgentRole) -> &'static str {
    match role {
        AgentRole::ProductManager => PRODUCT_MANAGER_PROMPT,
        AgentRole::Developer => DEVELOPER_PROMPT,
        AgentRole::DeveloperFix => DEVELOPER_FIX_PROMPT,
        AgentRole::Architect => ARCHITECT_PROMPT,
    }
}

/// Context for rendering a prompt template
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    variables: HashMap<String, String>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Set the tracker project key
    pub fn with_project(self, project: impl Into<String>) -> Self {
        self.with("PROJECT", project)
    }

    /// Set the repository identifier
    pub fn with_repo(self, repo: impl Into<String>) -> Self {
        self.with("REPO", repo)
    }

    /// Set the base branch
    pub fn with_base_branch(self, branch: impl Into<String>) -> Self {
        self.with("BASE_BRANCH", branch)
    }
}

/// Render the system prompt of a role
pub fn system_prompt(role: AgentRole, context: &PromptContext) -> String {
    render_template(get_template(role), context)
}

/// Task text for the Developer phase
pub fn developer_task(issue_key: &str) -> String {
    render_template(
        DEVELOPER_TASK,
        &PromptContext::new().with("ISSUE_KEY", issue_key),
    )
}

/// Task text for one Architect review
pub fn architect_task(pr_number: u64) -> String {
    render_template(
        ARCHITECT_TASK,
        &PromptContext::new().with("PR_NUMBER", pr_number.to_string()),
    )
}

/// Task text for one Developer-fix pass
///
/// The issue key is only named when the run knows it.
pub fn developer_fix_task(pr_number: u64, branch: &str, issue_key: Option<&str>) -> String {
    let mut task = render_template(
        DEVELOPER_FIX_TASK,
        &PromptContext::new()
            .with("PR_NUMBER", pr_number.to_string())
            .with("BRANCH", branch),
    );
    if let Some(key) = issue_key.map(str::trim).filter(|k| !k.is_empty()) {
        task.push('\n');
        task.push_str(&render_template(
            DEVELOPER_FIX_COMMENT,
            &PromptContext::new().with("ISSUE_KEY", key),
        ));
    }
    task
}

/// Render a template string with variable substitution
///
/// Unset `{{UPPERCASE}}` placeholders become "(not specified)".
fn render_template(template: &str, context: &PromptContext) -> String {
    let mut result = template.trim_end().to_string();

    for (key, value) in &context.variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    let mut search_from = 0;
    while let Some(offset) = result[search_from..].find("{{") {
        let start = search_from + offset;
        let Some(len) = result[start + 2..].find("}}") else {
            break;
        };
        let inside = &result[start + 2..start + 2 + len];
        if !inside.is_empty() && inside.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
            result.replace_range(start..start + len + 4, "(not specified)");
            search_from = start;
        } else {
            search_from = start + 2;
        }
    }

    result
}
