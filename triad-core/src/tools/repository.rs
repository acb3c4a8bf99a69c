//! Repository tools

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::{lenient_u64, parse_args, shorten, RunContext, Tool};
use crate::repository::{BranchOutcome, EntryKind, Repository, ReviewEvent};
use crate::{Error, Result};

const SEPARATOR: &str = "============================================================";

fn pr_number_schema() -> Value {
    json!({"type": "integer", "description": "Pull request number"})
}

fn brief_pr(args: &Value) -> String {
    match &args["pr_number"] {
        Value::Number(n) => format!("#{}", n),
        Value::String(s) => format!("#{}", s.trim_start_matches('#')),
        _ => String::new(),
    }
}

fn count_summary(output: &str, noun: &str) -> String {
    let count = output.lines().filter(|l| !l.trim().is_empty()).count();
    format!("{} {}", count, noun)
}

/// Submit an approval, falling back to an APPROVED comment review
///
/// Only the self-approval rejection triggers the fallback; every other
/// failure is returned unchanged.
async fn approve_with_fallback(repo: &dyn Repository, number: u64, body: &str) -> Result<String> {
    match repo.add_review(number, body, ReviewEvent::Approve).await {
        Ok(()) => Ok(format!("Approved PR #{}", number)),
        Err(Error::SelfApprovalBlocked(reason)) => {
            warn!(pr = number, %reason, "Self-approval blocked; posting comment review instead");
            let comment = if body.trim_start().starts_with("APPROVED") {
                body.to_string()
            } else {
                format!("APPROVED\n\n{}", body)
            };
            repo.add_review(number, &comment, ReviewEvent::Comment)
                .await?;
            Ok(format!(
                "Self-approval is blocked on PR #{} ({}). Posted a COMMENT review starting \
                 with APPROVED instead; the approval fallback was used.",
                number, reason
            ))
        }
        Err(e) => Err(e),
    }
}

/// Lists a directory of the repository
#[derive(Debug, Clone)]
pub struct GetRepoTree {
    ctx: RunContext,
}

impl GetRepoTree {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[derive(Deserialize)]
struct TreeArgs {
    #[serde(default)]
    path: String,
    #[serde(default)]
    branch: Option<String>,
}

#[async_trait]
impl Tool for GetRepoTree {
    fn name(&self) -> &'static str {
        "get_repo_tree"
    }

    fn description(&self) -> &'static str {
        "List the files and directories at a path of the repository. Use an empty \
         path for the root. Reads the feature branch once one exists."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory path, empty for root"},
                "branch": {"type": "string", "description": "Ref to list, optional"}
            }
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: TreeArgs = parse_args(self.name(), args)?;
        let git_ref = self.ctx.resolve_ref(args.branch.as_deref());
        let path = args.path.trim().trim_matches('/');

        let mut entries = self.ctx.repo().list_tree(path, &git_ref).await?;
        if entries.is_empty() {
            return Ok("Empty directory".to_string());
        }
        entries.sort_by(|a, b| {
            (a.kind != EntryKind::Dir, &a.path).cmp(&(b.kind != EntryKind::Dir, &b.path))
        });

        Ok(entries
            .iter()
            .map(|e| match e.kind {
                EntryKind::Dir => format!("[DIR]  {}", e.path),
                EntryKind::File => format!("[FILE] {}", e.path),
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn brief(&self, args: &Value) -> String {
        match args["path"].as_str() {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => "/".to_string(),
        }
    }

    fn summarize(&self, output: &str) -> String {
        if output == "Empty directory" {
            output.to_string()
        } else {
            count_summary(output, "entries")
        }
    }
}

/// Reads one file
#[derive(Debug, Clone)]
pub struct GetFileContent {
    ctx: RunContext,
}

impl GetFileContent {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[derive(Deserialize)]
struct FileArgs {
    file_path: String,
    #[serde(default)]
    branch: Option<String>,
}

#[async_trait]
impl Tool for GetFileContent {
    fn name(&self) -> &'static str {
        "get_file_content"
    }

    fn description(&self) -> &'static str {
        "Read the full content of a file. Defaults to the feature branch, or the \
         base branch when no feature branch exists yet."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path of the file"},
                "branch": {"type": "string", "description": "Ref to read from, optional"}
            },
            "required": ["file_path"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: FileArgs = parse_args(self.name(), args)?;
        let git_ref = self.ctx.resolve_ref(args.branch.as_deref());
        self.ctx
            .repo()
            .read_file(args.file_path.trim().trim_start_matches('/'), &git_ref)
            .await
    }

    fn brief(&self, args: &Value) -> String {
        args["file_path"].as_str().unwrap_or("").to_string()
    }

    fn summarize(&self, output: &str) -> String {
        format!("{} lines", output.lines().count())
    }
}

/// Creates the feature branch
#[derive(Debug, Clone)]
pub struct CreateBranch {
    ctx: RunContext,
}

impl CreateBranch {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[derive(Deserialize)]
struct BranchArgs {
    branch_name: String,
}

#[async_trait]
impl Tool for CreateBranch {
    fn name(&self) -> &'static str {
        "create_branch"
    }

    fn description(&self) -> &'static str {
        "Create a feature branch from the base branch, e.g. feature/ABC-123-add-logging. \
         An existing branch is reused."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "branch_name": {"type": "string", "description": "Name of the new branch"}
            },
            "required": ["branch_name"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: BranchArgs = parse_args(self.name(), args)?;
        let name = args.branch_name.trim();
        let base = self.ctx.base_branch();

        let outcome = self.ctx.repo().create_branch(name, base).await?;
        self.ctx.branch().set(name);

        Ok(match outcome {
            BranchOutcome::Created => format!("Created branch: {} (from {})", name, base),
            BranchOutcome::Reused => format!("Branch '{}' already exists, will use it", name),
        })
    }

    fn brief(&self, args: &Value) -> String {
        args["branch_name"].as_str().unwrap_or("").to_string()
    }
}

/// Writes one file on a branch
#[derive(Debug, Clone)]
pub struct CreateOrUpdateFile {
    ctx: RunContext,
}

impl CreateOrUpdateFile {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[derive(Deserialize)]
struct WriteArgs {
    file_path: String,
    content: String,
    #[serde(default)]
    commit_message: String,
    #[serde(default)]
    branch: Option<String>,
}

#[async_trait]
impl Tool for CreateOrUpdateFile {
    fn name(&self) -> &'static str {
        "create_or_update_file"
    }

    fn description(&self) -> &'static str {
        "Create a file or replace an existing one with the COMPLETE new content. \
         Commits to the feature branch unless a branch is given."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "description": "Path of the file"},
                "content": {"type": "string", "description": "The complete file content"},
                "commit_message": {"type": "string", "description": "Defaults to 'Update <file_path>'"},
                "branch": {"type": "string", "description": "Branch to commit to, optional"}
            },
            "required": ["file_path", "content"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: WriteArgs = parse_args(self.name(), args)?;
        let path = args.file_path.trim().trim_start_matches('/');
        let branch = self.ctx.resolve_ref(args.branch.as_deref());
        let message = if args.commit_message.trim().is_empty() {
            format!("Update {}", path)
        } else {
            args.commit_message
        };

        let outcome = self
            .ctx
            .repo()
            .write_file(path, &args.content, &message, &branch)
            .await?;

        let verb = if outcome.created { "Created" } else { "Updated" };
        Ok(format!(
            "{} {} on {} (commit: {})",
            verb, path, branch, outcome.commit
        ))
    }

    fn brief(&self, args: &Value) -> String {
        args["file_path"].as_str().unwrap_or("").to_string()
    }
}

/// Opens the pull request
#[derive(Debug, Clone)]
pub struct CreatePullRequest {
    ctx: RunContext,
}

impl CreatePullRequest {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[derive(Deserialize)]
struct PullRequestArgs {
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    head_branch: Option<String>,
}

#[async_trait]
impl Tool for CreatePullRequest {
    fn name(&self) -> &'static str {
        super::CREATE_PULL_REQUEST_TOOL
    }

    fn description(&self) -> &'static str {
        "Open a pull request from the feature branch into the base branch. The title \
         should include the Jira issue key. Returns the PR number and URL."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "description": "PR title"},
                "body": {"type": "string", "description": "PR description in markdown"},
                "head_branch": {"type": "string", "description": "Source branch, defaults to the feature branch"}
            },
            "required": ["title", "body"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: PullRequestArgs = parse_args(self.name(), args)?;
        let head = self.ctx.resolve_ref(args.head_branch.as_deref());
        let base = self.ctx.base_branch();
        if head == base {
            return Err(Error::Repository(format!(
                "head branch is the base branch '{}'; create a feature branch first",
                base
            )));
        }

        let pr = self
            .ctx
            .repo()
            .create_pull_request(&args.title, &args.body, &head, base)
            .await?;
        self.ctx.branch().set(&pr.head);

        Ok(format!("Created PR #{}: {}\nURL: {}", pr.number, pr.title, pr.url))
    }

    fn brief(&self, args: &Value) -> String {
        shorten(args["title"].as_str().unwrap_or(""), 60)
    }
}

#[derive(Deserialize)]
struct PrArgs {
    #[serde(deserialize_with = "lenient_u64")]
    pr_number: u64,
}

/// Shows the full diff of a pull request
#[derive(Debug, Clone)]
pub struct GetPrDiff {
    ctx: RunContext,
}

impl GetPrDiff {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[async_trait]
impl Tool for GetPrDiff {
    fn name(&self) -> &'static str {
        "get_pr_diff"
    }

    fn description(&self) -> &'static str {
        "Get the full diff of a pull request: every changed file with its status, \
         addition and deletion counts and patch."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"pr_number": pr_number_schema()},
            "required": ["pr_number"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: PrArgs = parse_args(self.name(), args)?;
        let files = self.ctx.repo().changed_files(args.pr_number).await?;
        if files.is_empty() {
            return Ok("No file changes in this PR".to_string());
        }

        let mut parts = Vec::new();
        for f in &files {
            parts.push(SEPARATOR.to_string());
            parts.push(format!(
                "File: {} | Status: {} | +{} -{}",
                f.filename, f.status, f.additions, f.deletions
            ));
            parts.push(SEPARATOR.to_string());
            parts.push(
                f.patch
                    .clone()
                    .unwrap_or_else(|| "(binary file or no patch available)".to_string()),
            );
            parts.push(String::new());
        }
        Ok(parts.join("\n"))
    }

    fn brief(&self, args: &Value) -> String {
        brief_pr(args)
    }

    fn summarize(&self, output: &str) -> String {
        let files = output.lines().filter(|l| l.starts_with("File: ")).count();
        format!("{} files in diff", files)
    }
}

/// Lists files changed by a pull request
#[derive(Debug, Clone)]
pub struct GetPrFiles {
    ctx: RunContext,
}

impl GetPrFiles {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[async_trait]
impl Tool for GetPrFiles {
    fn name(&self) -> &'static str {
        "get_pr_files"
    }

    fn description(&self) -> &'static str {
        "List the files changed by a pull request with their status and change counts."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"pr_number": pr_number_schema()},
            "required": ["pr_number"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: PrArgs = parse_args(self.name(), args)?;
        let files = self.ctx.repo().changed_files(args.pr_number).await?;
        if files.is_empty() {
            return Ok("No files changed".to_string());
        }
        Ok(files
            .iter()
            .map(|f| format!("{}: {} (+{} -{})", f.status, f.filename, f.additions, f.deletions))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn brief(&self, args: &Value) -> String {
        brief_pr(args)
    }

    fn summarize(&self, output: &str) -> String {
        count_summary(output, "files")
    }
}

/// Reads submitted reviews
#[derive(Debug, Clone)]
pub struct GetPrReviews {
    ctx: RunContext,
}

impl GetPrReviews {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[async_trait]
impl Tool for GetPrReviews {
    fn name(&self) -> &'static str {
        "get_pr_reviews"
    }

    fn description(&self) -> &'static str {
        "Get all reviews submitted on a pull request with reviewer, state and body."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"pr_number": pr_number_schema()},
            "required": ["pr_number"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: PrArgs = parse_args(self.name(), args)?;
        let reviews = self.ctx.repo().list_reviews(args.pr_number).await?;
        if reviews.is_empty() {
            return Ok("No reviews on this PR yet.".to_string());
        }

        let mut lines = Vec::new();
        for r in &reviews {
            lines.push(format!("Reviewer: {}", r.reviewer));
            lines.push(format!("State: {}", r.state));
            lines.push(format!("Body: {}", r.body));
            lines.push("---".to_string());
        }
        Ok(lines.join("\n"))
    }

    fn brief(&self, args: &Value) -> String {
        brief_pr(args)
    }

    fn summarize(&self, output: &str) -> String {
        let count = output.lines().filter(|l| l.starts_with("Reviewer: ")).count();
        format!("{} reviews", count)
    }
}

/// Reads inline review comments
#[derive(Debug, Clone)]
pub struct GetPrReviewComments {
    ctx: RunContext,
}

impl GetPrReviewComments {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

#[async_trait]
impl Tool for GetPrReviewComments {
    fn name(&self) -> &'static str {
        "get_pr_review_comments"
    }

    fn description(&self) -> &'static str {
        "Get inline review comments on a pull request with file, line, author and body."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"pr_number": pr_number_schema()},
            "required": ["pr_number"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: PrArgs = parse_args(self.name(), args)?;
        let comments = self.ctx.repo().list_review_comments(args.pr_number).await?;
        if comments.is_empty() {
            return Ok("No inline review comments on this PR.".to_string());
        }

        let mut lines = Vec::new();
        for c in &comments {
            lines.push(format!("File: {}", c.path));
            lines.push(format!(
                "Line: {}",
                c.line.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string())
            ));
            lines.push(format!("Author: {}", c.author));
            lines.push(format!("Body: {}", c.body));
            lines.push("---".to_string());
        }
        Ok(lines.join("\n"))
    }

    fn brief(&self, args: &Value) -> String {
        brief_pr(args)
    }

    fn summarize(&self, output: &str) -> String {
        let count = output.lines().filter(|l| l.starts_with("File: ")).count();
        format!("{} comments", count)
    }
}

/// Submits a review
#[derive(Debug, Clone)]
pub struct AddPrReview {
    ctx: RunContext,
}

impl AddPrReview {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

fn default_event() -> String {
    ReviewEvent::Comment.as_str().to_string()
}

#[derive(Deserialize)]
struct ReviewArgs {
    #[serde(deserialize_with = "lenient_u64")]
    pr_number: u64,
    body: String,
    #[serde(default = "default_event")]
    event: String,
}

#[async_trait]
impl Tool for AddPrReview {
    fn name(&self) -> &'static str {
        "add_pr_review"
    }

    fn description(&self) -> &'static str {
        "Submit a review on a pull request. event is COMMENT, REQUEST_CHANGES or APPROVE. \
         A blocked self-approval is posted as a COMMENT review starting with APPROVED."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pr_number": pr_number_schema(),
                "body": {"type": "string", "description": "Review body with detailed feedback"},
                "event": {
                    "type": "string",
                    "enum": ["COMMENT", "REQUEST_CHANGES", "APPROVE"],
                    "description": "Defaults to COMMENT"
                }
            },
            "required": ["pr_number", "body"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: ReviewArgs = parse_args(self.name(), args)?;
        let event: ReviewEvent = args.event.parse().map_err(|reason| Error::InvalidArguments {
            tool: self.name().to_string(),
            reason,
        })?;

        if event == ReviewEvent::Approve {
            return approve_with_fallback(self.ctx.repo(), args.pr_number, &args.body).await;
        }

        self.ctx
            .repo()
            .add_review(args.pr_number, &args.body, event)
            .await?;
        Ok(format!("Added {} review to PR #{}", event, args.pr_number))
    }

    fn brief(&self, args: &Value) -> String {
        format!(
            "{} {}",
            brief_pr(args),
            args["event"].as_str().unwrap_or("COMMENT")
        )
    }
}

/// Approves a pull request
#[derive(Debug, Clone)]
pub struct ApprovePullRequest {
    ctx: RunContext,
}

impl ApprovePullRequest {
    pub fn new(ctx: &RunContext) -> Self {
        Self { ctx: ctx.clone() }
    }
}

fn default_approval_body() -> String {
    "Approved by Architecture Review".to_string()
}

#[derive(Deserialize)]
struct ApproveArgs {
    #[serde(deserialize_with = "lenient_u64")]
    pr_number: u64,
    #[serde(default = "default_approval_body")]
    body: String,
}

#[async_trait]
impl Tool for ApprovePullRequest {
    fn name(&self) -> &'static str {
        "approve_pull_request"
    }

    fn description(&self) -> &'static str {
        "Approve a pull request after a successful review. If the code host blocks \
         self-approval, a COMMENT review starting with APPROVED is posted instead."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pr_number": pr_number_schema(),
                "body": {"type": "string", "description": "Approval comment"}
            },
            "required": ["pr_number"]
        })
    }

    async fn call(&self, args: Value) -> Result<String> {
        let args: ApproveArgs = parse_args(self.name(), args)?;
        approve_with_fallback(self.ctx.repo(), args.pr_number, &args.body).await
    }

    fn brief(&self, args: &Value) -> String {
        brief_pr(args)
    }
}
