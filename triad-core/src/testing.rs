//! Test doubles for the model, the tracker and the repository

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::agent::{ChatModel, ChatRequest, ChatResponse, ModelProvider, ToolCall};
use crate::repository::{
    BranchOutcome, ChangedFile, EntryKind, PullRequestInfo, Repository, ReviewComment,
    ReviewEvent, ReviewRecord, TreeEntry, WriteOutcome,
};
use crate::tracker::{CreatedIssue, IssueDetails, NewIssue, Tracker};
use crate::{Error, Result};

/// Build a tool call for scripted responses
pub(crate) fn tool_call(name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        id: format!("call_{}", name),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

/// Model provider that replays one script per opened connection
pub(crate) struct ScriptedProvider {
    scripts: Mutex<VecDeque<Vec<ChatResponse>>>,
    opened: Mutex<Vec<String>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedProvider {
    pub(crate) fn new(scripts: Vec<Vec<ChatResponse>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            opened: Mutex::new(Vec::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Models opened, in order
    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    /// Every request sent, across all connections
    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Task text of each invocation, in order
    pub(crate) fn tasks(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter(|r| r.messages.len() == 2)
            .map(|r| r.messages[1].content.clone())
            .collect()
    }

    /// System prompt of each invocation, in order
    pub(crate) fn system_prompts(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter(|r| r.messages.len() == 2)
            .map(|r| r.messages[0].content.clone())
            .collect()
    }

    /// Scripts that were never opened
    pub(crate) fn remaining(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }
}

impl ModelProvider for ScriptedProvider {
    fn open(&self, model: &str) -> Result<Box<dyn ChatModel>> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Model("no script left".to_string()))?;
        self.opened.lock().unwrap().push(model.to_string());
        Ok(Box::new(ScriptedChat {
            model: model.to_string(),
            responses: Mutex::new(script.into()),
            requests: self.requests.clone(),
        }))
    }
}

struct ScriptedChat {
    model: String,
    responses: Mutex<VecDeque<ChatResponse>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Model("script exhausted".to_string()))
    }
}

#[derive(Default)]
struct TrackerState {
    next_number: u64,
    created: Vec<NewIssue>,
    comments: Vec<(String, String)>,
    transitions: Vec<(String, String)>,
}

/// In-memory tracker for project ABC
pub(crate) struct FakeTracker {
    state: Mutex<TrackerState>,
}

impl FakeTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                next_number: 1,
                ..Default::default()
            }),
        }
    }

    /// Number the next created issue gets
    pub(crate) fn with_next_number(self, n: u64) -> Self {
        self.state.lock().unwrap().next_number = n;
        self
    }

    pub(crate) fn created(&self) -> Vec<NewIssue> {
        self.state.lock().unwrap().created.clone()
    }

    pub(crate) fn comments(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().comments.clone()
    }

    pub(crate) fn transitions(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().transitions.clone()
    }
}

#[async_trait]
impl Tracker for FakeTracker {
    async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue> {
        let mut state = self.state.lock().unwrap();
        let key = format!("ABC-{}", state.next_number);
        state.next_number += 1;
        state.created.push(issue.clone());
        Ok(CreatedIssue {
            url: self.issue_url(&key),
            key,
            assignee: Some("Triad Bot".to_string()),
        })
    }

    async fn get_issue(&self, key: &str) -> Result<IssueDetails> {
        Ok(IssueDetails {
            key: key.to_string(),
            summary: format!("Issue {}", key),
            description: String::new(),
            status: "To Do".to_string(),
            issue_type: "Task".to_string(),
            assignee: "Unassigned".to_string(),
        })
    }

    async fn add_comment(&self, key: &str, text: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .comments
            .push((key.to_string(), text.to_string()));
        Ok(())
    }

    async fn transition(&self, key: &str, status: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .transitions
            .push((key.to_string(), status.to_string()));
        Ok(())
    }

    fn issue_url(&self, key: &str) -> String {
        format!("https://jira.example/browse/{}", key)
    }

    fn project_key(&self) -> Option<&str> {
        Some("ABC")
    }
}

struct RepoState {
    tree: Vec<TreeEntry>,
    files: HashMap<String, String>,
    existing_branches: HashSet<String>,
    branches: Vec<String>,
    writes: Vec<(String, String, String, String)>,
    next_pr: u64,
    pulls: Vec<PullRequestInfo>,
    changed: Vec<ChangedFile>,
    reviews: Vec<ReviewRecord>,
    submitted: Vec<(u64, String, ReviewEvent)>,
    review_errors: VecDeque<Error>,
    block_self_approval: bool,
    fail_lookup: bool,
    commits: u32,
}

/// In-memory repository `acme/widgets`
pub(crate) struct FakeRepository {
    state: Mutex<RepoState>,
}

impl FakeRepository {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RepoState {
                tree: Vec::new(),
                files: HashMap::new(),
                existing_branches: HashSet::new(),
                branches: Vec::new(),
                writes: Vec::new(),
                next_pr: 1,
                pulls: Vec::new(),
                changed: Vec::new(),
                reviews: Vec::new(),
                submitted: Vec::new(),
                review_errors: VecDeque::new(),
                block_self_approval: false,
                fail_lookup: false,
                commits: 0,
            }),
        }
    }

    pub(crate) fn with_tree(self, tree: Vec<TreeEntry>) -> Self {
        self.state.lock().unwrap().tree = tree;
        self
    }

    pub(crate) fn with_file(self, path: &str, content: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), content.to_string());
        self
    }

    pub(crate) fn with_existing_branch(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .existing_branches
            .insert(name.to_string());
        self
    }

    /// Number the next opened pull request gets
    pub(crate) fn with_next_pr(self, number: u64) -> Self {
        self.state.lock().unwrap().next_pr = number;
        self
    }

    pub(crate) fn with_changed_files(self, files: Vec<ChangedFile>) -> Self {
        self.state.lock().unwrap().changed = files;
        self
    }

    pub(crate) fn with_reviews(self, reviews: Vec<ReviewRecord>) -> Self {
        self.state.lock().unwrap().reviews = reviews;
        self
    }

    /// Reject every APPROVE review as a self-approval
    pub(crate) fn blocking_self_approval(self) -> Self {
        self.state.lock().unwrap().block_self_approval = true;
        self
    }

    /// Fail the next review submission with `err`
    pub(crate) fn failing_reviews(self, err: Error) -> Self {
        self.state.lock().unwrap().review_errors.push_back(err);
        self
    }

    /// Fail pull request lookups
    pub(crate) fn failing_lookup(self) -> Self {
        self.state.lock().unwrap().fail_lookup = true;
        self
    }

    pub(crate) fn branches(&self) -> Vec<String> {
        self.state.lock().unwrap().branches.clone()
    }

    /// (path, content, message, branch) of every write
    pub(crate) fn writes(&self) -> Vec<(String, String, String, String)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub(crate) fn reviews_submitted(&self) -> Vec<(u64, String, ReviewEvent)> {
        self.state.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl Repository for FakeRepository {
    fn full_name(&self) -> &str {
        "acme/widgets"
    }

    async fn list_tree(&self, _path: &str, _git_ref: &str) -> Result<Vec<TreeEntry>> {
        Ok(self.state.lock().unwrap().tree.clone())
    }

    async fn read_file(&self, path: &str, _git_ref: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        if let Some(content) = state.files.get(path) {
            return Ok(content.clone());
        }
        if state
            .tree
            .iter()
            .any(|e| e.path == path && e.kind == EntryKind::Dir)
        {
            return Err(Error::Repository(format!("{} is a directory, not a file", path)));
        }
        Err(Error::NotFound(path.to_string()))
    }

    async fn create_branch(&self, name: &str, _base: &str) -> Result<BranchOutcome> {
        let mut state = self.state.lock().unwrap();
        state.branches.push(name.to_string());
        if state.existing_branches.insert(name.to_string()) {
            Ok(BranchOutcome::Created)
        } else {
            Ok(BranchOutcome::Reused)
        }
    }

    async fn write_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> Result<WriteOutcome> {
        let mut state = self.state.lock().unwrap();
        let created = state
            .files
            .insert(path.to_string(), content.to_string())
            .is_none();
        state.commits += 1;
        state.writes.push((
            path.to_string(),
            content.to_string(),
            message.to_string(),
            branch.to_string(),
        ));
        Ok(WriteOutcome {
            created,
            commit: format!("{:08x}", 0xc0ff_ee00u32 + state.commits),
        })
    }

    async fn create_pull_request(
        &self,
        title: &str,
        _body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestInfo> {
        let mut state = self.state.lock().unwrap();
        let number = state.next_pr;
        state.next_pr += 1;
        let pr = PullRequestInfo {
            number,
            title: title.to_string(),
            url: self.pull_request_url(number),
            head: head.to_string(),
            base: base.to_string(),
        };
        state.pulls.push(pr.clone());
        Ok(pr)
    }

    async fn pull_request(&self, number: u64) -> Result<PullRequestInfo> {
        let state = self.state.lock().unwrap();
        if state.fail_lookup {
            return Err(Error::NotFound(format!("pull request #{}", number)));
        }
        Ok(state
            .pulls
            .iter()
            .find(|p| p.number == number)
            .cloned()
            .unwrap_or_else(|| PullRequestInfo {
                number,
                title: format!("PR {}", number),
                url: self.pull_request_url(number),
                head: format!("feature/pr-{}", number),
                base: "dev".to_string(),
            }))
    }

    async fn changed_files(&self, _number: u64) -> Result<Vec<ChangedFile>> {
        Ok(self.state.lock().unwrap().changed.clone())
    }

    async fn list_reviews(&self, _number: u64) -> Result<Vec<ReviewRecord>> {
        Ok(self.state.lock().unwrap().reviews.clone())
    }

    async fn list_review_comments(&self, _number: u64) -> Result<Vec<ReviewComment>> {
        Ok(Vec::new())
    }

    async fn add_review(&self, number: u64, body: &str, event: ReviewEvent) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.submitted.push((number, body.to_string(), event));
        if let Some(err) = state.review_errors.pop_front() {
            return Err(err);
        }
        if state.block_self_approval && event == ReviewEvent::Approve {
            return Err(Error::SelfApprovalBlocked(
                "Can not approve your own pull request".to_string(),
            ));
        }
        Ok(())
    }

    fn pull_request_url(&self, number: u64) -> String {
        format!("https://github.com/acme/widgets/pull/{}", number)
    }
}
