//! Code host contract
//!
//! The repository is an external collaborator. There is deliberately no
//! merge operation here: pull requests are only ever merged by a human.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Result;

/// Kind of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub kind: EntryKind,
}

/// Whether a branch was made or already existed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOutcome {
    Created,
    Reused,
}

/// Result of writing a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// False when an existing file was updated
    pub created: bool,
    /// Short commit id
    pub commit: String,
}

/// An opened or looked-up pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub head: String,
    pub base: String,
}

/// One file changed by a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    /// Unified patch, absent for binary or oversized files
    pub patch: Option<String>,
}

/// A submitted review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub reviewer: String,
    /// APPROVED, CHANGES_REQUESTED, COMMENTED, ...
    pub state: String,
    pub body: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// An inline review comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub path: String,
    pub line: Option<u64>,
    pub author: String,
    pub body: String,
}

/// Review submission event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewEvent {
    Comment,
    RequestChanges,
    Approve,
}

impl ReviewEvent {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewEvent::Comment => "COMMENT",
            ReviewEvent::RequestChanges => "REQUEST_CHANGES",
            ReviewEvent::Approve => "APPROVE",
        }
    }
}

impl fmt::Display for ReviewEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReviewEvent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "COMMENT" => Ok(ReviewEvent::Comment),
            "REQUEST_CHANGES" | "CHANGES_REQUESTED" => Ok(ReviewEvent::RequestChanges),
            "APPROVE" | "APPROVED" => Ok(ReviewEvent::Approve),
            other => Err(format!(
                "Unknown review event: {}. Expected COMMENT, REQUEST_CHANGES or APPROVE",
                other
            )),
        }
    }
}

/// Operations the agents may perform against the code host
#[async_trait]
pub trait Repository: Send + Sync {
    /// Repository identifier, e.g. `owner/name`
    fn full_name(&self) -> &str;

    /// List a directory at a ref
    async fn list_tree(&self, path: &str, git_ref: &str) -> Result<Vec<TreeEntry>>;

    /// Read a file at a ref; directories are an error
    async fn read_file(&self, path: &str, git_ref: &str) -> Result<String>;

    /// Create a branch from `base`; an existing branch is reused
    async fn create_branch(&self, name: &str, base: &str) -> Result<BranchOutcome>;

    /// Create or update a file on a branch
    ///
    /// Updates when the file already has a revision stamp on the branch.
    /// A stale stamp surfaces as [`crate::Error::Conflict`].
    async fn write_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> Result<WriteOutcome>;

    /// Open a pull request
    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestInfo>;

    /// Look up a pull request
    async fn pull_request(&self, number: u64) -> Result<PullRequestInfo>;

    /// Files changed by a pull request, with patches
    async fn changed_files(&self, number: u64) -> Result<Vec<ChangedFile>>;

    /// Submitted reviews
    async fn list_reviews(&self, number: u64) -> Result<Vec<ReviewRecord>>;

    /// Inline review comments
    async fn list_review_comments(&self, number: u64) -> Result<Vec<ReviewComment>>;

    /// Submit a review
    ///
    /// Approving one's own pull request surfaces as
    /// [`crate::Error::SelfApprovalBlocked`].
    async fn add_review(&self, number: u64, body: &str, event: ReviewEvent) -> Result<()>;

    /// Human-facing link to a pull request
    fn pull_request_url(&self, number: u64) -> String;
}
