//! Issue tracker contract
//!
//! The tracker is an external collaborator. Implementations translate
//! these calls into API requests; the pipeline only sees this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Fields of an issue to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub summary: String,
    pub description: String,
    /// Appended to the description when present
    pub acceptance_criteria: Option<String>,
    /// Issue type name, e.g. Task, Story or Bug
    pub issue_type: String,
}

impl NewIssue {
    /// Description with acceptance criteria appended
    pub fn full_description(&self) -> String {
        match self.acceptance_criteria.as_deref().map(str::trim) {
            Some(criteria) if !criteria.is_empty() => format!(
                "{}\n\n*Acceptance Criteria:*\n{}",
                self.description, criteria
            ),
            _ => self.description.clone(),
        }
    }
}

/// Result of creating an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    pub key: String,
    pub url: String,
    /// Display name of the assignee, if assignment succeeded
    pub assignee: Option<String>,
}

/// Issue details as read back from the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetails {
    pub key: String,
    pub summary: String,
    pub description: String,
    pub status: String,
    pub issue_type: String,
    pub assignee: String,
}

/// Operations the agents may perform against the tracker
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Create an issue in the configured project
    async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedIssue>;

    /// Read an issue
    async fn get_issue(&self, key: &str) -> Result<IssueDetails>;

    /// Comment on an issue
    async fn add_comment(&self, key: &str, text: &str) -> Result<()>;

    /// Move an issue to the status with the given name
    async fn transition(&self, key: &str, status: &str) -> Result<()>;

    /// Human-facing link to an issue
    fn issue_url(&self, key: &str) -> String;

    /// Project key new issues are filed under, if known
    fn project_key(&self) -> Option<&str> {
        None
    }
}
