//! [`Tracker`] implementation for Jira

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};

use triad_core::tracker::{CreatedIssue, IssueDetails, NewIssue};
use triad_core::Tracker;

use crate::issues::{create_fields, issue_details, pick_transition, CreatedKey, Transitions};
use crate::JiraClient;

#[async_trait]
impl Tracker for JiraClient {
    async fn create_issue(&self, issue: &NewIssue) -> triad_core::Result<CreatedIssue> {
        // Assignment is best effort; the issue is still filed without it
        let me = match self.myself().await {
            Ok(me) => Some(me),
            Err(e) => {
                warn!(error = %e, "Could not look up Jira account for assignment");
                None
            }
        };
        let account_id = me.as_ref().and_then(|m| m.account_id.as_deref());

        let body = create_fields(issue, self.project(), account_id);
        let created: CreatedKey = self.send(Method::POST, "issue", Some(&body), None).await?;

        let assignee = account_id.map(|_| {
            me.as_ref()
                .and_then(|m| m.display_name.clone())
                .unwrap_or_else(|| self.user().to_string())
        });
        info!(key = %created.key, "Created Jira issue");

        Ok(CreatedIssue {
            url: self.browse_url(&created.key),
            key: created.key,
            assignee,
        })
    }

    async fn get_issue(&self, key: &str) -> triad_core::Result<IssueDetails> {
        let issue: Value = self
            .send(Method::GET, &format!("issue/{}", key), None, Some(key))
            .await?;
        Ok(issue_details(&issue)?)
    }

    async fn add_comment(&self, key: &str, text: &str) -> triad_core::Result<()> {
        let body = json!({ "body": text });
        let _: Value = self
            .send(
                Method::POST,
                &format!("issue/{}/comment", key),
                Some(&body),
                Some(key),
            )
            .await?;
        info!(key = %key, "Added Jira comment");
        Ok(())
    }

    async fn transition(&self, key: &str, status: &str) -> triad_core::Result<()> {
        let path = format!("issue/{}/transitions", key);
        let available: Transitions = self.send(Method::GET, &path, None, Some(key)).await?;
        let transition = pick_transition(&available.transitions, key, status)?;

        let body = json!({ "transition": { "id": transition.id } });
        let _: Value = self
            .send(Method::POST, &path, Some(&body), Some(key))
            .await?;
        info!(key = %key, status = %status, "Transitioned Jira issue");
        Ok(())
    }

    fn issue_url(&self, key: &str) -> String {
        self.browse_url(key)
    }

    fn project_key(&self) -> Option<&str> {
        Some(self.project())
    }
}
