//! Pull request reviews

use serde::Serialize;
use tracing::{debug, info};

use triad_core::repository::{ReviewComment, ReviewEvent, ReviewRecord};

use crate::{Error, GitHubClient, Result};

#[derive(Debug, Serialize)]
struct NewReview<'a> {
    body: &'a str,
    event: &'static str,
}

/// GitHub's wire label for a review state, e.g. `ChangesRequested` -> `CHANGES_REQUESTED`
pub(crate) fn state_label(debug_name: &str) -> String {
    let mut label = String::with_capacity(debug_name.len() + 4);
    for (i, ch) in debug_name.chars().enumerate() {
        if ch.is_uppercase() && i > 0 {
            label.push('_');
        }
        label.push(ch.to_ascii_uppercase());
    }
    label
}

impl GitHubClient {
    /// Reviews submitted on a pull request
    pub async fn get_pr_reviews(&self, number: u64) -> Result<Vec<ReviewRecord>> {
        let reviews = self
            .client()
            .pulls(self.owner(), self.repo())
            .list_reviews(number)
            .send()
            .await
            .map_err(|e| Error::from_api(e, format!("Pull request #{}", number)))?;

        Ok(reviews
            .items
            .into_iter()
            .map(|r| ReviewRecord {
                reviewer: r.user.map(|u| u.login).unwrap_or_default(),
                state: r
                    .state
                    .map(|s| state_label(&format!("{:?}", s)))
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
                body: r.body.unwrap_or_default(),
                submitted_at: r.submitted_at,
            })
            .collect())
    }

    /// Inline review comments on a pull request
    pub async fn get_pr_review_comments(&self, number: u64) -> Result<Vec<ReviewComment>> {
        let comments = self
            .client()
            .pulls(self.owner(), self.repo())
            .list_comments(Some(number))
            .send()
            .await
            .map_err(|e| Error::from_api(e, format!("Pull request #{}", number)))?;

        Ok(comments
            .items
            .into_iter()
            .map(|c| ReviewComment {
                path: c.path,
                line: c.line,
                author: c.user.map(|u| u.login).unwrap_or_default(),
                body: c.body,
            })
            .collect())
    }

    /// Submit a review
    pub async fn submit_review(&self, number: u64, body: &str, event: ReviewEvent) -> Result<()> {
        debug!(number, event = %event, "Submitting review");
        let review = NewReview {
            body,
            event: event.as_str(),
        };
        let _: serde_json::Value = self
            .client()
            .post(
                self.route(&format!("pulls/{}/reviews", number)),
                Some(&review),
            )
            .await
            .map_err(|e| match Error::from_api(e, format!("Pull request #{}", number)) {
                Error::NotFound(_) => Error::PrNotFound(number),
                other => other,
            })?;

        info!(number, event = %event, "Submitted review");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_label() {
        assert_eq!(state_label("Approved"), "APPROVED");
        assert_eq!(state_label("ChangesRequested"), "CHANGES_REQUESTED");
        assert_eq!(state_label("Commented"), "COMMENTED");
    }

    #[test]
    fn test_review_body_serialization() {
        let review = NewReview {
            body: "Looks good",
            event: ReviewEvent::RequestChanges.as_str(),
        };
        let value = serde_json::to_value(&review).unwrap();
        assert_eq!(value["event"], "REQUEST_CHANGES");
        assert_eq!(value["body"], "Looks good");
    }
}
