//! [`Repository`] implementation for GitHub

use async_trait::async_trait;

use triad_core::repository::{
    BranchOutcome, ChangedFile, PullRequestInfo, ReviewComment, ReviewEvent, ReviewRecord,
    TreeEntry, WriteOutcome,
};
use triad_core::Repository;

use crate::GitHubClient;

#[async_trait]
impl Repository for GitHubClient {
    fn full_name(&self) -> &str {
        GitHubClient::full_name(self)
    }

    async fn list_tree(&self, path: &str, git_ref: &str) -> triad_core::Result<Vec<TreeEntry>> {
        Ok(self.list_directory(path, git_ref).await?)
    }

    async fn read_file(&self, path: &str, git_ref: &str) -> triad_core::Result<String> {
        Ok(self.file_content(path, git_ref).await?)
    }

    async fn create_branch(&self, name: &str, base: &str) -> triad_core::Result<BranchOutcome> {
        Ok(self.branch_from(name, base).await?)
    }

    async fn write_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> triad_core::Result<WriteOutcome> {
        Ok(self.put_file(path, content, message, branch).await?)
    }

    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> triad_core::Result<PullRequestInfo> {
        Ok(self.open_pull_request(title, body, head, base).await?)
    }

    async fn pull_request(&self, number: u64) -> triad_core::Result<PullRequestInfo> {
        Ok(self.get_pull_request(number).await?)
    }

    async fn changed_files(&self, number: u64) -> triad_core::Result<Vec<ChangedFile>> {
        Ok(self.pull_request_files(number).await?)
    }

    async fn list_reviews(&self, number: u64) -> triad_core::Result<Vec<ReviewRecord>> {
        Ok(self.get_pr_reviews(number).await?)
    }

    async fn list_review_comments(&self, number: u64) -> triad_core::Result<Vec<ReviewComment>> {
        Ok(self.get_pr_review_comments(number).await?)
    }

    async fn add_review(
        &self,
        number: u64,
        body: &str,
        event: ReviewEvent,
    ) -> triad_core::Result<()> {
        Ok(self.submit_review(number, body, event).await?)
    }

    fn pull_request_url(&self, number: u64) -> String {
        self.pull_request_link(number)
    }
}
