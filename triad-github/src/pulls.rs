//! Pull request operations

use serde::Deserialize;
use tracing::{debug, info};

use triad_core::repository::{ChangedFile, PullRequestInfo};

use crate::{Error, GitHubClient, Result};

#[derive(Debug, Deserialize)]
struct FileEntry {
    filename: String,
    status: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    patch: Option<String>,
}

impl From<FileEntry> for ChangedFile {
    fn from(f: FileEntry) -> Self {
        ChangedFile {
            filename: f.filename,
            status: f.status,
            additions: f.additions,
            deletions: f.deletions,
            patch: f.patch,
        }
    }
}

impl GitHubClient {
    /// Link to a pull request on github.com
    pub fn pull_request_link(&self, number: u64) -> String {
        format!(
            "https://github.com/{}/{}/pull/{}",
            self.owner(),
            self.repo(),
            number
        )
    }

    fn pull_info(&self, pr: octocrab::models::pulls::PullRequest) -> PullRequestInfo {
        PullRequestInfo {
            url: pr
                .html_url
                .map(|u| u.to_string())
                .unwrap_or_else(|| self.pull_request_link(pr.number)),
            number: pr.number,
            title: pr.title.unwrap_or_default(),
            head: pr.head.ref_field,
            base: pr.base.ref_field,
        }
    }

    /// Open a pull request from `head` into `base`
    pub async fn open_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestInfo> {
        debug!(head = %head, base = %base, "Creating pull request");
        let pr = self
            .client()
            .pulls(self.owner(), self.repo())
            .create(title, head, base)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::from_api(e, format!("Branch {}", head)))?;

        let info = self.pull_info(pr);
        info!(number = info.number, head = %info.head, "Created pull request");
        Ok(info)
    }

    /// Look up a pull request by number
    pub async fn get_pull_request(&self, number: u64) -> Result<PullRequestInfo> {
        let pr = self
            .client()
            .pulls(self.owner(), self.repo())
            .get(number)
            .await
            .map_err(|e| match Error::from_api(e, format!("Pull request #{}", number)) {
                Error::NotFound(_) => Error::PrNotFound(number),
                other => other,
            })?;

        Ok(self.pull_info(pr))
    }

    /// Files changed by a pull request, with patches
    pub async fn pull_request_files(&self, number: u64) -> Result<Vec<ChangedFile>> {
        let files: Vec<FileEntry> = self
            .client()
            .get(
                self.route(&format!("pulls/{}/files?per_page=100", number)),
                None::<&()>,
            )
            .await
            .map_err(|e| match Error::from_api(e, format!("Pull request #{}", number)) {
                Error::NotFound(_) => Error::PrNotFound(number),
                other => other,
            })?;

        debug!(number, count = files.len(), "Fetched pull request files");
        Ok(files.into_iter().map(ChangedFile::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_entry_without_patch() {
        let entries: Vec<FileEntry> = serde_json::from_value(json!([
            {
                "filename": "src/lib.rs",
                "status": "modified",
                "additions": 3,
                "deletions": 1,
                "patch": "@@ -1 +1,3 @@"
            },
            {"filename": "logo.png", "status": "added"}
        ]))
        .unwrap();

        let files: Vec<ChangedFile> = entries.into_iter().map(ChangedFile::from).collect();
        assert_eq!(files[0].additions, 3);
        assert_eq!(files[0].patch.as_deref(), Some("@@ -1 +1,3 @@"));
        assert_eq!(files[1].status, "added");
        assert!(files[1].patch.is_none());
    }

    #[tokio::test]
    async fn test_pull_request_link() {
        let client = GitHubClient::new("acme", "widgets", "ghp_test").unwrap();
        assert_eq!(
            client.pull_request_link(17),
            "https://github.com/acme/widgets/pull/17"
        );
    }
}
