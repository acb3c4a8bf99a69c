//! GitHub API client using octocrab

use crate::{Error, Result};
use octocrab::Octocrab;
use tracing::{debug, info};

/// GitHub API client bound to one repository
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    repo: String,
    full_name: String,
}

impl GitHubClient {
    /// Create a client for `owner/repo` authenticated with a personal token
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: &str) -> Result<Self> {
        let owner = owner.into();
        let repo = repo.into();

        if token.trim().is_empty() {
            return Err(Error::Auth(
                "GitHub token not found. Run `triad setup` or set GITHUB_TOKEN".to_string(),
            ));
        }

        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(owner = %owner, repo = %repo, "Created GitHub client");

        Ok(Self {
            full_name: format!("{}/{}", owner, repo),
            client,
            owner,
            repo,
        })
    }

    /// Create a client from a repository reference
    ///
    /// Supports formats:
    /// - owner/repo
    /// - https://github.com/owner/repo
    /// - git@github.com:owner/repo.git
    pub fn from_url(url: &str, token: &str) -> Result<Self> {
        let (owner, repo) = parse_github_url(url)?;
        Self::new(owner, repo, token)
    }

    /// Get the repository owner
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Get the underlying octocrab client
    pub fn client(&self) -> &Octocrab {
        &self.client
    }

    /// REST route under this repository
    pub(crate) fn route(&self, tail: &str) -> String {
        format!("/repos/{}/{}/{}", self.owner, self.repo, tail)
    }

    /// Test the connection by fetching repository info
    pub async fn test_connection(&self) -> Result<()> {
        debug!(
            owner = %self.owner,
            repo = %self.repo,
            "Testing GitHub connection"
        );

        self.client
            .repos(&self.owner, &self.repo)
            .get()
            .await
            .map_err(|e| match Error::from_api(e, format!("Repository {}", self.full_name)) {
                Error::NotFound(_) => Error::Other(format!(
                    "Repository {} not found or not accessible",
                    self.full_name
                )),
                other => other,
            })?;

        info!("GitHub connection successful");
        Ok(())
    }

    pub(crate) fn full_name(&self) -> &str {
        &self.full_name
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Parse a GitHub URL into owner and repo
pub fn parse_github_url(url: &str) -> Result<(String, String)> {
    let url = url.trim();

    // Handle shorthand: owner/repo
    if !url.contains(':') && !url.contains('/') {
        return Err(Error::Parse(format!(
            "Invalid repository format: {}. Expected owner/repo",
            url
        )));
    }

    if !url.contains("://") && !url.contains('@') {
        let parts: Vec<&str> = url.split('/').collect();
        if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            return Ok((
                parts[0].to_string(),
                parts[1].trim_end_matches(".git").to_string(),
            ));
        }
        return Err(Error::Parse(format!(
            "Invalid repository format: {}. Expected owner/repo",
            url
        )));
    }

    // Handle HTTPS URL: https://github.com/owner/repo
    if url.starts_with("https://") || url.starts_with("http://") {
        let url = url::Url::parse(url).map_err(|e| Error::Parse(e.to_string()))?;
        let path = url.path().trim_start_matches('/').trim_end_matches(".git");
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() >= 2 {
            return Ok((parts[0].to_string(), parts[1].to_string()));
        }
        return Err(Error::Parse(format!("Invalid GitHub URL path: {}", path)));
    }

    // Handle SSH URL: git@github.com:owner/repo.git
    if url.starts_with("git@") {
        if let Some(path) = url.split(':').nth(1) {
            let path = path.trim_end_matches(".git");
            let parts: Vec<&str> = path.split('/').collect();
            if parts.len() >= 2 {
                return Ok((parts[0].to_string(), parts[1].to_string()));
            }
        }
        return Err(Error::Parse(format!("Invalid SSH URL: {}", url)));
    }

    Err(Error::Parse(format!("Unrecognized URL format: {}", url)))
}
