//! Repository contents and branch references

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use triad_core::repository::{BranchOutcome, EntryKind, TreeEntry, WriteOutcome};

use crate::{Error, GitHubClient, Result};

/// Length of the commit ids shown to agents
const SHORT_COMMIT_LEN: usize = 8;

/// One item of the contents API
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// The contents API answers with an object for files and an array for directories
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Contents {
    Many(Vec<ContentItem>),
    One(Box<ContentItem>),
}

#[derive(Debug, Serialize)]
struct PutContent<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Serialize)]
struct NewRef {
    #[serde(rename = "ref")]
    reference: String,
    sha: String,
}

/// Query-safe form of a ref name
fn encode_ref(git_ref: &str) -> String {
    url::form_urlencoded::byte_serialize(git_ref.as_bytes()).collect()
}

/// Path-safe form of a repository path, one segment at a time
fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            // form encoding writes spaces as '+' and escapes a literal '+'
            url::form_urlencoded::byte_serialize(segment.as_bytes())
                .collect::<String>()
                .replace('+', "%20")
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Contents route for a path without a ref
fn contents_path(path: &str) -> String {
    let path = encode_path(path);
    if path.is_empty() {
        "contents".to_string()
    } else {
        format!("contents/{}", path)
    }
}

/// Contents route for a path, tolerating leading slashes and the root
fn contents_tail(path: &str, git_ref: &str) -> String {
    format!("{}?ref={}", contents_path(path), encode_ref(git_ref))
}

/// Directory listing as tree entries, directories first then by path
pub(crate) fn tree_entries(contents: Contents) -> Vec<TreeEntry> {
    let items = match contents {
        Contents::Many(items) => items,
        Contents::One(item) => vec![*item],
    };
    let mut entries: Vec<TreeEntry> = items
        .into_iter()
        .map(|item| TreeEntry {
            kind: if item.kind == "dir" {
                EntryKind::Dir
            } else {
                EntryKind::File
            },
            path: item.path,
        })
        .collect();
    entries.sort_by(|a, b| {
        (a.kind != EntryKind::Dir, &a.path).cmp(&(b.kind != EntryKind::Dir, &b.path))
    });
    entries
}

/// Decode file content; GitHub wraps base64 at 60 columns
pub(crate) fn decode_content(item: &ContentItem) -> Result<String> {
    if item.kind != "file" {
        return Err(Error::Other(format!(
            "{} is a {}, not a file",
            item.path, item.kind
        )));
    }
    let raw = item.content.as_deref().unwrap_or_default();
    match item.encoding.as_deref() {
        Some("base64") | None => {
            let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = STANDARD
                .decode(compact)
                .map_err(|e| Error::Parse(format!("Invalid base64 in {}: {}", item.path, e)))?;
            String::from_utf8(bytes)
                .map_err(|_| Error::Other(format!("{} is not a UTF-8 text file", item.path)))
        }
        Some(other) => Err(Error::Parse(format!(
            "Unsupported encoding {} for {}",
            other, item.path
        ))),
    }
}

pub(crate) fn short_commit(sha: &str) -> String {
    sha.chars().take(SHORT_COMMIT_LEN).collect()
}

impl GitHubClient {
    async fn get_contents(&self, path: &str, git_ref: &str) -> Result<Contents> {
        let route = self.route(&contents_tail(path, git_ref));
        self.client()
            .get(route, None::<&()>)
            .await
            .map_err(|e| Error::from_api(e, format!("{} at {}", display_path(path), git_ref)))
    }

    /// List a directory at a ref
    pub async fn list_directory(&self, path: &str, git_ref: &str) -> Result<Vec<TreeEntry>> {
        debug!(path = %path, git_ref = %git_ref, "Listing directory");
        let contents = self.get_contents(path, git_ref).await?;
        Ok(tree_entries(contents))
    }

    /// Read a text file at a ref
    pub async fn file_content(&self, path: &str, git_ref: &str) -> Result<String> {
        debug!(path = %path, git_ref = %git_ref, "Reading file");
        match self.get_contents(path, git_ref).await? {
            Contents::One(item) => decode_content(&item),
            Contents::Many(_) => Err(Error::Other(format!(
                "{} is a directory, not a file",
                display_path(path)
            ))),
        }
    }

    /// Revision stamp of a file on a branch, if it exists there
    async fn file_sha(&self, path: &str, branch: &str) -> Result<Option<String>> {
        match self.get_contents(path, branch).await {
            Ok(Contents::One(item)) => Ok(Some(item.sha)),
            Ok(Contents::Many(_)) => Err(Error::Other(format!("{} is a directory", path))),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create or update a file on a branch with a single commit
    pub async fn put_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        branch: &str,
    ) -> Result<WriteOutcome> {
        let path = path.trim_matches('/');
        let sha = self.file_sha(path, branch).await?;
        let created = sha.is_none();

        let body = PutContent {
            message,
            content: STANDARD.encode(content.as_bytes()),
            branch,
            sha,
        };
        let response: PutResponse = self
            .client()
            .put(self.route(&contents_path(path)), Some(&body))
            .await
            .map_err(|e| Error::from_api(e, format!("{} on {}", path, branch)))?;

        let commit = short_commit(&response.commit.sha);
        debug!(path = %path, branch = %branch, commit = %commit, created, "Wrote file");
        Ok(WriteOutcome { created, commit })
    }

    /// Create `name` from the tip of `base`; an existing branch is reused
    pub async fn branch_from(&self, name: &str, base: &str) -> Result<BranchOutcome> {
        let base_ref: GitRef = self
            .client()
            .get(self.route(&format!("git/ref/heads/{}", base)), None::<&()>)
            .await
            .map_err(|e| Error::from_api(e, format!("Base branch {}", base)))?;

        let body = NewRef {
            reference: format!("refs/heads/{}", name),
            sha: base_ref.object.sha,
        };
        let created: Result<serde_json::Value> = self
            .client()
            .post(self.route("git/refs"), Some(&body))
            .await
            .map_err(|e| Error::from_api(e, format!("Branch {}", name)));

        match created {
            Ok(_) => {
                debug!(branch = %name, base = %base, "Created branch");
                Ok(BranchOutcome::Created)
            }
            Err(Error::AlreadyExists(_)) => {
                debug!(branch = %name, "Branch already exists");
                Ok(BranchOutcome::Reused)
            }
            Err(e) => Err(e),
        }
    }
}

fn display_path(path: &str) -> &str {
    let path = path.trim_matches('/');
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
