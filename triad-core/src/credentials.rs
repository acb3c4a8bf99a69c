//! Credential storage for triad
//!
//! Tracker, code host and model credentials live in a flat `KEY=value`
//! file (default `~/.config/triad/credentials.env`) that must have
//! restrictive permissions (0600 on Unix). The file is rewritten in full
//! on every save.
//!
//! Loading priority:
//! 1. Process environment variables
//! 2. Credentials file

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{Error, Result};

pub const JIRA_URL: &str = "JIRA_URL";
pub const JIRA_USER: &str = "JIRA_USER";
pub const JIRA_PROJECT_KEY: &str = "JIRA_PROJECT_KEY";
pub const JIRA_API_TOKEN: &str = "JIRA_API_TOKEN";
pub const GITHUB_REPO: &str = "GITHUB_REPO";
pub const BASE_BRANCH: &str = "BASE_BRANCH";
pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Every key the credentials file holds, in file order
pub const KEYS: &[&str] = &[
    JIRA_URL,
    JIRA_USER,
    JIRA_PROJECT_KEY,
    JIRA_API_TOKEN,
    GITHUB_REPO,
    BASE_BRANCH,
    GITHUB_TOKEN,
    OPENAI_API_KEY,
];

const DEFAULT_BASE_BRANCH: &str = "dev";

/// Credentials and connection settings for one pipeline run
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub jira_url: String,
    pub jira_user: String,
    pub jira_project_key: String,
    pub jira_api_token: String,
    pub github_repo: String,
    pub base_branch: String,
    pub github_token: String,
    pub openai_api_key: String,
}

impl Credentials {
    /// Build from a key lookup, trimming whitespace
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let base_branch = get(BASE_BRANCH);

        Self {
            jira_url: get(JIRA_URL).trim_end_matches('/').to_string(),
            jira_user: get(JIRA_USER),
            jira_project_key: get(JIRA_PROJECT_KEY).to_uppercase(),
            jira_api_token: get(JIRA_API_TOKEN),
            github_repo: get(GITHUB_REPO),
            base_branch: if base_branch.is_empty() {
                DEFAULT_BASE_BRANCH.to_string()
            } else {
                base_branch
            },
            github_token: get(GITHUB_TOKEN),
            openai_api_key: get(OPENAI_API_KEY),
        }
    }

    /// Value stored under a file key
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            JIRA_URL => &self.jira_url,
            JIRA_USER => &self.jira_user,
            JIRA_PROJECT_KEY => &self.jira_project_key,
            JIRA_API_TOKEN => &self.jira_api_token,
            GITHUB_REPO => &self.github_repo,
            BASE_BRANCH => &self.base_branch,
            GITHUB_TOKEN => &self.github_token,
            OPENAI_API_KEY => &self.openai_api_key,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Replace the value stored under a file key
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let mut value = value.into().trim().to_string();
        if key == JIRA_PROJECT_KEY {
            value = value.to_uppercase();
        }
        let slot = match key {
            JIRA_URL => &mut self.jira_url,
            JIRA_USER => &mut self.jira_user,
            JIRA_PROJECT_KEY => &mut self.jira_project_key,
            JIRA_API_TOKEN => &mut self.jira_api_token,
            GITHUB_REPO => &mut self.github_repo,
            BASE_BRANCH => &mut self.base_branch,
            GITHUB_TOKEN => &mut self.github_token,
            OPENAI_API_KEY => &mut self.openai_api_key,
            other => return Err(Error::Config(format!("Unknown credential key: {}", other))),
        };
        *slot = value;
        Ok(())
    }

    /// Keys that must be non-empty before a run can start
    pub fn missing(&self) -> Vec<&'static str> {
        KEYS.iter()
            .copied()
            .filter(|key| self.get(key).is_some_and(|v| v.is_empty()))
            .collect()
    }

    /// Non-empty `(key, value)` pairs in file order
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        KEYS.iter()
            .filter_map(|key| self.get(key).map(|v| (*key, v)))
            .filter(|(_, v)| !v.is_empty())
            .collect()
    }

    /// Export every non-empty value into the process environment
    pub fn export_to_env(&self) {
        for (key, value) in self.pairs() {
            std::env::set_var(key, value);
        }
        debug!(count = self.pairs().len(), "Exported credentials to environment");
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &str| if v.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("Credentials")
            .field("jira_url", &self.jira_url)
            .field("jira_user", &self.jira_user)
            .field("jira_project_key", &self.jira_project_key)
            .field("jira_api_token", &redact(&self.jira_api_token))
            .field("github_repo", &self.github_repo)
            .field("base_branch", &self.base_branch)
            .field("github_token", &redact(&self.github_token))
            .field("openai_api_key", &redact(&self.openai_api_key))
            .finish()
    }
}

/// The on-disk credentials file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Use a specific file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the default location, `~/.config/triad/credentials.env` on Unix
    pub fn open_default() -> Result<Self> {
        Self::default_path()
            .map(Self::new)
            .ok_or_else(|| Error::Config("Could not determine credentials path".to_string()))
    }

    /// Get the default credentials file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("triad").join("credentials.env"))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw `KEY=value` pairs from the file
    ///
    /// A missing file reads as empty.
    pub fn read(&self) -> Result<BTreeMap<String, String>> {
        let mut values = BTreeMap::new();
        if !self.path.exists() {
            return Ok(values);
        }

        check_permissions(&self.path)?;

        let iter = dotenvy::from_path_iter(&self.path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", self.path.display(), e)))?;
        for item in iter {
            let (key, value) = item.map_err(|e| {
                Error::Config(format!("Failed to parse {}: {}", self.path.display(), e))
            })?;
            values.insert(key, value);
        }

        Ok(values)
    }

    /// Load credentials, letting process environment values win
    pub fn load(&self) -> Result<Credentials> {
        let file = self.read()?;
        Ok(Credentials::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file.get(key).cloned())
        }))
    }

    /// Rewrite the whole file from the given credentials
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(Error::Io)?;
            }
        }

        let mut contents = String::from("# triad credentials - do not commit\n");
        for (key, value) in credentials.pairs() {
            contents.push_str(key);
            contents.push('=');
            contents.push_str(&quote_value(value));
            contents.push('\n');
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(Error::Io)?;

        // An existing file keeps its old mode on open
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(Error::Io)?;
        }

        file.write_all(contents.as_bytes()).map_err(Error::Io)?;
        file.sync_all().map_err(Error::Io)?;

        info!(path = %self.path.display(), "Saved credentials");
        Ok(())
    }
}

/// Check that the file is not readable by group or others
fn check_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = std::fs::metadata(path).map_err(Error::Io)?.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(Error::Credentials(format!(
                "Credentials file {} has insecure permissions {:o}. \
                 Please run: chmod 600 {}",
                path.display(),
                mode & 0o777,
                path.display()
            )));
        }
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

/// Quote a value so it reads back verbatim
///
/// Single quotes disable variable substitution on read.
fn quote_value(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| !c.is_whitespace() && !matches!(c, '#' | '$' | '"' | '\'' | '\\' | '`'));
    if plain {
        return value.to_string();
    }
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$");
    format!("\"{}\"", escaped)
}
