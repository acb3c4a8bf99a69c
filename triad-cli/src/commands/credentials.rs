//! Interactive credential collection and validation

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password};
use tracing::{debug, warn};

use triad_core::credentials::{
    BASE_BRANCH, GITHUB_REPO, GITHUB_TOKEN, JIRA_API_TOKEN, JIRA_PROJECT_KEY, JIRA_URL,
    JIRA_USER, OPENAI_API_KEY,
};
use triad_core::{CredentialStore, Credentials};
use triad_github::GitHubClient;
use triad_jira::JiraClient;

const GITHUB_TOKEN_PAGE: &str =
    "https://github.com/settings/tokens/new?scopes=repo&description=triad";
const JIRA_TOKEN_PAGE: &str = "https://id.atlassian.com/manage-profile/security/api-tokens";
const OPENAI_KEY_PAGE: &str = "https://platform.openai.com/api-keys";

/// Attempts per service before offering a degraded run
pub const VALIDATION_ATTEMPTS: usize = 3;

const GH_TIMEOUT: Duration = Duration::from_secs(5);

/// Credentials file chosen by `--env-file` or the default location
pub fn open_store(env_file: Option<&Path>) -> anyhow::Result<CredentialStore> {
    match env_file {
        Some(path) => Ok(CredentialStore::new(path)),
        None => Ok(CredentialStore::open_default()?),
    }
}

fn section(title: &str) {
    println!();
    println!("  {}", style(title).bold());
    println!("  {}", style("─".repeat(40)).dim());
}

fn ask(theme: &ColorfulTheme, label: &str, current: &str) -> anyhow::Result<String> {
    let mut input = Input::<String>::with_theme(theme)
        .with_prompt(label)
        .allow_empty(true);
    if !current.is_empty() {
        input = input.default(current.to_string());
    }
    let value = input.interact_text().context("Failed to read input")?;
    Ok(value.trim().to_string())
}

fn ask_secret(theme: &ColorfulTheme, label: &str) -> anyhow::Result<String> {
    let value = Password::with_theme(theme)
        .with_prompt(label)
        .allow_empty_password(true)
        .interact()
        .context("Failed to read secret")?;
    Ok(value.trim().to_string())
}

/// Prompt for every setting, showing stored values as defaults
///
/// Missing tokens are obtained through the token pages.
pub async fn prompt_all(theme: &ColorfulTheme, creds: &mut Credentials) -> anyhow::Result<()> {
    section("Jira Configuration");
    let url = ask(theme, "URL", &creds.jira_url)?;
    creds.set(JIRA_URL, url.trim_end_matches('/'))?;
    let user = ask(theme, "User email", &creds.jira_user)?;
    creds.set(JIRA_USER, user)?;
    let project = ask(theme, "Project key", &creds.jira_project_key)?;
    creds.set(JIRA_PROJECT_KEY, project)?;

    section("GitHub Configuration");
    let repo = ask(theme, "Repo (owner/repo)", &creds.github_repo)?;
    creds.set(GITHUB_REPO, repo)?;
    let base = ask(theme, "Base branch", &creds.base_branch)?;
    creds.set(BASE_BRANCH, if base.is_empty() { "dev".to_string() } else { base })?;

    prompt_missing_tokens(theme, creds).await
}

/// Obtain only the tokens that are still empty
pub async fn prompt_missing_tokens(
    theme: &ColorfulTheme,
    creds: &mut Credentials,
) -> anyhow::Result<()> {
    if creds.jira_api_token.is_empty() {
        let token = obtain_jira_token(theme)?;
        creds.set(JIRA_API_TOKEN, token)?;
    }
    if creds.github_token.is_empty() {
        let token = obtain_github_token(theme).await?;
        creds.set(GITHUB_TOKEN, token)?;
    }
    if creds.openai_api_key.is_empty() {
        let key = obtain_openai_key(theme)?;
        creds.set(OPENAI_API_KEY, key)?;
    }
    Ok(())
}

/// Token from an authenticated GitHub CLI, if any
pub async fn gh_auth_token() -> Option<String> {
    let output = tokio::time::timeout(
        GH_TIMEOUT,
        tokio::process::Command::new("gh")
            .args(["auth", "token"])
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        debug!("gh auth token failed");
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}

fn open_token_page(
    theme: &ColorfulTheme,
    what: &str,
    url: &str,
    steps: &[&str],
) -> anyhow::Result<()> {
    println!();
    println!("  {} not found. Opening browser for token creation...", what);
    for (i, step) in steps.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
    println!();
    let open_now = Confirm::with_theme(theme)
        .with_prompt("Open the browser now?")
        .default(true)
        .interact()
        .context("Failed to read confirmation")?;
    if !open_now {
        println!("  Token page: {}", url);
    } else if let Err(e) = open::that(url) {
        warn!(error = %e, "Failed to open browser");
        println!("  Open this page manually: {}", url);
    }
    Ok(())
}

pub async fn obtain_github_token(theme: &ColorfulTheme) -> anyhow::Result<String> {
    if let Some(token) = gh_auth_token().await {
        println!("  {}", style("Found token from GitHub CLI (gh).").green());
        return Ok(token);
    }
    open_token_page(
        theme,
        "GitHub token",
        GITHUB_TOKEN_PAGE,
        &[
            "Sign in with SSO if prompted",
            "Set a name and expiration",
            "Under scopes, check 'repo' (full control)",
            "Click 'Generate token' and copy it",
        ],
    )?;
    ask_secret(theme, "Paste your GitHub PAT")
}

pub fn obtain_jira_token(theme: &ColorfulTheme) -> anyhow::Result<String> {
    open_token_page(
        theme,
        "Jira API token",
        JIRA_TOKEN_PAGE,
        &[
            "Sign in with SSO if prompted",
            "Click 'Create API token'",
            "Name it (e.g. 'triad') and click Create",
            "Copy the token",
        ],
    )?;
    ask_secret(theme, "Paste your Jira API token")
}

pub fn obtain_openai_key(theme: &ColorfulTheme) -> anyhow::Result<String> {
    open_token_page(
        theme,
        "OpenAI API key",
        OPENAI_KEY_PAGE,
        &["Sign in", "Create a new secret key", "Copy the key"],
    )?;
    ask_secret(theme, "Paste your OpenAI API key")
}

/// Result of checking one service
#[derive(Debug)]
enum Check {
    Ok,
    /// Credentials rejected; a new token may help
    Rejected(String),
    /// Anything else: wrong URL, repository missing, network
    Failed(String),
}

async fn check_github(creds: &Credentials) -> Check {
    let client = match GitHubClient::from_url(&creds.github_repo, &creds.github_token) {
        Ok(client) => client,
        Err(triad_github::Error::Auth(msg)) => return Check::Rejected(msg),
        Err(e) => return Check::Failed(e.to_string()),
    };
    match client.test_connection().await {
        Ok(()) => Check::Ok,
        Err(triad_github::Error::Auth(msg)) => Check::Rejected(msg),
        Err(e) => Check::Failed(e.to_string()),
    }
}

async fn check_jira(creds: &Credentials) -> Check {
    let client = match JiraClient::new(
        &creds.jira_url,
        &creds.jira_user,
        &creds.jira_api_token,
        &creds.jira_project_key,
    ) {
        Ok(client) => client,
        Err(triad_jira::Error::Auth(msg)) => return Check::Rejected(msg),
        Err(e) => return Check::Failed(e.to_string()),
    };
    match client.test_connection().await {
        Ok(_) => Check::Ok,
        Err(triad_jira::Error::Auth(msg)) => Check::Rejected(msg),
        Err(e) => Check::Failed(e.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    GitHub,
    Jira,
}

impl Service {
    fn label(&self) -> &'static str {
        match self {
            Service::GitHub => "GitHub",
            Service::Jira => "Jira",
        }
    }

    async fn check(&self, creds: &Credentials) -> Check {
        match self {
            Service::GitHub => check_github(creds).await,
            Service::Jira => check_jira(creds).await,
        }
    }

    fn reprompt(&self, theme: &ColorfulTheme, creds: &mut Credentials) -> anyhow::Result<()> {
        match self {
            Service::GitHub => {
                let token = ask_secret(theme, "GitHub token was rejected. Paste a new PAT")?;
                creds.set(GITHUB_TOKEN, token)?;
            }
            Service::Jira => {
                let token = ask_secret(theme, "Jira token was rejected. Paste a new API token")?;
                creds.set(JIRA_API_TOKEN, token)?;
            }
        }
        Ok(())
    }
}

/// Check GitHub and Jira access before the run starts
///
/// With a theme, rejected tokens are re-prompted up to
/// [`VALIDATION_ATTEMPTS`] times and the operator may then accept a
/// degraded run. Without one, any failure is an error. Returns whether
/// credentials changed and should be saved.
pub async fn validate(
    theme: Option<&ColorfulTheme>,
    creds: &mut Credentials,
) -> anyhow::Result<bool> {
    let mut changed = false;

    for service in [Service::GitHub, Service::Jira] {
        let mut attempt = 1;
        let failure = loop {
            match service.check(creds).await {
                Check::Ok => {
                    println!(
                        "  {} {} credentials verified",
                        style("✓").green(),
                        service.label()
                    );
                    break None;
                }
                Check::Rejected(msg) if attempt < VALIDATION_ATTEMPTS => {
                    let Some(theme) = theme else {
                        break Some(msg);
                    };
                    println!("  {} {}: {}", style("✗").red(), service.label(), msg);
                    service.reprompt(theme, creds)?;
                    changed = true;
                    attempt += 1;
                }
                Check::Rejected(msg) | Check::Failed(msg) => break Some(msg),
            }
        };

        let Some(msg) = failure else {
            continue;
        };
        println!("  {} {}: {}", style("✗").red(), service.label(), msg);

        let Some(theme) = theme else {
            bail!("{} credential check failed: {}", service.label(), msg);
        };
        let degraded = Confirm::with_theme(theme)
            .with_prompt(format!(
                "{} is not reachable. Continue with a degraded run?",
                service.label()
            ))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !degraded {
            bail!("Aborted: {} credential check failed", service.label());
        }
        warn!(service = service.label(), "Continuing with unverified credentials");
    }

    Ok(changed)
}
