//! Run command - Drive one requirement through the agent pipeline

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Args;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use tracing::{info, warn};

use triad_core::{
    Config, Credentials, OpenAiProvider, Pipeline, PipelineInput, PipelineOutcome,
};
use triad_github::GitHubClient;
use triad_jira::JiraClient;

use super::credentials::{open_store, prompt_all, prompt_missing_tokens, validate};
use crate::ui::{Header, TerminalUi};

/// Process exit status for an interrupted run
pub const EXIT_INTERRUPTED: u8 = 130;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// The requirement, in plain language
    pub requirement: Vec<String>,

    /// Resume from an existing issue, skipping the Product Manager
    #[arg(long, value_name = "KEY", conflicts_with = "requirement")]
    pub issue: Option<String>,

    /// Resume from an open pull request, going straight to review
    #[arg(long, value_name = "N", conflicts_with = "requirement")]
    pub pr: Option<u64>,

    /// Maximum Architect review rounds
    #[arg(long, env = "TRIAD_MAX_ROUNDS")]
    pub max_rounds: Option<u32>,

    /// Model for every role (overrides config and env)
    #[arg(long)]
    pub model: Option<String>,

    /// Never prompt; missing values are errors
    #[arg(long)]
    pub no_input: bool,

    /// Credentials file to use instead of the default
    #[arg(long, env = "TRIAD_ENV_FILE")]
    pub env_file: Option<PathBuf>,
}

/// How a run ended, for the process exit status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    Finished(PipelineOutcome),
    Interrupted,
}

impl RunArgs {
    fn requirement_text(&self) -> String {
        self.requirement.join(" ").trim().to_string()
    }

    /// Where the pipeline starts, given the flags
    pub(crate) fn pipeline_input(&self, requirement: String) -> PipelineInput {
        match (self.pr, &self.issue) {
            (Some(number), issue) => PipelineInput::PullRequest {
                number,
                issue_key: issue.clone(),
            },
            (None, Some(key)) => PipelineInput::Issue(key.trim().to_string()),
            (None, None) => PipelineInput::Requirement(requirement),
        }
    }

    fn resumes(&self) -> bool {
        self.issue.is_some() || self.pr.is_some()
    }

    /// Execute the run command
    pub async fn execute(&self, verbose: bool) -> anyhow::Result<RunExit> {
        let store = open_store(self.env_file.as_deref())?;
        let mut creds = store.load()?;

        let can_prompt = !self.no_input && std::io::stdin().is_terminal();
        let interactive = can_prompt && self.requirement.is_empty() && !self.resumes();
        let theme = ColorfulTheme::default();

        if verbose {
            info!(
                env_file = %store.path().display(),
                interactive,
                "Starting triad run"
            );
        }

        if interactive {
            print_banner();
            prompt_all(&theme, &mut creds).await?;
            store.save(&creds)?;
        } else if can_prompt && has_missing_tokens(&creds) {
            prompt_missing_tokens(&theme, &mut creds).await?;
            store.save(&creds)?;
        }

        let missing = creds.missing();
        if !missing.is_empty() {
            bail!(
                "Missing settings: {}. Run `triad setup` or pass them in the environment",
                missing.join(", ")
            );
        }

        let prompt_theme = can_prompt.then_some(&theme);
        if validate(prompt_theme, &mut creds).await? {
            store.save(&creds)?;
        }
        creds.export_to_env();

        let requirement = if interactive {
            read_requirement(&theme)?
        } else {
            self.requirement_text()
        };
        let input = self.pipeline_input(requirement);
        if let PipelineInput::Requirement(text) = &input {
            if text.is_empty() {
                bail!(triad_core::Error::MissingRequirement);
            }
        }

        let config = Config::load_with_overrides(self.model.clone(), self.max_rounds)?;
        let pipeline = build_pipeline(config, &creds)?;

        let mut ui = TerminalUi::new();
        ui.header(&Header {
            jira_url: &creds.jira_url,
            project: &creds.jira_project_key,
            repo: &creds.github_repo,
            base_branch: &creds.base_branch,
            assignee: &creds.jira_user,
        });

        tokio::select! {
            result = pipeline.run(input, &mut ui) => {
                let outcome = result?;
                if outcome.needs_follow_up() {
                    warn!(pr = outcome.pr_number, rounds = outcome.rounds, "Review did not converge");
                }
                Ok(RunExit::Finished(outcome))
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("  {}", style("Interrupted. Open pull requests are left as they are.").yellow());
                Ok(RunExit::Interrupted)
            }
        }
    }
}

fn has_missing_tokens(creds: &Credentials) -> bool {
    creds.github_token.is_empty() || creds.jira_api_token.is_empty() || creds.openai_api_key.is_empty()
}

fn print_banner() {
    let bar = style("=".repeat(58)).cyan();
    println!();
    println!("  {}", bar);
    println!("  {}", style("    Triad Development Pipeline").cyan().bold());
    println!("  {}", bar);
}

fn read_requirement(theme: &ColorfulTheme) -> anyhow::Result<String> {
    println!();
    let text: String = Input::with_theme(theme)
        .with_prompt("Enter your requirement")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read requirement")?;
    Ok(text.trim().to_string())
}

fn build_pipeline(config: Config, creds: &Credentials) -> anyhow::Result<Pipeline> {
    let provider = OpenAiProvider::new(creds.openai_api_key.clone(), &config.models);
    let tracker = JiraClient::new(
        &creds.jira_url,
        &creds.jira_user,
        &creds.jira_api_token,
        &creds.jira_project_key,
    )?;
    let repo = GitHubClient::from_url(&creds.github_repo, &creds.github_token)?;

    Ok(Pipeline::new(
        config,
        Arc::new(provider),
        Arc::new(tracker),
        Arc::new(repo),
        creds.base_branch.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    fn parse(args: &[&str]) -> RunArgs {
        TestCli::try_parse_from(std::iter::once("triad").chain(args.iter().copied()))
            .unwrap()
            .run
    }

    #[test]
    fn test_requirement_words_are_joined() {
        let args = parse(&["Add", "a", "health", "endpoint"]);
        assert_eq!(args.requirement_text(), "Add a health endpoint");
        assert_eq!(
            args.pipeline_input(args.requirement_text()),
            PipelineInput::Requirement("Add a health endpoint".to_string())
        );
    }

    #[test]
    fn test_resume_from_issue() {
        let args = parse(&["--issue", "ABC-42"]);
        assert_eq!(
            args.pipeline_input(String::new()),
            PipelineInput::Issue("ABC-42".to_string())
        );
    }

    #[test]
    fn test_resume_from_pull_request() {
        let args = parse(&["--pr", "17", "--issue", "ABC-42", "--max-rounds", "2"]);
        assert_eq!(args.max_rounds, Some(2));
        assert_eq!(
            args.pipeline_input(String::new()),
            PipelineInput::PullRequest {
                number: 17,
                issue_key: Some("ABC-42".to_string()),
            }
        );
    }

    #[test]
    fn test_requirement_conflicts_with_resume() {
        let result = TestCli::try_parse_from(["triad", "--issue", "ABC-1", "do", "things"]);
        assert!(result.is_err());
    }
}
