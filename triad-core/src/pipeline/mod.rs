//! Pipeline orchestration
//!
//! Phases run in a fixed order: Product Manager, Developer, then a review
//! loop of Architect and Developer-fix invocations bounded by
//! `max_rounds`. Every phase gets a freshly built agent; the only values
//! carried between phases are the extracted scalars (issue key, pull
//! request number, head branch). Nothing in this module can merge a pull
//! request.

mod events;

#[cfg(test)]
mod scenarios;

pub use events::{EventSink, NullSink, PipelineEvent, Round};

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::agent::{
    prompts, AgentRole, AgentRuntime, AgentSpec, ModelProvider, PromptContext, Termination,
    Transcript,
};
use crate::config::Config;
use crate::extract::{Extractor, Verdict};
use crate::repository::Repository;
use crate::tools::{RunContext, ToolSet};
use crate::tracker::Tracker;
use crate::{Error, Result};

/// Pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    ProductManager,
    Developer,
    ArchitectReview,
    DeveloperFix,
    Done,
}

impl Phase {
    /// The agent role that acts in this phase
    pub fn role(&self) -> Option<AgentRole> {
        match self {
            Phase::ProductManager => Some(AgentRole::ProductManager),
            Phase::Developer => Some(AgentRole::Developer),
            Phase::ArchitectReview => Some(AgentRole::Architect),
            Phase::DeveloperFix => Some(AgentRole::DeveloperFix),
            Phase::Done => None,
        }
    }

    /// Short label for progress displays
    pub fn short_name(&self) -> &'static str {
        match self {
            Phase::ProductManager => "PM",
            Phase::Developer => "DEV",
            Phase::ArchitectReview => "ARCH",
            Phase::DeveloperFix => "FIX",
            Phase::Done => "DONE",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::ProductManager => "Product Manager",
            Phase::Developer => "Developer",
            Phase::ArchitectReview => "Architect review",
            Phase::DeveloperFix => "Developer fix",
            Phase::Done => "Done",
        };
        f.write_str(name)
    }
}

/// A scalar handed from one phase to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    IssueKey,
    PullRequestNumber,
    HeadBranch,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Artifact::IssueKey => "issue key",
            Artifact::PullRequestNumber => "pull request number",
            Artifact::HeadBranch => "head branch",
        };
        f.write_str(name)
    }
}

/// Where a run starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineInput {
    /// Start from a natural-language requirement
    Requirement(String),
    /// Resume from an existing issue, skipping the Product Manager
    Issue(String),
    /// Resume from an open pull request, going straight to review
    PullRequest {
        number: u64,
        issue_key: Option<String>,
    },
}

/// How the review loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Approved,
    /// The round cap was reached without approval; a human must follow up
    MaxRoundsReached,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Approved => f.write_str("approved"),
            OutcomeStatus::MaxRoundsReached => f.write_str("max rounds reached"),
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineOutcome {
    pub issue_key: Option<String>,
    pub pr_number: u64,
    /// Architect invocations performed
    pub rounds: u32,
    pub status: OutcomeStatus,
}

impl PipelineOutcome {
    /// Whether a human needs to pick the pull request up
    pub fn needs_follow_up(&self) -> bool {
        self.status == OutcomeStatus::MaxRoundsReached
    }
}

/// Sequences the agents of one requirement
pub struct Pipeline {
    config: Config,
    provider: Arc<dyn ModelProvider>,
    tracker: Arc<dyn Tracker>,
    repo: Arc<dyn Repository>,
    base_branch: String,
}

impl Pipeline {
    pub fn new(
        config: Config,
        provider: Arc<dyn ModelProvider>,
        tracker: Arc<dyn Tracker>,
        repo: Arc<dyn Repository>,
        base_branch: impl Into<String>,
    ) -> Self {
        Self {
            config,
            provider,
            tracker,
            repo,
            base_branch: base_branch.into(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline to approval or to the round cap
    ///
    /// Extraction failures and model failures end the run with an error.
    /// Reaching the round cap is a normal outcome.
    pub async fn run(
        &self,
        input: PipelineInput,
        events: &mut dyn EventSink,
    ) -> Result<PipelineOutcome> {
        let run = Run {
            pipeline: self,
            ctx: RunContext::new(
                self.tracker.clone(),
                self.repo.clone(),
                self.base_branch.clone(),
            ),
            extractor: Extractor::new(self.tracker.project_key())?,
            runtime: AgentRuntime::new(self.provider.as_ref()),
            prompt_context: self.prompt_context(),
        };

        let (issue_key, pr_number) = match input {
            PipelineInput::Requirement(requirement) => {
                let requirement = requirement.trim();
                if requirement.is_empty() {
                    return Err(Error::MissingRequirement);
                }
                let key = run.product_manager(requirement, events).await?;
                let pr = run.developer(&key, events).await?;
                (Some(key), pr)
            }
            PipelineInput::Issue(key) => {
                let key = key.trim().to_string();
                if key.is_empty() {
                    return Err(Error::MissingRequirement);
                }
                info!(issue = %key, "Resuming from existing issue");
                let pr = run.developer(&key, events).await?;
                (Some(key), pr)
            }
            PipelineInput::PullRequest { number, issue_key } => {
                info!(pr = number, "Resuming from existing pull request");
                (issue_key, number)
            }
        };

        let head = run.pin_head_branch(pr_number, events).await?;

        let max_rounds = self.config.pipeline.max_rounds;
        let mut rounds = 0;
        let mut status = OutcomeStatus::MaxRoundsReached;

        for round in 1..=max_rounds {
            rounds = round;
            let verdict = run.review(pr_number, round, events).await?;
            if verdict.approved {
                info!(pr = pr_number, round, "Pull request approved");
                status = OutcomeStatus::Approved;
                break;
            }
            if round == max_rounds {
                warn!(pr = pr_number, max_rounds, "Max review rounds reached");
                break;
            }
            run.fix(pr_number, &head, issue_key.as_deref(), round, events)
                .await?;
        }

        events.emit(PipelineEvent::Summary {
            issue_url: issue_key.as_deref().map(|k| self.tracker.issue_url(k)),
            issue_key: issue_key.clone(),
            pr_number,
            pr_url: self.repo.pull_request_url(pr_number),
            rounds,
            status,
        });

        Ok(PipelineOutcome {
            issue_key,
            pr_number,
            rounds,
            status,
        })
    }

    fn prompt_context(&self) -> PromptContext {
        let context = PromptContext::new()
            .with_repo(self.repo.full_name())
            .with_base_branch(&self.base_branch);
        match self.tracker.project_key() {
            Some(project) => context.with_project(project),
            None => context,
        }
    }
}

/// State scoped to one pipeline run
struct Run<'a> {
    pipeline: &'a Pipeline,
    ctx: RunContext,
    extractor: Extractor,
    runtime: AgentRuntime<'a>,
    prompt_context: PromptContext,
}

impl Run<'_> {
    /// Build a fresh agent and invoke it
    async fn invoke(
        &self,
        phase: Phase,
        role: AgentRole,
        round: Option<Round>,
        task: &str,
        events: &mut dyn EventSink,
    ) -> Result<Transcript> {
        let config = &self.pipeline.config;
        let spec = AgentSpec {
            name: role.name().to_string(),
            role,
            model: config.models.for_role(role).to_string(),
            system_prompt: prompts::system_prompt(role, &self.prompt_context),
            tools: ToolSet::for_role(role, &self.ctx),
            termination: Termination::for_role(role, config.budgets.for_role(role)),
        };

        events.emit(PipelineEvent::PhaseStart {
            phase,
            model: spec.model.clone(),
            round,
        });
        info!(%phase, model = %spec.model, "Phase started");

        let transcript = self.runtime.run(&spec, task, events).await?;

        if transcript.stop_reason().is_forced() {
            warn!(%phase, limit = spec.termination.max_messages, "Phase budget exhausted");
            events.emit(PipelineEvent::BudgetExhausted {
                phase,
                limit: spec.termination.max_messages,
            });
        }
        info!(
            %phase,
            agent = transcript.agent(),
            messages = transcript.messages().len(),
            "Phase finished"
        );
        events.emit(PipelineEvent::PhaseEnd { phase });

        Ok(transcript)
    }

    async fn product_manager(&self, requirement: &str, events: &mut dyn EventSink) -> Result<String> {
        let transcript = self
            .invoke(
                Phase::ProductManager,
                AgentRole::ProductManager,
                None,
                requirement,
                events,
            )
            .await?;

        let found = self
            .extractor
            .issue_key(&transcript)
            .ok_or(Error::Extraction {
                phase: Phase::ProductManager,
                artifact: Artifact::IssueKey,
            })?;

        info!(issue = %found.value, message = found.message_index, "Extracted issue key");
        events.emit(PipelineEvent::Artifact {
            artifact: Artifact::IssueKey,
            value: found.value.clone(),
        });
        Ok(found.value)
    }

    async fn developer(&self, issue_key: &str, events: &mut dyn EventSink) -> Result<u64> {
        let task = prompts::developer_task(issue_key);
        let transcript = self
            .invoke(Phase::Developer, AgentRole::Developer, None, &task, events)
            .await?;

        let (number, found) = self
            .extractor
            .pr_number(&transcript)
            .ok_or(Error::Extraction {
                phase: Phase::Developer,
                artifact: Artifact::PullRequestNumber,
            })?;

        info!(pr = number, message = found.message_index, "Extracted pull request number");
        events.emit(PipelineEvent::Artifact {
            artifact: Artifact::PullRequestNumber,
            value: number.to_string(),
        });
        Ok(number)
    }

    /// Point the run's branch cursor at the pull request head
    async fn pin_head_branch(&self, pr_number: u64, events: &mut dyn EventSink) -> Result<String> {
        let pr = self.pipeline.repo.pull_request(pr_number).await?;
        self.ctx.branch().set(&pr.head);
        events.emit(PipelineEvent::Artifact {
            artifact: Artifact::HeadBranch,
            value: pr.head.clone(),
        });
        Ok(pr.head)
    }

    async fn review(&self, pr_number: u64, round: u32, events: &mut dyn EventSink) -> Result<Verdict> {
        let task = prompts::architect_task(pr_number);
        let transcript = self
            .invoke(
                Phase::ArchitectReview,
                AgentRole::Architect,
                Some(self.round(round)),
                &task,
                events,
            )
            .await?;

        let verdict = Verdict::from_transcript(&transcript);
        events.emit(PipelineEvent::Verdict {
            round,
            text: verdict.text.clone(),
            approved: verdict.approved,
        });
        Ok(verdict)
    }

    async fn fix(
        &self,
        pr_number: u64,
        branch: &str,
        issue_key: Option<&str>,
        round: u32,
        events: &mut dyn EventSink,
    ) -> Result<()> {
        let task = prompts::developer_fix_task(pr_number, branch, issue_key);
        self.invoke(
            Phase::DeveloperFix,
            AgentRole::DeveloperFix,
            Some(self.round(round)),
            &task,
            events,
        )
        .await?;
        Ok(())
    }

    fn round(&self, number: u32) -> Round {
        Round {
            number,
            max: self.pipeline.config.pipeline.max_rounds,
        }
    }
}
