//! Fact extraction from phase transcripts
//!
//! Control flow depends on three artifacts pulled out of free-form agent
//! output: the issue key, the pull request number and the review verdict.
//! Each has a fixed grammar:
//!
//! - issue key: `[A-Z][A-Z0-9]*-\d+` on word boundaries, or exactly
//!   `<PROJECT>-\d+` when the project key is known
//! - pull request number: digits after `PR #`, falling back to digits
//!   after `pull/`
//! - verdict: the last non-empty agent text; approved when it mentions
//!   APPROVED and does not mention CHANGES_REQUESTED
//!
//! The task message is never scanned and tool-call arguments are never
//! scanned. Results of the tool that produces an artifact are searched
//! before anything else, so an issue key quoted in the agent's chatter
//! cannot shadow the one the tracker returned.

use regex::Regex;

use crate::agent::{Content, Item, Transcript, APPROVED, CHANGES_REQUESTED};
use crate::tools::{CREATE_ISSUE_TOOL, CREATE_PULL_REQUEST_TOOL};
use crate::{Error, Result};

/// Where in a transcript a value was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub value: String,
    /// Index of the message in the transcript
    pub message_index: usize,
    /// Index of the item inside the message, for structured messages
    pub item_index: Option<usize>,
}

/// Compiled artifact grammars
#[derive(Debug, Clone)]
pub struct Extractor {
    issue_key: Regex,
    pr_number: Regex,
    pull_url: Regex,
}

impl Extractor {
    /// Build the grammars, narrowing issue keys to a project when given
    pub fn new(project: Option<&str>) -> Result<Self> {
        let issue_key = match project.map(str::trim).filter(|p| !p.is_empty()) {
            // Jira keys are always uppercase, whatever was configured
            Some(project) => format!(
                r"\b({}-\d+)\b",
                regex::escape(&project.to_uppercase())
            ),
            None => r"\b([A-Z][A-Z0-9]*-\d+)\b".to_string(),
        };

        Ok(Self {
            issue_key: compile(&issue_key)?,
            pr_number: compile(r"PR #(\d+)")?,
            pull_url: compile(r"pull/(\d+)")?,
        })
    }

    /// First issue key, preferring the issue-creation tool's results
    pub fn issue_key(&self, transcript: &Transcript) -> Option<Match> {
        scan_forward(transcript, &self.issue_key, Some(CREATE_ISSUE_TOOL))
    }

    /// First pull request number, preferring the `PR #` form
    pub fn pr_number(&self, transcript: &Transcript) -> Option<(u64, Match)> {
        [&self.pr_number, &self.pull_url].into_iter().find_map(|re| {
            let found = scan_forward(transcript, re, Some(CREATE_PULL_REQUEST_TOOL))?;
            let number = found.value.parse().ok()?;
            Some((number, found))
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Config(format!("Invalid pattern {}: {}", pattern, e)))
}

fn find(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Forward scan with producer precedence
pub fn scan_forward(transcript: &Transcript, re: &Regex, producer: Option<&str>) -> Option<Match> {
    let messages = transcript
        .messages()
        .iter()
        .enumerate()
        .filter(|(_, m)| !m.is_task());

    if let Some(producer) = producer {
        for (message_index, message) in messages.clone() {
            let Content::Items(items) = &message.content else {
                continue;
            };
            for (item_index, item) in items.iter().enumerate() {
                let produced = item.tool_name() == producer
                    && matches!(item, Item::ToolResult { is_error: false, .. });
                if !produced {
                    continue;
                }
                if let Some(value) = item.searchable_text().and_then(|t| find(re, t)) {
                    return Some(Match {
                        value,
                        message_index,
                        item_index: Some(item_index),
                    });
                }
            }
        }
    }

    for (message_index, message) in messages {
        match &message.content {
            Content::Text(text) => {
                if let Some(value) = find(re, text) {
                    return Some(Match {
                        value,
                        message_index,
                        item_index: None,
                    });
                }
            }
            Content::Items(items) => {
                for (item_index, item) in items.iter().enumerate() {
                    if let Some(value) = item.searchable_text().and_then(|t| find(re, t)) {
                        return Some(Match {
                            value,
                            message_index,
                            item_index: Some(item_index),
                        });
                    }
                }
            }
        }
    }

    None
}

/// Reverse scan: the last non-empty text the agent wrote
pub fn last_text(transcript: &Transcript) -> Option<(usize, &str)> {
    transcript
        .messages()
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, m)| !m.is_task())
        .find_map(|(i, m)| {
            m.as_text()
                .filter(|t| !t.trim().is_empty())
                .map(|t| (i, t))
        })
}

/// The Architect's judgment of one review round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The text the verdict was read from
    pub text: String,
    pub approved: bool,
}

impl Verdict {
    /// Read a verdict from review text
    ///
    /// Text naming both outcomes, or neither, counts as changes requested.
    pub fn from_text(text: &str) -> Self {
        let upper = text.to_uppercase();
        Self {
            text: text.to_string(),
            approved: upper.contains(APPROVED) && !upper.contains(CHANGES_REQUESTED),
        }
    }

    /// Verdict of a review transcript; an empty transcript is not approved
    pub fn from_transcript(transcript: &Transcript) -> Self {
        Self::from_text(last_text(transcript).map(|(_, t)| t).unwrap_or(""))
    }
}
