//! Pipeline progress events
//!
//! The orchestrator reports what it does through an [`EventSink`]. Sinks
//! only observe; nothing they do feeds back into control flow.

use serde::Serialize;

use super::{Artifact, OutcomeStatus, Phase};

/// Position in the review loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Round {
    pub number: u32,
    pub max: u32,
}

/// One observable step of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A phase is about to invoke its agent
    PhaseStart {
        phase: Phase,
        model: String,
        round: Option<Round>,
    },
    /// The agent requested a tool
    ToolCall {
        agent: String,
        tool: String,
        brief: String,
    },
    /// A tool returned
    ToolResult {
        agent: String,
        tool: String,
        summary: String,
        is_error: bool,
    },
    /// The agent wrote text
    AgentMessage { agent: String, text: String },
    /// An artifact was extracted and handed to the next phase
    Artifact { artifact: Artifact, value: String },
    /// A phase hit its message cap before a terminal token
    BudgetExhausted { phase: Phase, limit: usize },
    /// The Architect's verdict for a round
    Verdict {
        round: u32,
        text: String,
        approved: bool,
    },
    /// A phase finished
    PhaseEnd { phase: Phase },
    /// Final run summary
    Summary {
        issue_key: Option<String>,
        issue_url: Option<String>,
        pr_number: u64,
        pr_url: String,
        rounds: u32,
        status: OutcomeStatus,
    },
}

/// Receives pipeline events
pub trait EventSink: Send {
    fn emit(&mut self, event: PipelineEvent);
}

/// Collects events in memory
impl EventSink for Vec<PipelineEvent> {
    fn emit(&mut self, event: PipelineEvent) {
        self.push(event);
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: PipelineEvent) {}
}
