//! Phase transcripts
//!
//! A transcript is the ordered record of one agent invocation. It is read
//! once by the extraction layer and then discarded; nothing in it is ever
//! fed to another phase.

use serde::{Deserialize, Serialize};

/// Source label used for the task message
pub const TASK_SOURCE: &str = "user";

/// One structured item inside a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    /// A tool invocation requested by the agent
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// The text a tool returned
    ToolResult {
        call_id: String,
        name: String,
        output: String,
        is_error: bool,
    },
}

impl Item {
    /// Searchable text of the item
    ///
    /// Tool-call arguments are the agent's own input, not an outcome, so
    /// they are not searchable.
    pub fn searchable_text(&self) -> Option<&str> {
        match self {
            Item::ToolCall { .. } => None,
            Item::ToolResult { output, .. } => Some(output),
        }
    }

    /// Name of the tool this item belongs to
    pub fn tool_name(&self) -> &str {
        match self {
            Item::ToolCall { name, .. } | Item::ToolResult { name, .. } => name,
        }
    }
}

/// Message payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Items(Vec<Item>),
}

/// One transcript message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Agent name or [`TASK_SOURCE`]
    pub source: String,
    pub content: Content,
}

impl Message {
    pub fn text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: Content::Text(text.into()),
        }
    }

    pub fn items(source: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            source: source.into(),
            content: Content::Items(items),
        }
    }

    /// Text payload, if this is a text message
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            Content::Items(_) => None,
        }
    }

    /// Whether this is the task message that started the phase
    pub fn is_task(&self) -> bool {
        self.source == TASK_SOURCE
    }
}

/// Why an invocation stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The agent emitted one of its terminal tokens
    Token(String),
    /// The message budget ran out first
    MessageLimit(usize),
}

impl StopReason {
    /// Whether the invocation was cut off by its budget
    pub fn is_forced(&self) -> bool {
        matches!(self, StopReason::MessageLimit(_))
    }
}

/// Ordered messages of one agent invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    agent: String,
    messages: Vec<Message>,
    stop: StopReason,
}

impl Transcript {
    pub fn new(agent: impl Into<String>, messages: Vec<Message>, stop: StopReason) -> Self {
        Self {
            agent: agent.into(),
            messages,
            stop,
        }
    }

    /// Name of the agent that produced this transcript
    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn stop_reason(&self) -> &StopReason {
        &self.stop
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Names of every tool the agent called, in order
    pub fn tool_calls(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter_map(|m| match &m.content {
                Content::Items(items) => Some(items),
                Content::Text(_) => None,
            })
            .flatten()
            .filter_map(|item| match item {
                Item::ToolCall { name, .. } => Some(name.as_str()),
                Item::ToolResult { .. } => None,
            })
            .collect()
    }
}
