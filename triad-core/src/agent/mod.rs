//! Agent runtime for triad
//!
//! An agent is a model, a system prompt, a fixed tool set and a
//! termination condition. Every invocation starts from an empty history.

mod model;
mod openai;
pub mod prompts;
mod role;
mod runtime;
mod transcript;

pub use model::{
    ChatMessage, ChatModel, ChatRequest, ChatResponse, ModelProvider, Role, TokenUsage, ToolCall,
    ToolDefinition,
};
pub use openai::OpenAiProvider;
pub use prompts::PromptContext;
pub use role::{AgentRole, APPROVED, CHANGES_REQUESTED, PHASE_COMPLETE};
pub use runtime::{AgentRuntime, AgentSpec, Termination, TOOL_SOURCE};
pub use transcript::{Content, Item, Message, StopReason, Transcript, TASK_SOURCE};
