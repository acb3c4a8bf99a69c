//! Triad Core - Core library for the three-agent development pipeline
//!
//! A Product Manager agent files an issue, a Developer agent implements it
//! and opens a pull request, and an Architect agent reviews it, with a
//! bounded fix loop until approval. This crate holds the agent runtime,
//! the tools, the extraction layer and the orchestrator. Tracker and
//! repository implementations live in their own crates.

pub mod agent;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod repository;
pub mod tools;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{AgentRole, ModelProvider, OpenAiProvider};
pub use config::Config;
pub use credentials::{CredentialStore, Credentials};
pub use error::{Error, Result};
pub use pipeline::{
    EventSink, OutcomeStatus, Phase, Pipeline, PipelineEvent, PipelineInput, PipelineOutcome,
};
pub use repository::Repository;
pub use tracker::Tracker;
