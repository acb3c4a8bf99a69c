//! Triad Jira - Jira tracker collaborator for the triad pipeline
//!
//! Implements [`triad_core::Tracker`] over the Jira REST API v2 with
//! basic authentication (account email plus API token).

mod client;
mod error;
mod issues;
mod tracker;

pub use client::JiraClient;
pub use error::{Error, Result};
