//! Triad GitHub - GitHub repository collaborator for the triad pipeline
//!
//! Implements [`triad_core::Repository`] on top of octocrab: repository
//! contents, branches, pull requests and reviews. Nothing in this crate
//! merges a pull request.

mod client;
mod contents;
mod error;
mod pulls;
mod repository;
mod reviews;

pub use client::{parse_github_url, GitHubClient};
pub use error::{Error, Result};
