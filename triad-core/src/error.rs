//! Error types for triad

use thiserror::Error;

use crate::pipeline::{Artifact, Phase};

/// Result type alias for triad operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for triad operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or rejected credentials
    #[error("Credential error: {0}")]
    Credentials(String),

    /// Language model transport or protocol failure
    #[error("Model error: {0}")]
    Model(String),

    /// Agent runtime error
    #[error("Agent error: {0}")]
    Agent(String),

    /// Tool arguments did not match the tool's schema
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// Issue tracker failure
    #[error("Tracker error: {0}")]
    Tracker(String),

    /// Code host failure
    #[error("Repository error: {0}")]
    Repository(String),

    /// External resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected because the stored revision moved on
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The code host refuses approvals from the pull request author
    #[error("Self-approval blocked: {0}")]
    SelfApprovalBlocked(String),

    /// An expected artifact was not found in a phase transcript
    #[error("Could not extract {artifact} from the {phase} transcript")]
    Extraction { phase: Phase, artifact: Artifact },

    /// Nothing to work on
    #[error("No requirement provided")]
    MissingRequirement,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the failure ends the whole pipeline run with a non-zero status
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Extraction { .. }
                | Error::MissingRequirement
                | Error::Credentials(_)
                | Error::Model(_)
        )
    }
}
