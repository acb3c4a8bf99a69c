//! Error types for Jira operations

use thiserror::Error;

/// Result type for Jira operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during Jira operations
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure
    #[error("Jira request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials rejected
    #[error("Jira authentication error: {0}")]
    Auth(String),

    /// Issue does not exist or is not visible
    #[error("Issue {0} not found")]
    IssueNotFound(String),

    /// No transition leads to the requested status
    #[error("No transition to '{status}' for {key}. Available: {available}")]
    NoTransition {
        key: String,
        status: String,
        available: String,
    },

    /// Jira answered with an error status
    #[error("Jira API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid base URL
    #[error("Invalid Jira URL: {0}")]
    Url(#[from] url::ParseError),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<Error> for triad_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::IssueNotFound(_) => triad_core::Error::NotFound(err.to_string()),
            Error::Auth(msg) => triad_core::Error::Credentials(msg),
            other => triad_core::Error::Tracker(other.to_string()),
        }
    }
}
