//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Pull request not found
    #[error("Pull request #{0} not found")]
    PrNotFound(u64),

    /// Write rejected because the file changed underneath us
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Branch or reference already exists
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// GitHub refuses approvals from the pull request author
    #[error("Cannot approve own pull request: {0}")]
    SelfApproval(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// What a GitHub error message means for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    NotFound,
    BadCredentials,
    Conflict,
    AlreadyExists,
    SelfApproval,
    Unknown,
}

/// Classify the text GitHub puts in an error response
pub(crate) fn classify_message(message: &str) -> Failure {
    let lower = message.to_lowercase();
    if lower.contains("approve your own") {
        Failure::SelfApproval
    } else if lower.contains("reference already exists") {
        Failure::AlreadyExists
    } else if lower.contains("does not match") || lower.contains("but expected") {
        Failure::Conflict
    } else if lower.contains("bad credentials") {
        Failure::BadCredentials
    } else if lower.contains("not found") {
        Failure::NotFound
    } else {
        Failure::Unknown
    }
}

/// Full error text of an octocrab failure, including the `errors` array
fn error_text(err: &octocrab::Error) -> Option<String> {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let mut text = source.message.clone();
            if let Some(errors) = &source.errors {
                for detail in errors {
                    text.push(' ');
                    text.push_str(&detail.to_string());
                }
            }
            Some(text)
        }
        _ => None,
    }
}

impl Error {
    /// Turn an octocrab failure into a typed error for `what`
    pub(crate) fn from_api(err: octocrab::Error, what: impl Into<String>) -> Self {
        let Some(text) = error_text(&err) else {
            return Error::Api(err);
        };
        let what = what.into();
        match classify_message(&text) {
            Failure::NotFound => Error::NotFound(what),
            Failure::BadCredentials => Error::Auth("Invalid GitHub token".to_string()),
            Failure::Conflict => Error::Conflict(format!("{}: {}", what, text)),
            Failure::AlreadyExists => Error::AlreadyExists(what),
            Failure::SelfApproval => Error::SelfApproval(text),
            Failure::Unknown => Error::Api(err),
        }
    }
}

impl From<Error> for triad_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(_) | Error::PrNotFound(_) => {
                triad_core::Error::NotFound(err.to_string())
            }
            Error::Conflict(msg) => triad_core::Error::Conflict(msg),
            Error::SelfApproval(msg) => triad_core::Error::SelfApprovalBlocked(msg),
            Error::Auth(msg) => triad_core::Error::Credentials(msg),
            other => triad_core::Error::Repository(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_messages() {
        assert_eq!(
            classify_message("Unprocessable Entity \"Can not approve your own pull request\""),
            Failure::SelfApproval
        );
        assert_eq!(
            classify_message("Reference already exists"),
            Failure::AlreadyExists
        );
        assert_eq!(
            classify_message("README.md does not match 3f2a1c"),
            Failure::Conflict
        );
        assert_eq!(classify_message("Bad credentials"), Failure::BadCredentials);
        assert_eq!(classify_message("Not Found"), Failure::NotFound);
        assert_eq!(classify_message("Validation Failed"), Failure::Unknown);
    }

    #[test]
    fn test_into_core_error() {
        let core: triad_core::Error = Error::SelfApproval("nope".into()).into();
        assert!(matches!(core, triad_core::Error::SelfApprovalBlocked(_)));

        let core: triad_core::Error = Error::PrNotFound(7).into();
        match core {
            triad_core::Error::NotFound(msg) => assert!(msg.contains("#7")),
            other => panic!("unexpected {other:?}"),
        }

        let core: triad_core::Error = Error::Conflict("stale".into()).into();
        assert!(matches!(core, triad_core::Error::Conflict(_)));

        let core: triad_core::Error = Error::Parse("bad".into()).into();
        assert!(matches!(core, triad_core::Error::Repository(_)));
    }
}
