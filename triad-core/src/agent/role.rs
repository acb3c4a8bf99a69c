//! Agent role definitions
//!
//! Each role has its own system prompt, tool set and terminal tokens:
//! - ProductManager: files one tracker issue from a requirement
//! - Developer: implements the issue and opens a pull request
//! - DeveloperFix: addresses review feedback on an open pull request
//! - Architect: reviews the pull request and gives a verdict

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal token for the PM and both Developer roles
pub const PHASE_COMPLETE: &str = "PHASE_COMPLETE";

/// Architect token for an accepted pull request
pub const APPROVED: &str = "APPROVED";

/// Architect token for a rejected pull request
pub const CHANGES_REQUESTED: &str = "CHANGES_REQUESTED";

/// The role an agent plays in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    ProductManager,
    Developer,
    DeveloperFix,
    Architect,
}

impl AgentRole {
    /// Get all roles in pipeline order
    pub fn all() -> &'static [AgentRole] {
        &[
            AgentRole::ProductManager,
            AgentRole::Developer,
            AgentRole::Architect,
            AgentRole::DeveloperFix,
        ]
    }

    /// Agent identity used as the transcript source
    ///
    /// The fix role is the same developer identity with a different
    /// prompt and tool set.
    pub fn name(&self) -> &'static str {
        match self {
            AgentRole::ProductManager => "product_manager",
            AgentRole::Developer | AgentRole::DeveloperFix => "developer",
            AgentRole::Architect => "architect",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            AgentRole::ProductManager => "Product Manager",
            AgentRole::Developer => "Developer",
            AgentRole::DeveloperFix => "Developer (fix)",
            AgentRole::Architect => "Architect",
        }
    }

    /// Tokens that end an invocation of this role
    pub fn terminal_tokens(&self) -> &'static [&'static str] {
        match self {
            AgentRole::Architect => &[APPROVED, CHANGES_REQUESTED],
            _ => &[PHASE_COMPLETE],
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names() {
        assert_eq!(AgentRole::ProductManager.name(), "product_manager");
        assert_eq!(AgentRole::Developer.name(), "developer");
        assert_eq!(AgentRole::DeveloperFix.name(), "developer");
        assert_eq!(AgentRole::Architect.name(), "architect");
    }

    #[test]
    fn test_terminal_tokens() {
        assert_eq!(AgentRole::Developer.terminal_tokens(), &[PHASE_COMPLETE]);
        assert_eq!(
            AgentRole::Architect.terminal_tokens(),
            &[APPROVED, CHANGES_REQUESTED]
        );
    }

    #[test]
    fn test_display_uses_label() {
        assert_eq!(AgentRole::DeveloperFix.to_string(), "Developer (fix)");
    }
}
