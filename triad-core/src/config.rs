//! Configuration management for triad
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (PM_MODEL, DEVELOPER_MODEL, ARCHITECT_MODEL, ...)
//! 3. Config file (~/.config/triad/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::AgentRole;
use crate::{Error, Result};

/// Model selection and connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Model used by the Product Manager
    pub pm: String,

    /// Model used by the Developer, for both implementation and fixes
    pub developer: String,

    /// Model used by the Architect reviewer
    pub architect: String,

    /// Chat completions endpoint root
    pub base_url: String,

    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            pm: "gpt-4o-mini".to_string(),
            developer: "gpt-4o-mini".to_string(),
            architect: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl ModelsConfig {
    /// Model identifier for a role
    pub fn for_role(&self, role: AgentRole) -> &str {
        match role {
            AgentRole::ProductManager => &self.pm,
            AgentRole::Developer | AgentRole::DeveloperFix => &self.developer,
            AgentRole::Architect => &self.architect,
        }
    }
}

/// Review loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of Architect reviews
    pub max_rounds: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_rounds: 3 }
    }
}

/// Per-phase message caps
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BudgetsConfig {
    pub pm: usize,
    pub developer: usize,
    pub review: usize,
    pub fix: usize,
}

impl Default for BudgetsConfig {
    fn default() -> Self {
        Self {
            pm: 20,
            developer: 60,
            review: 30,
            fix: 60,
        }
    }
}

impl BudgetsConfig {
    /// Message cap for a role
    pub fn for_role(&self, role: AgentRole) -> usize {
        match role {
            AgentRole::ProductManager => self.pm,
            AgentRole::Developer => self.developer,
            AgentRole::Architect => self.review,
            AgentRole::DeveloperFix => self.fix,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Model configuration
    pub models: ModelsConfig,

    /// Review loop configuration
    pub pipeline: PipelineConfig,

    /// Per-phase budgets
    pub budgets: BudgetsConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/triad/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("triad").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - PM_MODEL, DEVELOPER_MODEL, ARCHITECT_MODEL: per-role models
    /// - OPENAI_BASE_URL: chat completions endpoint root
    /// - TRIAD_MAX_ROUNDS: review round cap
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = non_empty("PM_MODEL") {
            self.models.pm = model;
        }
        if let Some(model) = non_empty("DEVELOPER_MODEL") {
            self.models.developer = model;
        }
        if let Some(model) = non_empty("ARCHITECT_MODEL") {
            self.models.architect = model;
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.models.base_url = url;
        }
        if let Some(rounds) = non_empty("TRIAD_MAX_ROUNDS").and_then(|v| v.trim().parse().ok()) {
            self.pipeline.max_rounds = rounds;
        }

        self
    }

    /// Apply CLI flag overrides
    ///
    /// A single `model` replaces the model of every role.
    pub fn with_cli_overrides(mut self, model: Option<String>, max_rounds: Option<u32>) -> Self {
        if let Some(m) = model {
            self.models.pm = m.clone();
            self.models.developer = m.clone();
            self.models.architect = m;
        }

        if let Some(rounds) = max_rounds {
            self.pipeline.max_rounds = rounds;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(model: Option<String>, max_rounds: Option<u32>) -> Result<Self> {
        let config = Self::load()?
            .with_env_overrides()
            .with_cli_overrides(model, max_rounds);
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_rounds == 0 {
            return Err(Error::Config("max_rounds must be at least 1".to_string()));
        }

        for role in AgentRole::all() {
            if self.budgets.for_role(*role) < 2 {
                return Err(Error::Config(format!(
                    "budget for {} must allow at least 2 messages",
                    role
                )));
            }
        }

        Ok(())
    }
}
