//! Configuration loading, validation, and management for deepclaw.
//!
//! Loads configuration from `~/.deepclaw/config.toml` with environment
//! variable overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Name under which the built-in general-purpose sub-agent is exposed.
pub const GENERAL_PURPOSE_AGENT: &str = "general-purpose";

/// The root configuration structure.
///
/// Maps directly to `~/.deepclaw/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Identity, model and loop settings of the main agent
    #[serde(default)]
    pub agent: AgentConfig,

    /// Which built-in middleware are installed
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Context-eviction settings
    #[serde(default)]
    pub eviction: EvictionConfig,

    /// Summarization settings
    #[serde(default)]
    pub summarization: SummarizationConfig,

    /// Delegation settings
    #[serde(default)]
    pub delegation: DelegationConfig,

    /// Custom sub-agent types available to the delegation tool
    #[serde(default)]
    pub subagents: Vec<SubAgentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default = "default_instruction")]
    pub instruction: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Iteration ceiling of one task execution
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Register the completion and planning tools
    #[serde(default = "default_true")]
    pub include_default_tools: bool,
}

fn default_agent_name() -> String {
    "deepclaw".into()
}
fn default_instruction() -> String {
    "You are a helpful assistant that plans its work and completes tasks autonomously.".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    500
}
fn default_max_iterations() -> u32 {
    10
}
fn default_true() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            instruction: default_instruction(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_iterations: default_max_iterations(),
            include_default_tools: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    #[serde(default = "default_true")]
    pub planning: bool,

    #[serde(default = "default_true")]
    pub eviction: bool,

    #[serde(default = "default_true")]
    pub delegation: bool,

    #[serde(default = "default_true")]
    pub summarization: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            planning: true,
            eviction: true,
            delegation: true,
            summarization: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Tool results longer than this many characters are moved to the
    /// virtual filesystem
    #[serde(default = "default_threshold_chars")]
    pub threshold_chars: usize,

    /// Tools whose path/content arguments are mirrored into the virtual
    /// filesystem
    #[serde(default = "default_write_tools")]
    pub write_tools: Vec<String>,
}

fn default_threshold_chars() -> usize {
    80_000
}
fn default_write_tools() -> Vec<String> {
    vec!["write_file".into(), "save_file".into()]
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            threshold_chars: default_threshold_chars(),
            write_tools: default_write_tools(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationConfig {
    #[serde(default = "default_max_tokens_before_summary")]
    pub max_tokens_before_summary: usize,

    /// Most recent messages kept verbatim
    #[serde(default = "default_messages_to_keep")]
    pub messages_to_keep: usize,

    /// Model used for digests; the agent model when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_summary_temperature")]
    pub temperature: f32,

    #[serde(default = "default_summary_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens_before_summary() -> usize {
    50_000
}
fn default_messages_to_keep() -> usize {
    6
}
fn default_summary_temperature() -> f32 {
    0.3
}
fn default_summary_max_tokens() -> u32 {
    2000
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            max_tokens_before_summary: default_max_tokens_before_summary(),
            messages_to_keep: default_messages_to_keep(),
            model: None,
            temperature: default_summary_temperature(),
            max_tokens: default_summary_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationConfig {
    /// Offer the general-purpose sub-agent type
    #[serde(default = "default_true")]
    pub general_purpose: bool,

    /// Instruction of the general-purpose sub-agent
    #[serde(default = "default_subagent_instruction")]
    pub subagent_instruction: String,
}

fn default_subagent_instruction() -> String {
    "You are a helpful assistant that completes tasks autonomously.".into()
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            general_purpose: true,
            subagent_instruction: default_subagent_instruction(),
        }
    }
}

/// A named sub-agent type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentConfig {
    pub name: String,

    /// Shown to the main agent in the delegation tool description
    pub description: String,

    /// Instruction of the sub-agent; falls back to `description`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Names of parent tools the sub-agent may use; all of them when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
}

impl AppConfig {
    /// Load configuration from the default path, with env overrides.
    ///
    /// Priority: env vars > config file > defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(model) = std::env::var("DEEPCLAW_MODEL") {
            config.agent.model = model;
        }

        if let Ok(raw) = std::env::var("DEEPCLAW_MAX_ITERATIONS") {
            config.agent.max_iterations = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "DEEPCLAW_MAX_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// The configuration directory (`~/.deepclaw`).
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deepclaw")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be greater than 0".into(),
            ));
        }

        // Delegation is gated on a recorded plan, which only planning writes.
        if self.middleware.delegation && !self.middleware.planning {
            return Err(ConfigError::ValidationError(
                "middleware.delegation requires middleware.planning".into(),
            ));
        }

        if self.summarization.messages_to_keep == 0 {
            return Err(ConfigError::ValidationError(
                "summarization.messages_to_keep must be greater than 0".into(),
            ));
        }

        if self.eviction.threshold_chars == 0 {
            return Err(ConfigError::ValidationError(
                "eviction.threshold_chars must be greater than 0".into(),
            ));
        }

        let mut seen = HashSet::new();
        for sub in &self.subagents {
            if sub.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "subagent name must not be empty".into(),
                ));
            }
            if sub.name == GENERAL_PURPOSE_AGENT {
                return Err(ConfigError::ValidationError(format!(
                    "subagent name '{GENERAL_PURPOSE_AGENT}' is reserved"
                )));
            }
            if !seen.insert(sub.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate subagent name '{}'",
                    sub.name
                )));
            }
        }

        Ok(())
    }

    /// Model used for summarization digests.
    pub fn summarization_model(&self) -> &str {
        self.summarization
            .model
            .as_deref()
            .unwrap_or(&self.agent.model)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.eviction.threshold_chars, 80_000);
        assert_eq!(config.summarization.messages_to_keep, 6);
        assert!(config.middleware.delegation);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.agent.model, config.agent.model);
        assert_eq!(
            parsed.summarization.max_tokens_before_summary,
            config.summarization.max_tokens_before_summary
        );
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.agent.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn delegation_without_planning_rejected() {
        let mut config = AppConfig::default();
        config.middleware.planning = false;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("requires middleware.planning"));

        config.middleware.delegation = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reserved_subagent_name_rejected() {
        let mut config = AppConfig::default();
        config.subagents.push(SubAgentConfig {
            name: GENERAL_PURPOSE_AGENT.into(),
            description: "clash".into(),
            system_prompt: None,
            tools: None,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_subagent_names_rejected() {
        let sub = SubAgentConfig {
            name: "researcher".into(),
            description: "finds things".into(),
            system_prompt: None,
            tools: None,
        };
        let mut config = AppConfig::default();
        config.subagents = vec![sub.clone(), sub];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.agent.name, "deepclaw");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[agent]
name = "planner"
max_iterations = 4

[eviction]
threshold_chars = 100

[[subagents]]
name = "researcher"
description = "Searches and reports"
tools = ["web_search"]
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.name, "planner");
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.agent.model, "anthropic/claude-sonnet-4");
        assert_eq!(config.eviction.threshold_chars, 100);
        assert_eq!(config.eviction.write_tools, vec!["write_file", "save_file"]);
        assert_eq!(config.subagents.len(), 1);
        assert_eq!(
            config.subagents[0].tools.as_deref(),
            Some(&["web_search".to_string()][..])
        );
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent\nname = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn summarization_model_falls_back_to_agent_model() {
        let mut config = AppConfig::default();
        assert_eq!(config.summarization_model(), config.agent.model);
        config.summarization.model = Some("small-model".into());
        assert_eq!(config.summarization_model(), "small-model");
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("max_tokens_before_summary"));
        assert!(toml_str.contains("write_file"));
    }
}
