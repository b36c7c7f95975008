//! Engine configuration (interpose.toml)
//!
//! ```toml
//! [scope]
//! namespace = "Interpose.Proxies"
//!
//! [visibility]
//! grants = ["billing", "plugins/*"]
//! ```
//!
//! `grants` lists modules whose internal types the engine may proxy, in
//! addition to modules that grant access themselves. Patterns are an exact
//! module name, `prefix/*` or `prefix/**` (anything below `prefix`), or `*`
//! and `**` (every module).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantic validation failed
    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Type synthesis cache settings
    #[serde(default)]
    pub scope: ScopeConfig,

    /// Visibility grants
    #[serde(default)]
    pub visibility: VisibilityConfig,
}

/// Type synthesis cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScopeConfig {
    /// Namespace synthesized types are placed in
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

fn default_namespace() -> String {
    "Interpose.Proxies".to_string()
}

/// Modules whose internal types are visible to the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisibilityConfig {
    /// Module name patterns
    #[serde(default)]
    pub grants: Vec<String>,
}

impl EngineConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let namespace = &self.scope.namespace;
        if !namespace.is_empty()
            && !namespace
                .split('.')
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_'))
        {
            return Err(ConfigError::Validation(format!(
                "Invalid namespace '{}'. Must be dot-separated identifiers",
                namespace
            )));
        }

        for pattern in &self.visibility.grants {
            GrantRule::parse(pattern)?;
        }

        Ok(())
    }

    /// Grant rules from `[visibility] grants`
    pub fn grant_rules(&self) -> Vec<GrantRule> {
        self.visibility
            .grants
            .iter()
            .filter_map(|p| GrantRule::parse(p).ok())
            .collect()
    }

    /// Whether the configuration grants access to `module_name`'s internals
    pub fn grants_module(&self, module_name: &str) -> bool {
        self.grant_rules().iter().any(|rule| rule.matches(module_name))
    }
}

/// A module name pattern from `[visibility] grants`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRule {
    pattern: String,
}

impl GrantRule {
    /// Parse and check a pattern
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(ConfigError::Validation("Grant pattern cannot be empty".to_string()));
        }
        let stem = pattern
            .strip_suffix("/**")
            .or_else(|| pattern.strip_suffix("/*"))
            .unwrap_or(pattern);
        if pattern != "*" && pattern != "**" && stem.contains('*') {
            return Err(ConfigError::Validation(format!(
                "Invalid grant pattern '{}'. Wildcards are only allowed as a trailing '/*' or '/**'",
                pattern
            )));
        }
        Ok(Self {
            pattern: pattern.to_string(),
        })
    }

    /// The pattern text
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Check if a module name matches this pattern
    pub fn matches(&self, module_name: &str) -> bool {
        if self.pattern == "**" || self.pattern == "*" {
            return true;
        }

        let prefix = self
            .pattern
            .strip_suffix("/**")
            .or_else(|| self.pattern.strip_suffix("/*"));
        match prefix {
            Some(prefix) => module_name
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some_and(|rest| !rest.is_empty()),
            None => self.pattern == module_name,
        }
    }
}
