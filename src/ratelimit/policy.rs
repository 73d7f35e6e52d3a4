//! Per-tool rate limit rules.
//!
//! Rules are loaded from YAML. A tool gets its own rule when one is listed
//! under `tools`, otherwise the `default` rule applies, and a tool matching
//! neither is not rate limited.
//!
//! ```yaml
//! default:
//!   requests: 100
//!   window_secs: 3600
//!   burst: 10
//! tools:
//!   query_database:
//!     requests: 5
//!     window_secs: 60
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::limiter::RateLimitConfig;
use crate::error::{McpError, Result};

/// A limit and its window, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Requests allowed per window
    pub requests: u64,
    /// Window length in seconds
    pub window_secs: u64,
    /// Burst allowance on top of `requests`
    #[serde(default)]
    pub burst: Option<u64>,
    /// Optional name/description for this limit
    #[serde(default)]
    pub name: Option<String>,
}

impl RateLimitRule {
    pub fn new(requests: u64, window_secs: u64) -> Self {
        Self {
            requests,
            window_secs,
            burst: None,
            name: None,
        }
    }

    pub fn with_burst(mut self, burst: u64) -> Self {
        self.burst = Some(burst);
        self
    }
}

impl From<&RateLimitRule> for RateLimitConfig {
    fn from(rule: &RateLimitRule) -> Self {
        RateLimitConfig {
            requests: rule.requests,
            window: Duration::from_secs(rule.window_secs),
            burst: rule.burst,
        }
    }
}

/// Rate limit rules for a set of tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicies {
    /// Rule for tools without a specific entry
    #[serde(default)]
    pub default: Option<RateLimitRule>,
    /// Tool name to rule
    #[serde(default)]
    pub tools: HashMap<String, RateLimitRule>,
}

impl RateLimitPolicies {
    /// Empty policies: nothing is rate limited.
    pub fn new() -> Self {
        Self::default()
    }

    /// Policies applying one rule to every tool.
    pub fn with_default(rule: RateLimitRule) -> Self {
        Self {
            default: Some(rule),
            tools: HashMap::new(),
        }
    }

    /// Load policies from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit policies");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load policies from a YAML string.
    ///
    /// Every rule is checked so that a bad entry fails here rather than when
    /// the tool is first registered.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let policies: RateLimitPolicies = serde_yaml::from_str(yaml)
            .map_err(|e| McpError::config(format!("Failed to parse rate limit policies: {}", e)))?;
        policies.validate()?;
        Ok(policies)
    }

    /// Check that every rule forms a usable limiter configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(rule) = &self.default {
            RateLimitConfig::from(rule).validate().map_err(|e| {
                McpError::config_key(e.message(), "default")
            })?;
        }
        for (tool, rule) in &self.tools {
            RateLimitConfig::from(rule).validate().map_err(|e| {
                McpError::config_key(e.message(), format!("tools.{}", tool))
            })?;
        }
        Ok(())
    }

    /// Set or replace the rule for one tool.
    pub fn set_tool(&mut self, tool: impl Into<String>, rule: RateLimitRule) {
        self.tools.insert(tool.into(), rule);
    }

    /// The rule governing `tool`, preferring a tool-specific one.
    pub fn rule_for(&self, tool: &str) -> Option<&RateLimitRule> {
        self.tools.get(tool).or(self.default.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policies() {
        let yaml = r#"
default:
  requests: 100
  window_secs: 3600
  burst: 10
tools:
  query_database:
    requests: 5
    window_secs: 60
    name: expensive queries
"#;
        let policies = RateLimitPolicies::from_yaml(yaml).unwrap();
        assert_eq!(policies.default, Some(RateLimitRule::new(100, 3600).with_burst(10)));
        assert_eq!(policies.tools.len(), 1);
        assert_eq!(
            policies.tools["query_database"].name.as_deref(),
            Some("expensive queries")
        );
    }

    #[test]
    fn test_tool_rule_takes_precedence() {
        let mut policies = RateLimitPolicies::with_default(RateLimitRule::new(100, 3600));
        policies.set_tool("query_database", RateLimitRule::new(5, 60));

        assert_eq!(policies.rule_for("query_database").unwrap().requests, 5);
        assert_eq!(policies.rule_for("hello_world").unwrap().requests, 100);
    }

    #[test]
    fn test_no_default_means_unlimited() {
        let yaml = r#"
tools:
  query_database:
    requests: 5
    window_secs: 60
"#;
        let policies = RateLimitPolicies::from_yaml(yaml).unwrap();
        assert!(policies.rule_for("hello_world").is_none());
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let yaml = r#"
tools:
  broken:
    requests: 0
    window_secs: 60
"#;
        let err = RateLimitPolicies::from_yaml(yaml).unwrap_err();
        assert!(matches!(
            err,
            McpError::Configuration { config_key: Some(ref k), .. } if k == "tools.broken"
        ));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let err = RateLimitPolicies::from_yaml("tools: [not, a, map]").unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_rule_to_limiter_config() {
        let config = RateLimitConfig::from(&RateLimitRule::new(3, 10).with_burst(1));
        assert_eq!(config.requests, 3);
        assert_eq!(config.window, Duration::from_secs(10));
        assert_eq!(config.capacity(), 4);
    }
}
