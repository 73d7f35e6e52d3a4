//! Configuration management for MCP servers.
//!
//! Values are layered: built-in defaults, then an optional config file, then
//! environment variables named after the fields (`PORT`, `LOG_LEVEL`,
//! `RATE_LIMIT_REQUESTS`, ...). Names are matched case-insensitively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{McpError, Result};
use crate::ratelimit::{RateLimitConfig, RateLimitRule};

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Environment {
    Development,
    Staging,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(McpError::config_key(
                format!(
                    "Invalid environment '{}'. Must be one of: development, staging, production, test",
                    other
                ),
                "environment",
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Test => "test",
        };
        f.write_str(name)
    }
}

impl TryFrom<String> for Environment {
    type Error = McpError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Environment> for String {
    fn from(env: Environment) -> Self {
        env.to_string()
    }
}

/// Log verbosity, using the level names operators already know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// The `tracing` level this maps to. `Critical` has no counterpart and
    /// logs at `ERROR`.
    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(McpError::config_key(
                format!(
                    "Invalid log level '{}'. Must be one of: DEBUG, INFO, WARNING, ERROR, CRITICAL",
                    other
                ),
                "log_level",
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

impl TryFrom<String> for LogLevel {
    type Error = McpError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.to_string()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable lines
    Text,
}

/// Main configuration for an MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Server host
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Debug mode
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// CORS allowed origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Requests per rate limit window
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u64,

    /// Rate limit window in seconds
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window: u64,

    /// Burst allowance on top of the per-window quota
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u64,

    /// YAML file with per-tool rate limit rules
    #[serde(default)]
    pub rate_limit_policy_path: Option<String>,

    /// Upper bound on a single tool execution
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
            environment: default_environment(),
            cors_origins: default_cors_origins(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window: default_rate_limit_window(),
            rate_limit_burst: default_rate_limit_burst(),
            rate_limit_policy_path: None,
            tool_timeout_secs: None,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_environment() -> Environment {
    Environment::Development
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_rate_limit_requests() -> u64 {
    100
}

fn default_rate_limit_window() -> u64 {
    3600
}

fn default_rate_limit_burst() -> u64 {
    10
}

impl McpConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None::<&Path>)
    }

    /// Load configuration from an optional file, overridden by the
    /// process environment.
    pub fn load_from<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.as_ref()));
        }
        let settings = builder.add_source(Self::env_source()).build()?;
        Self::finish(settings)
    }

    /// Load configuration from a YAML string, ignoring the environment.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?;
        Self::finish(settings)
    }

    fn env_source() -> config::Environment {
        config::Environment::default()
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("cors_origins")
    }

    fn finish(settings: config::Config) -> Result<Self> {
        let mut config: McpConfig = settings.try_deserialize()?;
        config.cors_origins = config
            .cors_origins
            .iter()
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.rate_limit_config().validate()?;
        if self.tool_timeout_secs == Some(0) {
            return Err(McpError::config_key(
                "tool timeout must be positive",
                "tool_timeout_secs",
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// CORS origins to serve. The wildcard is never honoured in production.
    pub fn effective_cors_origins(&self) -> Vec<String> {
        if self.is_production() {
            self.cors_origins
                .iter()
                .filter(|origin| origin.as_str() != "*")
                .cloned()
                .collect()
        } else {
            self.cors_origins.clone()
        }
    }

    /// Process-wide rate limit as a rule for [`RateLimitPolicies`](crate::ratelimit::RateLimitPolicies).
    pub fn rate_limit_rule(&self) -> RateLimitRule {
        RateLimitRule::new(self.rate_limit_requests, self.rate_limit_window)
            .with_burst(self.rate_limit_burst)
    }

    /// Process-wide rate limit as a limiter configuration.
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig::from(&self.rate_limit_rule())
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }
}
