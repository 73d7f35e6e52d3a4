//! Error types shared by MCP servers.
//!
//! Every variant maps to a stable machine-readable code and an HTTP status so
//! that transports can render a uniform error envelope.

use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Returned by [`RateLimiter::check`](crate::ratelimit::RateLimiter::check)
/// when a key has used up its quota.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Rate limit exceeded: {limit} requests per {}s, retry after {retry_after}s", .window.as_secs())]
pub struct RateLimitExceeded {
    /// Baseline requests allowed per window
    pub limit: u64,
    /// Length of the rolling window
    pub window: Duration,
    /// Whole seconds until the oldest counted request leaves the window
    pub retry_after: u64,
}

/// Main error type for MCP server operations.
#[derive(Error, Debug)]
pub enum McpError {
    /// Input failed validation
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        value: Option<String>,
    },

    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        auth_type: Option<String>,
    },

    #[error("Authorization error: {message}")]
    Authorization {
        message: String,
        required_permission: Option<String>,
    },

    /// Quota exhausted for the calling key
    #[error(transparent)]
    RateLimit(#[from] RateLimitExceeded),

    /// An upstream API call failed
    #[error("External service error: {message}")]
    ExternalService {
        message: String,
        service: Option<String>,
        status_code: Option<u16>,
    },

    /// Configuration is invalid or missing
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        config_key: Option<String>,
    },

    #[error("Database error: {message}")]
    Database {
        message: String,
        operation: Option<String>,
        table: Option<String>,
    },

    #[error("Not found: {message}")]
    NotFound {
        message: String,
        resource_type: Option<String>,
        resource_id: Option<String>,
    },

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        resource_type: Option<String>,
        resource_id: Option<String>,
    },

    /// An operation did not finish in time
    #[error("Timeout: {message}")]
    Timeout {
        message: String,
        timeout: Option<Duration>,
        operation: Option<String>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// A validation error with no field context.
    pub fn validation(message: impl Into<String>) -> Self {
        McpError::Validation {
            message: message.into(),
            field: None,
            value: None,
        }
    }

    /// A validation error naming the offending field and value.
    pub fn invalid_field(
        message: impl Into<String>,
        field: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        McpError::Validation {
            message: message.into(),
            field: Some(field.into()),
            value: Some(value.to_string()),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        McpError::Configuration {
            message: message.into(),
            config_key: None,
        }
    }

    pub fn config_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        McpError::Configuration {
            message: message.into(),
            config_key: Some(key.into()),
        }
    }

    pub fn not_found(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        let resource_id = resource_id.into();
        McpError::NotFound {
            message: format!("{} '{}' not found", resource_type, resource_id),
            resource_type: Some(resource_type),
            resource_id: Some(resource_id),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        let operation = operation.into();
        McpError::Timeout {
            message: format!("{} timed out after {:.1}s", operation, timeout.as_secs_f64()),
            timeout: Some(timeout),
            operation: Some(operation),
        }
    }

    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            McpError::Validation { .. } => "VALIDATION_ERROR",
            McpError::Authentication { .. } => "AUTHENTICATION_ERROR",
            McpError::Authorization { .. } => "AUTHORIZATION_ERROR",
            McpError::RateLimit(_) => "RATE_LIMIT_ERROR",
            McpError::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            McpError::Configuration { .. } => "CONFIGURATION_ERROR",
            McpError::Database { .. } => "DATABASE_ERROR",
            McpError::NotFound { .. } => "NOT_FOUND_ERROR",
            McpError::Conflict { .. } => "CONFLICT_ERROR",
            McpError::Timeout { .. } => "TIMEOUT_ERROR",
            McpError::Unauthorized(_) => "UNAUTHORIZED",
            McpError::Forbidden(_) => "FORBIDDEN",
            McpError::Internal(_) | McpError::Io(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// HTTP status a transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            McpError::Validation { .. } => 400,
            McpError::Authentication { .. } | McpError::Unauthorized(_) => 401,
            McpError::Authorization { .. } | McpError::Forbidden(_) => 403,
            McpError::NotFound { .. } => 404,
            McpError::Conflict { .. } => 409,
            McpError::RateLimit(_) => 429,
            McpError::ExternalService { .. } => 502,
            McpError::Timeout { .. } => 504,
            McpError::Configuration { .. }
            | McpError::Database { .. }
            | McpError::Internal(_)
            | McpError::Io(_) => 500,
        }
    }

    /// The human-readable message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            McpError::Validation { message, .. }
            | McpError::Authentication { message, .. }
            | McpError::Authorization { message, .. }
            | McpError::ExternalService { message, .. }
            | McpError::Configuration { message, .. }
            | McpError::Database { message, .. }
            | McpError::NotFound { message, .. }
            | McpError::Conflict { message, .. }
            | McpError::Timeout { message, .. } => message.clone(),
            McpError::RateLimit(_) => "Rate limit exceeded".to_string(),
            McpError::Unauthorized(message)
            | McpError::Forbidden(message)
            | McpError::Internal(message) => message.clone(),
            McpError::Io(e) => e.to_string(),
        }
    }

    /// Structured context for the error envelope. Absent fields are omitted.
    pub fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                details.insert(key.to_string(), value);
            }
        };

        match self {
            McpError::Validation { field, value, .. } => {
                put("field", field.as_ref().map(|f| json!(f)));
                put("value", value.as_ref().map(|v| json!(v)));
            }
            McpError::Authentication { auth_type, .. } => {
                put("auth_type", auth_type.as_ref().map(|t| json!(t)));
            }
            McpError::Authorization {
                required_permission,
                ..
            } => {
                put(
                    "required_permission",
                    required_permission.as_ref().map(|p| json!(p)),
                );
            }
            McpError::RateLimit(exceeded) => {
                put("limit", Some(json!(exceeded.limit)));
                put("window", Some(json!(exceeded.window.as_secs())));
                put("retry_after", Some(json!(exceeded.retry_after)));
            }
            McpError::ExternalService {
                service,
                status_code,
                ..
            } => {
                put("service", service.as_ref().map(|s| json!(s)));
                put("status_code", status_code.map(|c| json!(c)));
            }
            McpError::Configuration { config_key, .. } => {
                put("config_key", config_key.as_ref().map(|k| json!(k)));
            }
            McpError::Database {
                operation, table, ..
            } => {
                put("operation", operation.as_ref().map(|o| json!(o)));
                put("table", table.as_ref().map(|t| json!(t)));
            }
            McpError::NotFound {
                resource_type,
                resource_id,
                ..
            }
            | McpError::Conflict {
                resource_type,
                resource_id,
                ..
            } => {
                put("resource_type", resource_type.as_ref().map(|t| json!(t)));
                put("resource_id", resource_id.as_ref().map(|i| json!(i)));
            }
            McpError::Timeout {
                timeout, operation, ..
            } => {
                put("timeout", timeout.map(|t| json!(t.as_secs_f64())));
                put("operation", operation.as_ref().map(|o| json!(o)));
            }
            McpError::Unauthorized(_)
            | McpError::Forbidden(_)
            | McpError::Internal(_)
            | McpError::Io(_) => {}
        }

        details
    }
}

impl From<config::ConfigError> for McpError {
    fn from(err: config::ConfigError) -> Self {
        let config_key = match &err {
            config::ConfigError::NotFound(key) => Some(key.clone()),
            config::ConfigError::Type { key, .. } => key.clone(),
            _ => None,
        };
        McpError::Configuration {
            message: err.to_string(),
            config_key,
        }
    }
}

/// Result type alias for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;
