//! MCP Common - shared support library for MCP servers
//!
//! MCP servers are thin adapters exposing external services as callable
//! tools. This crate holds what every server needs around those tools:
//! configuration, structured logging, input validation, a uniform error
//! taxonomy and response envelopes, and per-caller sliding-window rate
//! limiting with burst allowance.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod ratelimit;
pub mod tools;
pub mod validation;

pub use config::McpConfig;
pub use error::{McpError, RateLimitExceeded, Result};
pub use ratelimit::{RateLimitConfig, RateLimiter};
pub use tools::{McpTool, ToolRegistry};
