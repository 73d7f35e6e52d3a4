//! Tool trait and registry.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn, Instrument};

use crate::config::McpConfig;
use crate::error::{McpError, Result};
use crate::logging::request_span;
use crate::models::{RateLimitInfo, ToolRequest, ToolResponse};
use crate::ratelimit::{
    Clock, MonotonicClock, RateLimitConfig, RateLimitPolicies, RateLimiter, DEFAULT_KEY,
};

/// A callable tool exposed by an MCP server.
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Unique name the tool is invoked by.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Check parameters before execution. Accepts everything by default.
    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    /// Run the tool.
    async fn execute(&self, params: Value) -> Result<Value>;
}

/// Registry of tools, each guarded by its own rate limiter.
///
/// Callers are partitioned by [`ToolRequest::user_id`]; requests without one
/// share the `"default"` key.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn McpTool>>,
    policies: RateLimitPolicies,
    /// One limiter per rate-limited tool
    limiters: HashMap<String, RateLimiter>,
    clock: Arc<dyn Clock>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("policies", &self.policies)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ToolRegistry {
    /// An empty registry with no rate limits and no timeout.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            policies: RateLimitPolicies::new(),
            limiters: HashMap::new(),
            clock: Arc::new(MonotonicClock),
            timeout: None,
        }
    }

    /// A registry limited and timed out as `config` specifies.
    ///
    /// The configured process-wide limit becomes the default rule; a policy
    /// file, when named, adds tool-specific rules and may replace the default.
    pub fn from_config(config: &McpConfig) -> Result<Self> {
        let mut policies = RateLimitPolicies::with_default(config.rate_limit_rule());
        if let Some(path) = &config.rate_limit_policy_path {
            let file = RateLimitPolicies::from_file(path)?;
            if file.default.is_some() {
                policies.default = file.default;
            }
            policies.tools.extend(file.tools);
        }

        let mut registry = Self::new().with_policies(policies)?;
        registry.timeout = config.tool_timeout();
        Ok(registry)
    }

    /// Replace the rate limit policies, rebuilding limiters for tools
    /// already registered. Existing quotas start over.
    pub fn with_policies(mut self, policies: RateLimitPolicies) -> Result<Self> {
        policies.validate()?;
        self.policies = policies;
        self.rebuild_limiters()?;
        Ok(self)
    }

    /// Bound each tool execution.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read time for rate limiting from `clock`. Existing quotas start over.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Result<Self> {
        self.clock = clock;
        self.rebuild_limiters()?;
        Ok(self)
    }

    fn rebuild_limiters(&mut self) -> Result<()> {
        self.limiters.clear();
        let names: Vec<String> = self.tools.keys().cloned().collect();
        for name in names {
            self.install_limiter(&name)?;
        }
        Ok(())
    }

    fn install_limiter(&mut self, name: &str) -> Result<()> {
        match self.policies.rule_for(name) {
            Some(rule) => {
                let limiter = RateLimiter::with_clock(RateLimitConfig::from(rule), self.clock.clone())?;
                self.limiters.insert(name.to_string(), limiter);
            }
            None => {
                self.limiters.remove(name);
            }
        }
        Ok(())
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn McpTool>) -> Result<()> {
        let name = tool.name().to_string();
        if name.trim().is_empty() {
            return Err(McpError::validation("Tool name cannot be empty"));
        }

        self.install_limiter(&name)?;
        info!(
            tool = %name,
            rate_limited = self.limiters.contains_key(&name),
            "Registered tool"
        );
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn McpTool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Quota left for `key` on `tool`, or `None` if the tool is not limited.
    pub fn rate_limit_info(&self, tool: &str, key: &str) -> Option<RateLimitInfo> {
        self.limiters
            .get(tool)
            .map(|limiter| RateLimitInfo::from(limiter.status(key)))
    }

    /// Run a tool: look it up, charge the caller's quota, validate, execute.
    ///
    /// A refused request is not validated or executed and does not count
    /// against any other tool.
    #[instrument(skip(self, request), fields(tool = %request.tool_name))]
    pub async fn execute(&self, request: ToolRequest) -> Result<Value> {
        let tool = self
            .get(&request.tool_name)
            .ok_or_else(|| McpError::not_found("tool", request.tool_name.clone()))?;

        let key = request.user_id.as_deref().unwrap_or(DEFAULT_KEY);
        if let Some(limiter) = self.limiters.get(&request.tool_name) {
            limiter.check(key)?;
        }

        tool.validate(&request.parameters)?;

        debug!(key = %key, "Executing tool");
        let run = tool.execute(request.parameters);
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, run)
                .await
                .map_err(|_| McpError::timeout(format!("tool '{}'", request.tool_name), timeout))?,
            None => run.await,
        }
    }

    /// Run a tool and wrap the outcome in a [`ToolResponse`]. Never fails.
    pub async fn invoke(&self, request: ToolRequest) -> ToolResponse {
        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let span = request_span(&request_id, request.user_id.as_deref());
        let tool_name = request.tool_name.clone();

        let started = Instant::now();
        let outcome = self.execute(request).instrument(span.clone()).await;
        let elapsed = started.elapsed().as_secs_f64();

        let response = match outcome {
            Ok(result) => ToolResponse::success(result, format!("Tool '{}' completed", tool_name), elapsed),
            Err(err) => {
                span.in_scope(|| {
                    warn!(
                        tool = %tool_name,
                        error_code = err.error_code(),
                        error = %err,
                        "Tool invocation failed"
                    );
                });
                ToolResponse::failure(&err, elapsed)
            }
        };
        response.with_request_id(Some(request_id))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
