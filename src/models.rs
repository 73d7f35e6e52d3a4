//! Response envelopes shared by MCP servers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{McpError, Result};
use crate::ratelimit::RateLimitStatus;

/// Standard error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    /// Request ID for tracing
    #[serde(default)]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl From<&McpError> for ErrorResponse {
    fn from(err: &McpError) -> Self {
        Self {
            error: err.error_code().to_string(),
            message: err.message(),
            details: err.details(),
            timestamp: Utc::now(),
            request_id: None,
        }
    }
}

/// Standard success response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            timestamp: Utc::now(),
            request_id: None,
        }
    }
}

/// Quota information for a caller, suitable for response headers or bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    /// Wall-clock instant at which the oldest counted request leaves the window
    pub reset_time: DateTime<Utc>,
    /// Seconds to wait before retrying, set only when nothing remains
    #[serde(default)]
    pub retry_after: Option<u64>,
}

impl From<RateLimitStatus> for RateLimitInfo {
    fn from(status: RateLimitStatus) -> Self {
        let reset_time = chrono::Duration::from_std(status.reset_after)
            .ok()
            .and_then(|after| Utc::now().checked_add_signed(after))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            limit: status.limit,
            remaining: status.remaining,
            reset_time,
            retry_after: (status.remaining == 0).then(|| status.reset_after.as_secs()),
        }
    }
}

/// A tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    #[serde(default = "empty_object")]
    pub parameters: Value,
    #[serde(default)]
    pub request_id: Option<String>,
    /// Caller identity; also the rate limit key
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl ToolRequest {
    /// A request with no parameters and a fresh request id.
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters: empty_object(),
            request_id: Some(uuid::Uuid::new_v4().to_string()),
            user_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Outcome of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorResponse>,
    /// Execution time in seconds
    pub execution_time: f64,
    #[serde(default)]
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message: String,
}

impl ToolResponse {
    pub fn success(result: Value, message: impl Into<String>, execution_time: f64) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            execution_time,
            request_id: None,
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    pub fn failure(err: &McpError, execution_time: f64) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(ErrorResponse::from(err)),
            execution_time,
            request_id: None,
            timestamp: Utc::now(),
            message: err.message(),
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.request_id = request_id.clone();
        }
        self.request_id = request_id;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Pagination parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

const MAX_PAGE_SIZE: u64 = 100;

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
            sort_by: None,
            sort_order: SortOrder::default(),
        }
    }
}

impl PaginationParams {
    pub fn new(page: u64, page_size: u64) -> Result<Self> {
        let params = Self {
            page,
            page_size,
            ..Self::default()
        };
        params.validate()?;
        Ok(params)
    }

    /// Parse and check pagination from tool parameters.
    pub fn from_value(value: &Value) -> Result<Self> {
        let params: PaginationParams = serde_json::from_value(value.clone())
            .map_err(|e| McpError::validation(format!("Invalid pagination parameters: {}", e)))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(McpError::invalid_field("Page must be at least 1", "page", self.page));
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(McpError::invalid_field(
                format!("Page size must be between 1 and {}", MAX_PAGE_SIZE),
                "page_size",
                self.page_size,
            ));
        }
        Ok(())
    }

    /// Number of items to skip.
    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1)) * self.page_size
    }
}

/// A page of items with navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, params: &PaginationParams) -> Self {
        let page_size = params.page_size.max(1);
        let total_pages = total.div_ceil(page_size);
        Self {
            items,
            total,
            page: params.page,
            page_size,
            total_pages,
            has_next: params.page < total_pages,
            has_prev: params.page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RateLimitExceeded;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_error_response_from_rate_limit() {
        let err = McpError::from(RateLimitExceeded {
            limit: 3,
            window: Duration::from_secs(10),
            retry_after: 9,
        });
        let response = ErrorResponse::from(&err).with_request_id("req-1");

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["error"], json!("RATE_LIMIT_ERROR"));
        assert_eq!(body["message"], json!("Rate limit exceeded"));
        assert_eq!(body["details"]["retry_after"], json!(9));
        assert_eq!(body["request_id"], json!("req-1"));
        assert!(body["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_success_response_shape() {
        let response = SuccessResponse::new("Greeting generated successfully", Some(json!({"greeting": "Hello, Alice!"})));
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["greeting"], json!("Hello, Alice!"));
        assert_eq!(body["request_id"], Value::Null);

        let parsed: SuccessResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.timestamp, response.timestamp);
    }

    #[test]
    fn test_rate_limit_info_retry_after_only_when_exhausted() {
        let open = RateLimitInfo::from(RateLimitStatus {
            limit: 10,
            remaining: 4,
            reset_after: Duration::from_secs(30),
        });
        assert_eq!(open.retry_after, None);

        let exhausted = RateLimitInfo::from(RateLimitStatus {
            limit: 10,
            remaining: 0,
            reset_after: Duration::from_millis(30_900),
        });
        assert_eq!(exhausted.retry_after, Some(30));
        assert!(exhausted.reset_time > Utc::now());
    }

    #[test]
    fn test_rate_limit_info_saturates_distant_reset() {
        let info = RateLimitInfo::from(RateLimitStatus {
            limit: 1,
            remaining: 0,
            reset_after: Duration::from_secs(u64::MAX),
        });
        assert_eq!(info.reset_time, DateTime::<Utc>::MAX_UTC);
        assert_eq!(info.retry_after, Some(u64::MAX));
    }

    #[test]
    fn test_tool_request_defaults() {
        let request: ToolRequest = serde_json::from_value(json!({"tool_name": "hello_world"})).unwrap();
        assert_eq!(request.parameters, json!({}));
        assert!(request.user_id.is_none());

        let request = ToolRequest::new("get_info").with_user("alice");
        assert!(request.request_id.is_some());
        assert_eq!(request.user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn test_tool_failure_carries_error_envelope() {
        let err = McpError::validation("Name cannot be empty");
        let response = ToolResponse::failure(&err, 0.25).with_request_id(Some("req-9".into()));

        assert!(!response.success);
        assert_eq!(response.message, "Name cannot be empty");
        let error = response.error.unwrap();
        assert_eq!(error.error, "VALIDATION_ERROR");
        assert_eq!(error.request_id.as_deref(), Some("req-9"));
    }

    #[test]
    fn test_pagination_offset_and_bounds() {
        let params = PaginationParams::new(3, 25).unwrap();
        assert_eq!(params.offset(), 50);

        assert!(PaginationParams::new(0, 20).is_err());
        assert!(PaginationParams::new(1, 0).is_err());
        assert!(PaginationParams::new(1, 101).is_err());
    }

    #[test]
    fn test_pagination_from_value() {
        let params = PaginationParams::from_value(&json!({"page": 2, "sort_order": "desc"})).unwrap();
        assert_eq!(params.page, 2);
        assert_eq!(params.page_size, 20);
        assert_eq!(params.sort_order, SortOrder::Desc);

        let err = PaginationParams::from_value(&json!({"sort_order": "sideways"})).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_paginated_response_navigation() {
        let params = PaginationParams::new(2, 10).unwrap();
        let page = PaginatedResponse::new(vec![1, 2, 3], 23, &params);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_prev);

        let last = PaginatedResponse::new(vec![1], 21, &PaginationParams::new(3, 10).unwrap());
        assert!(!last.has_next);

        let empty: PaginatedResponse<u8> = PaginatedResponse::new(vec![], 0, &PaginationParams::default());
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }
}
