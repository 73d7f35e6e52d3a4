//! Input validation helpers for tool parameters.
//!
//! Every helper reports failure as [`McpError::Validation`] so tool handlers
//! can propagate with `?` and transports answer with a 400.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::error::{McpError, Result};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("Invalid email regex")
});

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+[A-Z]{2,6}\.?|localhost|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d+)?(?:/?|[/?]\S+)$",
    )
    .expect("Invalid URL regex")
});

/// Constraints for a string parameter.
#[derive(Debug, Clone)]
pub struct StringRules {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
}

impl Default for StringRules {
    fn default() -> Self {
        Self {
            required: true,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }
}

impl StringRules {
    pub fn optional() -> Self {
        Self {
            required: false,
            ..Self::default()
        }
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Require the value to match `pattern` from its start.
    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        let anchored = if pattern.starts_with('^') {
            pattern.to_string()
        } else {
            format!("^(?:{})", pattern)
        };
        let re = Regex::new(&anchored)
            .map_err(|e| McpError::config(format!("Invalid validation pattern: {}", e)))?;
        self.pattern = Some(re);
        Ok(self)
    }
}

/// Validate a string against `rules`, returning it trimmed.
///
/// Length and pattern are checked on the value as given; emptiness is
/// checked after trimming. An absent optional value yields `None`.
pub fn validate_str(value: Option<&str>, rules: &StringRules) -> Result<Option<String>> {
    let Some(value) = value else {
        if rules.required {
            return Err(McpError::validation("Value is required"));
        }
        return Ok(None);
    };

    let length = value.chars().count();
    if let Some(min) = rules.min_length {
        if length < min {
            return Err(McpError::validation(format!(
                "Value too short (minimum {} characters)",
                min
            )));
        }
    }
    if let Some(max) = rules.max_length {
        if length > max {
            return Err(McpError::validation(format!(
                "Value too long (maximum {} characters)",
                max
            )));
        }
    }
    if let Some(pattern) = &rules.pattern {
        if !pattern.is_match(value) {
            return Err(McpError::validation("Value does not match required pattern"));
        }
    }

    let trimmed = value.trim();
    if trimmed.is_empty() && rules.required {
        return Err(McpError::validation("Value cannot be empty"));
    }
    Ok(Some(trimmed.to_string()))
}

pub fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    if !EMAIL_RE.is_match(email) {
        return Err(McpError::invalid_field("Invalid email address", "email", email));
    }
    Ok(email.to_string())
}

/// Accepts http(s) URLs addressed by domain name, `localhost` or IPv4.
pub fn validate_url(url: &str) -> Result<String> {
    if !URL_RE.is_match(url) {
        return Err(McpError::invalid_field("Invalid URL format", "url", url));
    }
    Ok(url.to_string())
}

/// Accepts only the hyphenated 36-character form.
pub fn validate_uuid(value: &str) -> Result<uuid::Uuid> {
    if value.len() != 36 {
        return Err(McpError::invalid_field("Invalid UUID format", "uuid", value));
    }
    uuid::Uuid::try_parse(value)
        .map_err(|_| McpError::invalid_field("Invalid UUID format", "uuid", value))
}

/// Read an integer from a JSON number or a numeric string.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn validate_positive_integer(value: &Value) -> Result<u64> {
    match as_integer(value) {
        Some(n) if n > 0 => Ok(n as u64),
        Some(_) => Err(McpError::validation("Value must be positive")),
        None => Err(McpError::validation("Value must be a positive integer")),
    }
}

pub fn validate_non_negative_integer(value: &Value) -> Result<u64> {
    match as_integer(value) {
        Some(n) if n >= 0 => Ok(n as u64),
        Some(_) => Err(McpError::validation("Value must be non-negative")),
        None => Err(McpError::validation("Value must be a non-negative integer")),
    }
}

/// Require `value` to be one of `allowed`.
pub fn validate_one_of<'a>(value: &'a str, allowed: &[&str]) -> Result<&'a str> {
    if allowed.contains(&value) {
        Ok(value)
    } else {
        Err(McpError::validation(format!(
            "Invalid value. Must be one of: {:?}",
            allowed
        )))
    }
}

pub fn validate_list_length<T>(
    items: &[T],
    min_length: Option<usize>,
    max_length: Option<usize>,
) -> Result<()> {
    if let Some(min) = min_length {
        if items.len() < min {
            return Err(McpError::validation(format!(
                "List too short (minimum {} items)",
                min
            )));
        }
    }
    if let Some(max) = max_length {
        if items.len() > max {
            return Err(McpError::validation(format!(
                "List too long (maximum {} items)",
                max
            )));
        }
    }
    Ok(())
}

/// Check that `object` has every required key and, when `optional` is
/// given, no key outside `required` and `optional`.
pub fn validate_object_keys(
    object: &Map<String, Value>,
    required: &[&str],
    optional: Option<&[&str]>,
) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(McpError::validation(format!(
            "Missing required keys: {:?}",
            missing
        )));
    }

    if let Some(optional) = optional {
        let mut unknown: Vec<&str> = object
            .keys()
            .map(String::as_str)
            .filter(|key| !required.contains(key) && !optional.contains(key))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(McpError::validation(format!("Invalid keys: {:?}", unknown)));
        }
    }
    Ok(())
}

/// Require each field to be present, non-null, and not blank if a string.
pub fn require_fields(params: &Value, fields: &[&str]) -> Result<()> {
    for field in fields {
        match params.get(*field) {
            None => {
                return Err(McpError::invalid_field(
                    format!("Required field '{}' is missing", field),
                    *field,
                    "",
                ))
            }
            Some(Value::Null) => {
                return Err(McpError::invalid_field(
                    format!("Field '{}' cannot be empty", field),
                    *field,
                    "null",
                ))
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(McpError::invalid_field(
                    format!("Field '{}' cannot be empty", field),
                    *field,
                    s,
                ))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Strip control characters other than tab, newline and carriage return,
/// trim, and cut to `max_length` characters.
pub fn sanitize_string(value: &str, max_length: Option<usize>) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect();
    let trimmed = cleaned.trim();
    match max_length {
        Some(max) => trimmed.chars().take(max).collect(),
        None => trimmed.to_string(),
    }
}
