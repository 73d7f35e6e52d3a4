//! Starter tools for new MCP servers.
//!
//! Copy one of these when adding a tool to a new server.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::registry::McpTool;
use crate::error::{McpError, Result};

/// Greets someone by name.
#[derive(Debug, Default)]
pub struct HelloWorld;

#[async_trait]
impl McpTool for HelloWorld {
    fn name(&self) -> &str {
        "hello_world"
    }

    fn description(&self) -> &str {
        "Say hello to someone"
    }

    fn validate(&self, params: &Value) -> Result<()> {
        match params.get("name") {
            None | Some(Value::Null) => Ok(()),
            Some(Value::String(name)) if name.trim().is_empty() => {
                Err(McpError::invalid_field("Name cannot be empty", "name", name))
            }
            Some(Value::String(_)) => Ok(()),
            Some(other) => Err(McpError::invalid_field("Name must be a string", "name", other)),
        }
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("World");
        info!(name = %name, "Greeting");

        Ok(json!({ "greeting": format!("Hello, {}!", name) }))
    }
}

/// Looks up an item by id.
#[derive(Debug, Default)]
pub struct GetInfo;

#[async_trait]
impl McpTool for GetInfo {
    fn name(&self) -> &str {
        "get_info"
    }

    fn description(&self) -> &str {
        "Get information about an item"
    }

    fn validate(&self, params: &Value) -> Result<()> {
        match params.get("item_id").and_then(Value::as_str) {
            Some(id) if !id.trim().is_empty() => Ok(()),
            _ => Err(McpError::invalid_field(
                "Item ID cannot be empty",
                "item_id",
                params.get("item_id").cloned().unwrap_or(Value::Null),
            )),
        }
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let item_id = params
            .get("item_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .ok_or_else(|| McpError::validation("Item ID cannot be empty"))?;
        info!(item_id = %item_id, "Retrieving item info");

        Ok(json!({
            "id": item_id,
            "name": format!("Item {}", item_id),
            "description": "This is a template item",
            "created_at": "2024-01-01T00:00:00Z",
            "status": "active",
        }))
    }
}
