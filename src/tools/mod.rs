//! Tool abstraction, registry, and starter tools.

mod registry;
mod template;

pub use registry::{McpTool, ToolRegistry};
pub use template::{GetInfo, HelloWorld};

use std::sync::Arc;

use crate::error::Result;

/// Register the starter tools on `registry`.
pub fn register_template_tools(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(Arc::new(HelloWorld))?;
    registry.register(Arc::new(GetInfo))?;
    Ok(())
}
