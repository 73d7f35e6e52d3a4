use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use mcp_common::config::McpConfig;
use mcp_common::logging;
use mcp_common::models::ToolRequest;
use mcp_common::tools::{register_template_tools, ToolRegistry};

/// Run MCP tools locally through the shared rate limiting and validation stack.
#[derive(Debug, Parser)]
#[command(name = "mcp-tool", version, about)]
struct Cli {
    /// Configuration file; environment variables override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the effective configuration as JSON
    Config,
    /// List registered tools
    Tools,
    /// Invoke a tool and print each response
    Call {
        /// Tool name
        tool: String,
        /// Parameters as a JSON object
        #[arg(short, long, default_value = "{}")]
        params: String,
        /// Caller identity used as the rate limit key
        #[arg(short, long)]
        user: Option<String>,
        /// Number of invocations
        #[arg(short, long, default_value_t = 1)]
        repeat: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = McpConfig::load_from(cli.config.as_ref())?;
    logging::init_from_config(&config)?;
    info!(version = env!("CARGO_PKG_VERSION"), environment = %config.environment, "Configuration loaded");

    let mut registry = ToolRegistry::from_config(&config)?;
    register_template_tools(&mut registry)?;

    match cli.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Tools => {
            for name in registry.names() {
                if let Some(tool) = registry.get(&name) {
                    println!("{:<16} {}", name, tool.description());
                }
            }
        }
        Command::Call {
            tool,
            params,
            user,
            repeat,
        } => {
            let params: Value = serde_json::from_str(&params)
                .map_err(|e| anyhow::anyhow!("--params is not valid JSON: {}", e))?;

            for _ in 0..repeat {
                let mut request = ToolRequest::new(tool.clone()).with_parameters(params.clone());
                request.user_id = user.clone();
                let response = registry.invoke(request).await;
                println!("{}", serde_json::to_string(&response)?);
            }
        }
    }

    Ok(())
}
