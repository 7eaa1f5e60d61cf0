//! Finance demo server
//!
//! Serves a single `get_bitcoin_price` tool over the HTTP+SSE transport:
//!
//! ```bash
//! cargo run -p finance-server -- --port 8000
//! curl -X POST http://127.0.0.1:8000/mcp \
//!   -H 'Content-Type: application/json' \
//!   -d '{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}'
//! ```

use clap::Parser;
use serde_json::json;
use tracing::info;

use strix_http_mcp_server::{HttpServer, ServerConfig};
use strix_mcp_protocol::{CallToolResult, McpResult, ToolContent, ToolDefinition};
use strix_mcp_server::{McpServer, Tool};

#[derive(Parser)]
#[command(name = "finance-server", about = "Demo MCP server with a Bitcoin price tool")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

fn bitcoin_tool() -> Tool {
    Tool::single(
        ToolDefinition::new(
            "get_bitcoin_price",
            "Retrieves the current market price of Bitcoin.",
            json!({
                "type": "object",
                "properties": {
                    "currency": {
                        "type": "string",
                        "description": "The fiat currency to display the price in (e.g., USD, EUR)",
                        "default": "USD"
                    }
                },
                "required": []
            }),
        )
        .with_title("Bitcoin Price Checker"),
        |_args| async {
            Ok(CallToolResult::success(vec![ToolContent::text(
                "Bitcoin price is 89,123",
            )]))
        },
    )
}

fn create_server() -> McpResult<McpServer> {
    McpServer::builder().name("finance").tool(bitcoin_tool()).build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let server = create_server()?;
    info!("created '{}' server with {} tool(s)", server.name(), server.tools.len());

    let config = ServerConfig {
        bind_address: format!("{}:{}", args.bind, args.port).parse()?,
        ..ServerConfig::default()
    };

    HttpServer::new(config, server).run().await?;
    Ok(())
}
