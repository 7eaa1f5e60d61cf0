//! # MCP Server Core
//!
//! The transport-independent core of an MCP server: capability registries
//! with transactional mutations and change fan-out, the JSON-RPC request
//! dispatcher, and the streaming tool-call engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use strix_mcp_server::{McpServer, Tool};
//! use strix_mcp_protocol::{CallToolResult, ToolContent, ToolDefinition};
//!
//! # fn main() -> strix_mcp_protocol::McpResult<()> {
//! let server = McpServer::builder()
//!     .name("finance")
//!     .tool(Tool::single(
//!         ToolDefinition::new(
//!             "get_bitcoin_price",
//!             "Retrieves the current market price of Bitcoin.",
//!             json!({"type": "object", "properties": {}}),
//!         ),
//!         |_args| async {
//!             Ok(CallToolResult::success(vec![ToolContent::text(
//!                 "Bitcoin price is 89,123",
//!             )]))
//!         },
//!     ))
//!     .build()?;
//!
//! // Hand `server` to a transport; it drives `server.process_request(..)`
//! // and drains the resulting message stream.
//! # let _ = server;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod prompt;
pub mod registry;
pub mod resource;
pub mod server;
pub mod tool;

// Re-export main types
pub use builder::McpServerBuilder;
pub use prompt::Prompt;
pub use registry::{ChangeKind, ChangeListener, Registry, RegistryError};
pub use resource::Resource;
pub use server::{EventStream, McpServer, SERVER_VERSION};
pub use tool::{Tool, ToolEvent, ToolHandler};

// Re-export the wire types
pub use strix_mcp_protocol as protocol;
pub use strix_mcp_protocol::{McpError, McpResult};
