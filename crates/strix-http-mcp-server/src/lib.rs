//! # HTTP + SSE Transport for MCP Servers
//!
//! A three-method HTTP endpoint carrying the whole protocol:
//!
//! - **POST /mcp** - client JSON-RPC traffic. `initialize` is answered
//!   synchronously and binds the session; everything else is dispatched in
//!   the background (202 Accepted) with results delivered over SSE.
//! - **GET /mcp** - subscribes the session to its Server-Sent-Events
//!   stream, draining the session's outbound queue.
//! - **DELETE /mcp** - tears the session down.
//!
//! Sessions are owned here, not by the server core: the core dispatcher
//! only ever sees JSON-RPC requests and emits message streams. An idle
//! reaper removes sessions without activity past the configured timeout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strix_http_mcp_server::{HttpServer, ServerConfig};
//! use strix_mcp_server::McpServer;
//!
//! #[tokio::main]
//! async fn main() -> strix_http_mcp_server::Result<()> {
//!     let server = McpServer::new("finance");
//!     HttpServer::new(ServerConfig::default(), server).run().await
//! }
//! ```

pub mod handler;
pub mod server;
pub mod session;
pub mod sse;

#[cfg(test)]
mod tests;

// Re-export main types
pub use handler::{HEADER_SESSION_ID, McpBody, McpHttpHandler};
pub use server::{HttpServer, ServerConfig};
pub use session::{Session, SessionTable};
pub use sse::SseStreamBody;

/// Transport-level errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;
