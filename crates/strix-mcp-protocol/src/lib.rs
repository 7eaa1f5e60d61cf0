//! # Model Context Protocol (MCP) Wire Types
//!
//! This crate provides the wire-level types for building MCP servers:
//! JSON-RPC 2.0 envelopes, the MCP 2025-11-25 request/result shapes for
//! tools, prompts and resources, server-initiated notifications, and the
//! error taxonomy shared by all of them.
//!
//! Everything here is pure data. Serialization follows the MCP conventions:
//! camelCase field names, and fields absent on the wire are represented as
//! absent (`Option` + `skip_serializing_if`), not as `null`.

pub mod content;
pub mod initialize;
pub mod json_rpc;
pub mod notifications;
pub mod prompts;
pub mod resources;
pub mod tools;

// Re-export main types
pub use content::{Annotations, Icon, Role};
pub use initialize::{
    InitializeResult, PromptsCapabilities, ResourcesCapabilities, ServerCapabilities, ServerInfo,
    ToolsCapabilities,
};
pub use json_rpc::{
    JsonRpcError, JsonRpcErrorObject, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    JsonRpcVersion, OutboundMessage, RequestId,
};
pub use notifications::{
    LoggingLevel, LoggingMessageParams, ProgressNotificationParams, ProgressToken,
};
pub use prompts::{
    GetPromptResult, ListPromptsResult, PromptArgument, PromptContent, PromptDefinition,
    PromptMessage,
};
pub use resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceResult, ResourceContents,
    ResourceDefinition, ResourceTemplate,
};
pub use tools::{CallToolResult, ListToolsResult, ToolContent, ToolDefinition, ToolProgress};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// The MCP protocol version advertised by this implementation
pub const MCP_VERSION: &str = "2025-11-25";

/// Standard JSON-RPC 2.0 error codes, plus the MCP server-range codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// MCP-defined: `resources/read` against an unknown URI
    pub const RESOURCE_NOT_FOUND: i64 = -32002;
}

/// Common result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// Errors raised by MCP handlers and capability implementations.
///
/// Handlers return these; the dispatch boundary maps them onto wire error
/// objects with [`McpError::to_error_object`].
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Method '{0}' not supported")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    ToolExecution(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl McpError {
    /// Create an invalid-params error
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a tool execution error
    pub fn tool_execution(message: impl Into<String>) -> Self {
        Self::ToolExecution(message.into())
    }

    /// Map onto a JSON-RPC error object with the wire-exact code
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            McpError::MethodNotFound(method) => JsonRpcErrorObject::method_not_found(method),
            McpError::InvalidParams(msg) => JsonRpcErrorObject::invalid_params(msg),
            McpError::ResourceNotFound(uri) => JsonRpcErrorObject::resource_not_found(uri),
            McpError::Internal(msg) => {
                JsonRpcErrorObject::internal_error(Some(format!("Internal Server Error: {msg}")))
            }
            McpError::Validation(msg) => {
                JsonRpcErrorObject::internal_error(Some(format!("Validation error: {msg}")))
            }
            McpError::ToolExecution(msg) => JsonRpcErrorObject::internal_error(Some(msg.clone())),
            McpError::Serialization(err) => {
                JsonRpcErrorObject::internal_error(Some(format!("Serialization error: {err}")))
            }
        }
    }

    /// Build a complete JSON-RPC error response for this error
    pub fn to_error_response(&self, id: Option<RequestId>) -> JsonRpcError {
        JsonRpcError::new(id, self.to_error_object())
    }
}
