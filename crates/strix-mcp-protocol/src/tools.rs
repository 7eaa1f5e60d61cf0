//! Tool wire types
//!
//! [`ToolDefinition`] is the catalogue entry shown by `tools/list`;
//! [`CallToolResult`] is the payload of a `tools/call` response. Tool-level
//! failures (missing tool, timeout, producer error) travel as a successful
//! JSON-RPC response whose result has `isError: true` - a tool's failure is
//! data about the tool, not a transport error.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{Annotations, Icon};
use crate::resources::ResourceContents;
use crate::{McpError, McpResult};

/// Tool names: 1-128 chars of `[A-Za-z0-9_.-]`
pub const TOOL_NAME_MAX_LEN: usize = 128;

lazy_static! {
    static ref TOOL_NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap();
}

/// Entry in the `tools/list` catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    /// JSON Schema describing the `arguments` object
    pub input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icons: Option<Vec<Icon>>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: description.into(),
            input_schema,
            output_schema: None,
            icons: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_output_schema(mut self, output_schema: Value) -> Self {
        self.output_schema = Some(output_schema);
        self
    }

    pub fn with_icons(mut self, icons: Vec<Icon>) -> Self {
        self.icons = Some(icons);
        self
    }

    /// Check the name grammar and any attached icons
    pub fn validate(&self) -> McpResult<()> {
        if self.name.is_empty() || self.name.len() > TOOL_NAME_MAX_LEN {
            return Err(McpError::validation(format!(
                "Invalid tool name '{}': must be 1-{} characters",
                self.name, TOOL_NAME_MAX_LEN
            )));
        }
        if !TOOL_NAME_RE.is_match(&self.name) {
            return Err(McpError::validation(format!(
                "Invalid tool name '{}'",
                self.name
            )));
        }
        if let Some(icons) = &self.icons {
            for icon in icons {
                icon.validate()?;
            }
        }
        Ok(())
    }
}

/// One block of tool output content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    Resource {
        resource: ResourceContents,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    ResourceLink {
        uri: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        ToolContent::Text {
            text: text.into(),
            annotations: None,
        }
    }

    pub fn resource(resource: ResourceContents) -> Self {
        ToolContent::Resource {
            resource,
            annotations: None,
        }
    }
}

/// Result payload for `tools/call`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    pub is_error: bool,
}

impl CallToolResult {
    pub fn success(content: Vec<ToolContent>) -> Self {
        Self {
            content,
            structured_content: None,
            is_error: false,
        }
    }

    /// A tool-level error carried inside a successful JSON-RPC envelope
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(message)],
            structured_content: None,
            is_error: true,
        }
    }

    pub fn with_structured_content(mut self, structured_content: Value) -> Self {
        self.structured_content = Some(structured_content);
        self
    }
}

/// Result payload for `tools/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<ToolDefinition>,
    /// Pagination is not implemented; always absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl ListToolsResult {
    pub fn new(tools: Vec<ToolDefinition>) -> Self {
        Self {
            tools,
            next_cursor: None,
        }
    }
}

/// Intermediate progress emitted by a streaming tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolProgress {
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolProgress {
    pub fn new(progress: f64) -> Self {
        Self {
            progress,
            total: None,
            message: None,
        }
    }

    pub fn with_total(mut self, total: f64) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
