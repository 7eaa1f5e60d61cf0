//! Fluent builder for [`McpServer`]

use strix_mcp_protocol::{McpError, McpResult, ResourceTemplate};

use crate::prompt::Prompt;
use crate::resource::Resource;
use crate::server::{McpServer, SERVER_VERSION};
use crate::tool::Tool;

/// Builder for an [`McpServer`]. Capabilities registered here are validated
/// and installed without firing change notifications (there are no
/// subscribers yet).
#[derive(Default)]
pub struct McpServerBuilder {
    name: Option<String>,
    version: Option<String>,
    instructions: Option<String>,
    tools: Vec<Tool>,
    prompts: Vec<Prompt>,
    resources: Vec<Resource>,
    resource_templates: Vec<ResourceTemplate>,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server name reported in `serverInfo` (required)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Server version reported in `serverInfo`; defaults to [`SERVER_VERSION`]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Client-facing usage instructions for the initialize result
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Tool>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn prompt(mut self, prompt: Prompt) -> Self {
        self.prompts.push(prompt);
        self
    }

    pub fn resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn resource_template(mut self, template: ResourceTemplate) -> Self {
        self.resource_templates.push(template);
        self
    }

    pub fn build(self) -> McpResult<McpServer> {
        let name = self
            .name
            .ok_or_else(|| McpError::validation("server name is required"))?;
        let version = self.version.unwrap_or_else(|| SERVER_VERSION.to_string());

        for tool in &self.tools {
            tool.definition.validate()?;
        }

        let server = McpServer::construct(name, version, self.instructions);
        server
            .tools
            .add(self.tools, false)
            .map_err(|e| McpError::validation(e.to_string()))?;
        server
            .prompts
            .add(self.prompts, false)
            .map_err(|e| McpError::validation(e.to_string()))?;
        server
            .resources
            .add(self.resources, false)
            .map_err(|e| McpError::validation(e.to_string()))?;
        server
            .resource_templates
            .add(self.resource_templates, false)
            .map_err(|e| McpError::validation(e.to_string()))?;

        Ok(server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strix_mcp_protocol::{CallToolResult, ToolContent, ToolDefinition};

    fn echo_tool(name: &str) -> Tool {
        Tool::single(
            ToolDefinition::new(name, "echo", json!({"type": "object"})),
            |_args| async { Ok(CallToolResult::success(vec![ToolContent::text("ok")])) },
        )
    }

    #[test]
    fn test_build_requires_name() {
        assert!(McpServerBuilder::new().build().is_err());
    }

    #[test]
    fn test_build_defaults_version() {
        let server = McpServer::builder().name("finance").build().unwrap();
        assert_eq!(server.name(), "finance");
        assert_eq!(server.version(), SERVER_VERSION);
    }

    #[test]
    fn test_build_installs_capabilities() {
        let server = McpServer::builder()
            .name("finance")
            .version("2.1.0")
            .tool(echo_tool("echo"))
            .resource(Resource::text("file:///a", "a", "text/plain", "x"))
            .resource_template(ResourceTemplate::new("file:///{p}", "files"))
            .build()
            .unwrap();

        assert_eq!(server.version(), "2.1.0");
        assert_eq!(server.tools.len(), 1);
        assert_eq!(server.resources.len(), 1);
        assert_eq!(server.resource_templates.len(), 1);
    }

    #[test]
    fn test_build_rejects_invalid_tool_name() {
        let result = McpServer::builder()
            .name("finance")
            .tool(echo_tool("bad name"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_rejects_duplicate_tools() {
        let result = McpServer::builder()
            .name("finance")
            .tool(echo_tool("echo"))
            .tool(echo_tool("echo"))
            .build();
        assert!(result.is_err());
    }
}
