//! Registered resources
//!
//! A resource pairs its catalogue definition with the contents served by
//! `resources/read`. The identity key is the contents URI.

use strix_mcp_protocol::{ResourceContents, ResourceDefinition};

/// A resource registered with the server, keyed by `data.uri()`
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub definition: ResourceDefinition,
    pub data: ResourceContents,
}

impl Resource {
    pub fn new(definition: ResourceDefinition, data: ResourceContents) -> Self {
        Self { definition, data }
    }

    /// Convenience constructor for a plain text resource
    pub fn text(
        uri: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let uri = uri.into();
        let mime_type = mime_type.into();
        Self {
            definition: ResourceDefinition::new(uri.clone(), name).with_mime_type(mime_type.clone()),
            data: ResourceContents::text(uri, mime_type, text),
        }
    }

    /// The identity key used by the registry
    pub fn uri(&self) -> &str {
        self.data.uri()
    }
}
