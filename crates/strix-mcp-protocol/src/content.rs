//! Shared content metadata: icons, annotations, roles
//!
//! Icons are display hints for tools, resources and prompts. Most
//! capability definitions do not need them.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{McpError, McpResult};

lazy_static! {
    /// Icon size grammar: `"any"` or `WIDTHxHEIGHT` with positive decimal
    /// dimensions (no leading zeros, lowercase `x`).
    static ref ICON_SIZE_RE: Regex = Regex::new(r"^(any|[1-9]\d*x[1-9]\d*)$").unwrap();
}

/// Audience role for annotated content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Icon attached to a capability definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Icon {
    /// Icon source URL (data: URI or https:// URL)
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Size hints, e.g. `["16x16", "any"]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<String>>,
}

impl Icon {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            mime_type: None,
            sizes: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_sizes(mut self, sizes: Vec<String>) -> Self {
        self.sizes = Some(sizes);
        self
    }

    /// Check every size hint against the icon size grammar
    pub fn validate(&self) -> McpResult<()> {
        if let Some(sizes) = &self.sizes {
            for size in sizes {
                if !ICON_SIZE_RE.is_match(size) {
                    return Err(McpError::validation(format!(
                        "Invalid size '{}'. Must be 'any' or 'WIDTHxHEIGHT'.",
                        size
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Display annotations on content blocks and resource definitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<Role>>,
    /// Importance in `[0.0, 1.0]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl Annotations {
    pub fn validate(&self) -> McpResult<()> {
        if let Some(priority) = self.priority {
            if !(0.0..=1.0).contains(&priority) {
                return Err(McpError::validation(format!(
                    "priority {} out of range [0.0, 1.0]",
                    priority
                )));
            }
        }
        Ok(())
    }
}
