//! Server-initiated notifications
//!
//! Builders for the notifications this server emits: list-change fan-outs,
//! per-call progress, and the reserved `notifications/message` logging
//! shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json_rpc::JsonRpcNotification;

/// Correlates a progress notification to its originating `tools/call`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    String(String),
    Number(i64),
}

impl ProgressToken {
    /// Accepts the wire forms a client may supply (string or integer)
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(ProgressToken::String(s.clone())),
            Value::Number(n) => n.as_i64().map(ProgressToken::Number),
            _ => None,
        }
    }
}

/// Params of `notifications/progress`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNotificationParams {
    pub progress_token: ProgressToken,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Build a `notifications/progress` notification
pub fn progress(params: ProgressNotificationParams) -> JsonRpcNotification {
    JsonRpcNotification::new(
        "notifications/progress",
        Some(serde_json::to_value(params).unwrap_or_default()),
    )
}

/// Build a `notifications/tools/list_changed` notification
pub fn tools_list_changed() -> JsonRpcNotification {
    JsonRpcNotification::new("notifications/tools/list_changed", None)
}

/// Build a `notifications/prompts/list_changed` notification
pub fn prompts_list_changed() -> JsonRpcNotification {
    JsonRpcNotification::new("notifications/prompts/list_changed", None)
}

/// Build a `notifications/resources/list_changed` notification
pub fn resources_list_changed() -> JsonRpcNotification {
    JsonRpcNotification::new("notifications/resources/list_changed", None)
}

/// Severity ladder for `notifications/message`, per RFC 5424.
/// Deserialization rejects anything outside the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LoggingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggingLevel::Debug => "debug",
            LoggingLevel::Info => "info",
            LoggingLevel::Notice => "notice",
            LoggingLevel::Warning => "warning",
            LoggingLevel::Error => "error",
            LoggingLevel::Critical => "critical",
            LoggingLevel::Alert => "alert",
            LoggingLevel::Emergency => "emergency",
        }
    }
}

/// Params of `notifications/message`. Reserved: the types are wire-complete
/// but nothing emits them yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingMessageParams {
    pub level: LoggingLevel,
    pub logger: String,
    pub data: Value,
}

/// Build a `notifications/message` notification
pub fn logging_message(params: LoggingMessageParams) -> JsonRpcNotification {
    JsonRpcNotification::new(
        "notifications/message",
        Some(serde_json::to_value(params).unwrap_or_default()),
    )
}
