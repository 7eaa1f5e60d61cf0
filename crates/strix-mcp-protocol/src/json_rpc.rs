//! JSON-RPC 2.0 envelopes
//!
//! The request, response, error and notification shapes that frame every
//! MCP message, plus [`OutboundMessage`], the union the dispatcher emits.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error_codes;

/// Marker for the `"jsonrpc"` field; only `"2.0"` is valid on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonRpcVersion {
    #[default]
    #[serde(rename = "2.0")]
    V2_0,
}

/// A request id: string or integer per JSON-RPC 2.0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// An incoming JSON-RPC request.
///
/// A request without an `id` is a notification: it must never elicit a
/// response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    /// Create a notification (no id, no response due)
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
            id: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Params as a JSON object, if they are one
    pub fn params_object(&self) -> Option<&Map<String, Value>> {
        self.params.as_ref().and_then(Value::as_object)
    }

    /// Get a named parameter (object params only)
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params_object().and_then(|map| map.get(name))
    }
}

/// A successful JSON-RPC response. Errors are a separate shape
/// ([`JsonRpcError`]); exactly one of the two is ever sent per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result,
        }
    }

    /// Serialize a result payload into a response, e.g. for typed results
    pub fn of<T: Serialize>(id: RequestId, result: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(id, serde_json::to_value(result)?))
    }

    /// The `{}` result used by `ping`
    pub fn empty(id: RequestId) -> Self {
        Self::new(id, Value::Object(Map::new()))
    }
}

/// JSON-RPC error object (the `error` member of an error response)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::PARSE_ERROR, message, None)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_REQUEST, message, None)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method '{}' not supported", method),
            None,
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message, None)
    }

    pub fn internal_error(message: Option<String>) -> Self {
        Self::new(
            error_codes::INTERNAL_ERROR,
            message.unwrap_or_else(|| "Internal error".to_string()),
            None,
        )
    }

    pub fn resource_not_found(uri: &str) -> Self {
        Self::new(
            error_codes::RESOURCE_NOT_FOUND,
            "Resource not found",
            Some(serde_json::json!({ "uri": uri })),
        )
    }
}

/// A JSON-RPC error response.
///
/// `id` is always serialized, as `null` when the request id was
/// unrecoverable (parse errors).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            error,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(None, JsonRpcErrorObject::parse_error(message))
    }

    pub fn invalid_request(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::new(id, JsonRpcErrorObject::invalid_request(message))
    }

    pub fn method_not_found(id: Option<RequestId>, method: &str) -> Self {
        Self::new(id, JsonRpcErrorObject::method_not_found(method))
    }

    pub fn invalid_params(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::new(id, JsonRpcErrorObject::invalid_params(message))
    }

    pub fn internal_error(id: Option<RequestId>, message: Option<String>) -> Self {
        Self::new(id, JsonRpcErrorObject::internal_error(message))
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JSON-RPC error {}: {}",
            self.error.code, self.error.message
        )
    }
}

impl std::error::Error for JsonRpcError {}

/// An outbound server-initiated notification (no id, no response expected)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
        }
    }
}

/// Union of everything the dispatcher can emit for a request: a success
/// response, an error response, or an interleaved notification (progress).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Response(JsonRpcResponse),
    Error(JsonRpcError),
    Notification(JsonRpcNotification),
}

impl OutboundMessage {
    pub fn is_error(&self) -> bool {
        matches!(self, OutboundMessage::Error(_))
    }

    /// The request id this message answers, if any
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            OutboundMessage::Response(resp) => Some(&resp.id),
            OutboundMessage::Error(err) => err.id.as_ref(),
            OutboundMessage::Notification(_) => None,
        }
    }
}

impl From<JsonRpcResponse> for OutboundMessage {
    fn from(response: JsonRpcResponse) -> Self {
        OutboundMessage::Response(response)
    }
}

impl From<JsonRpcError> for OutboundMessage {
    fn from(error: JsonRpcError) -> Self {
        OutboundMessage::Error(error)
    }
}

impl From<JsonRpcNotification> for OutboundMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        OutboundMessage::Notification(notification)
    }
}
