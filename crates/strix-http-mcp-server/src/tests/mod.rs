//! Endpoint-level tests: drive the handler with real HTTP requests and
//! read the responses (including SSE bodies) frame by frame.


use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Response};
use serde_json::{Value, json};

use strix_mcp_protocol::{CallToolResult, ToolContent, ToolDefinition};
use strix_mcp_server::{McpServer, Tool};

use crate::handler::{HEADER_SESSION_ID, McpBody, McpHttpHandler};
use crate::server::ServerConfig;

pub(crate) fn finance_server() -> McpServer {
    McpServer::builder()
        .name("finance")
        .tool(Tool::single(
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
            ),
            |_args| async {
                Ok(CallToolResult::success(vec![ToolContent::text(
                    "Bitcoin price is 89,123",
                )]))
            },
        ))
        .build()
        .expect("finance server builds")
}

pub(crate) fn test_handler() -> McpHttpHandler {
    McpHttpHandler::new(ServerConfig::default(), finance_server())
}

pub(crate) fn post_request(body: &Value, session: Option<&str>) -> Request<Full<Bytes>> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header("content-type", "application/json");
    if let Some(session_id) = session {
        builder = builder.header(HEADER_SESSION_ID, session_id);
    }
    builder
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

pub(crate) fn get_request(session: Option<&str>) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(Method::GET).uri("/mcp");
    if let Some(session_id) = session {
        builder = builder.header(HEADER_SESSION_ID, session_id);
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

pub(crate) fn delete_request(session: Option<&str>) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(Method::DELETE).uri("/mcp");
    if let Some(session_id) = session {
        builder = builder.header(HEADER_SESSION_ID, session_id);
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

pub(crate) async fn body_json(response: Response<McpBody>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub(crate) async fn body_text(response: Response<McpBody>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Next SSE chunk as text, bounded so a hung stream fails the test
pub(crate) async fn next_sse_chunk(body: &mut McpBody) -> String {
    let frame = tokio::time::timeout(std::time::Duration::from_secs(10), body.frame())
        .await
        .expect("sse frame within deadline")
        .expect("sse stream still open")
        .expect("sse frame ok");
    let data = frame.into_data().expect("data frame");
    String::from_utf8(data.to_vec()).unwrap()
}

/// Skip the `: connected` comment and any pings, returning the payload of
/// the next `event: message` block
pub(crate) async fn next_sse_message(body: &mut McpBody) -> Value {
    loop {
        let chunk = next_sse_chunk(body).await;
        if let Some(data_line) = chunk.lines().find(|line| line.starts_with("data: ")) {
            return serde_json::from_str(&data_line[6..]).unwrap();
        }
    }
}

pub(crate) fn session_header(response: &Response<McpBody>) -> String {
    response
        .headers()
        .get(HEADER_SESSION_ID)
        .expect("session id header present")
        .to_str()
        .unwrap()
        .to_string()
}
