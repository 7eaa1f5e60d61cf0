//! MCP server core: registries, dispatcher, tool-call engine, fan-out
//!
//! [`McpServer::process_request`] turns one JSON-RPC request into a finite
//! lazy sequence of outbound messages. Capability mutations synthesize
//! `notifications/*/list_changed` events and hand them to every subscriber
//! over a bounded channel; a slow subscriber loses events rather than
//! blocking the mutating caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tracing::{debug, warn};

use strix_mcp_protocol::{
    CallToolResult, InitializeResult, JsonRpcError, JsonRpcErrorObject, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListPromptsResult, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, OutboundMessage, ProgressNotificationParams,
    ProgressToken, ReadResourceResult, RequestId, ResourceTemplate, notifications,
};

use crate::prompt::Prompt;
use crate::registry::Registry;
use crate::resource::Resource;
use crate::tool::{Tool, ToolEvent};
use crate::McpServerBuilder;

/// Version reported in `serverInfo` unless overridden by the builder
pub const SERVER_VERSION: &str = "1.0.0";

/// Events buffered per subscriber before new ones are dropped
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

/// Bounded per-subscriber channels; one misbehaving subscriber cannot
/// affect its siblings.
#[derive(Default)]
struct FanOut {
    subscribers: RwLock<Vec<mpsc::Sender<JsonRpcNotification>>>,
    dropped: AtomicU64,
}

impl FanOut {
    fn subscribe(&self) -> mpsc::Receiver<JsonRpcNotification> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Non-blocking send to every live subscriber. Full channels drop the
    /// event (counted); closed subscribers are pruned.
    fn broadcast(&self, event: JsonRpcNotification) {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(method = %event.method, "subscriber channel full, dropping event");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

/// Receiving side of a [`McpServer::subscribe`] registration
pub struct EventStream {
    rx: mpsc::Receiver<JsonRpcNotification>,
}

impl EventStream {
    /// Next server-initiated event, or `None` once the server is gone
    pub async fn recv(&mut self) -> Option<JsonRpcNotification> {
        self.rx.recv().await
    }
}

/// The MCP server core: capability registries plus the request dispatcher.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct McpServer {
    name: Arc<str>,
    version: Arc<str>,
    instructions: Option<Arc<str>>,
    pub tools: Arc<Registry<Tool>>,
    pub prompts: Arc<Registry<Prompt>>,
    pub resources: Arc<Registry<Resource>>,
    pub resource_templates: Arc<Registry<ResourceTemplate>>,
    fan_out: Arc<FanOut>,
}

impl McpServer {
    pub fn new(name: impl Into<String>) -> Self {
        Self::construct(name.into(), SERVER_VERSION.to_string(), None)
    }

    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    pub(crate) fn construct(name: String, version: String, instructions: Option<String>) -> Self {
        let fan_out = Arc::new(FanOut::default());

        let tools = {
            let fan_out = Arc::clone(&fan_out);
            Arc::new(Registry::with_listener(
                |tool: &Tool| tool.name().to_string(),
                Box::new(move |_| fan_out.broadcast(notifications::tools_list_changed())),
            ))
        };
        let prompts = {
            let fan_out = Arc::clone(&fan_out);
            Arc::new(Registry::with_listener(
                |prompt: &Prompt| prompt.name().to_string(),
                Box::new(move |_| fan_out.broadcast(notifications::prompts_list_changed())),
            ))
        };
        let resources = {
            let fan_out = Arc::clone(&fan_out);
            Arc::new(Registry::with_listener(
                |resource: &Resource| resource.uri().to_string(),
                Box::new(move |_| fan_out.broadcast(notifications::resources_list_changed())),
            ))
        };
        // Template changes carry no notification
        let resource_templates = Arc::new(Registry::new(|template: &ResourceTemplate| {
            template.name.clone()
        }));

        Self {
            name: name.into(),
            version: version.into(),
            instructions: instructions.map(Arc::from),
            tools,
            prompts,
            resources,
            resource_templates,
            fan_out,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Register for server-initiated events (list-change fan-outs)
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            rx: self.fan_out.subscribe(),
        }
    }

    /// Push an event to every subscriber
    pub fn notify_clients(&self, event: JsonRpcNotification) {
        self.fan_out.broadcast(event);
    }

    /// Events lost to full subscriber channels since startup
    pub fn events_dropped(&self) -> u64 {
        self.fan_out.dropped.load(Ordering::Relaxed)
    }

    /// Dispatch one request into a finite stream of outbound messages.
    ///
    /// Requests without an id are notifications and produce nothing.
    /// Handler failures surface as error envelopes; nothing escapes the
    /// stream.
    pub fn process_request(&self, request: JsonRpcRequest) -> BoxStream<'static, OutboundMessage> {
        let server = self.clone();
        Box::pin(stream! {
            if request.method == "notifications/initialized" {
                debug!("client completed initialization");
                return;
            }
            let Some(id) = request.id.clone() else {
                debug!(method = %request.method, "ignoring client notification");
                return;
            };

            match request.method.as_str() {
                "initialize" => yield server.handle_initialize(id),
                "ping" => yield JsonRpcResponse::empty(id).into(),
                "tools/list" => yield server.handle_tools_list(id),
                "tools/call" => {
                    let mut call = server.handle_tools_call(id, request.params);
                    while let Some(item) = call.next().await {
                        yield item;
                    }
                }
                "prompts/list" => yield server.handle_prompts_list(id),
                "prompts/get" => yield server.handle_prompts_get(id, request.params).await,
                "resources/list" => yield server.handle_resources_list(id),
                "resources/read" => yield server.handle_resources_read(id, request.params),
                "resources/templates/list" => yield server.handle_resource_templates_list(id),
                other => yield JsonRpcError::method_not_found(Some(id), other).into(),
            }
        })
    }

    fn handle_initialize(&self, id: RequestId) -> OutboundMessage {
        let mut result = InitializeResult::new(self.name.as_ref(), self.version.as_ref());
        if let Some(instructions) = &self.instructions {
            result = result.with_instructions(instructions.as_ref());
        }
        respond(id, &result)
    }

    fn handle_tools_list(&self, id: RequestId) -> OutboundMessage {
        let tools = self.tools.list().into_iter().map(|t| t.definition).collect();
        respond(id, &ListToolsResult::new(tools))
    }

    fn handle_prompts_list(&self, id: RequestId) -> OutboundMessage {
        let prompts = self
            .prompts
            .list()
            .into_iter()
            .map(|p| p.definition)
            .collect();
        respond(id, &ListPromptsResult::new(prompts))
    }

    fn handle_resources_list(&self, id: RequestId) -> OutboundMessage {
        let resources = self
            .resources
            .list()
            .into_iter()
            .map(|r| r.definition)
            .collect();
        respond(id, &ListResourcesResult::new(resources))
    }

    fn handle_resource_templates_list(&self, id: RequestId) -> OutboundMessage {
        respond(
            id,
            &ListResourceTemplatesResult::new(self.resource_templates.list()),
        )
    }

    fn handle_resources_read(&self, id: RequestId, params: Option<Value>) -> OutboundMessage {
        let Some(params) = params.as_ref().and_then(Value::as_object) else {
            return JsonRpcError::invalid_params(Some(id), "Params must be an object").into();
        };
        let Some(uri) = params.get("uri").and_then(Value::as_str) else {
            return JsonRpcError::invalid_params(Some(id), "Missing 'uri' in parameters").into();
        };

        match self.resources.get(uri) {
            Some(resource) => respond(id, &ReadResourceResult::single(resource.data)),
            None => JsonRpcError::new(Some(id), JsonRpcErrorObject::resource_not_found(uri)).into(),
        }
    }

    async fn handle_prompts_get(&self, id: RequestId, params: Option<Value>) -> OutboundMessage {
        let Some(params) = params.as_ref().and_then(Value::as_object) else {
            return JsonRpcError::invalid_params(Some(id), "Params must be an object").into();
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcError::invalid_params(Some(id), "Missing 'name' in parameters").into();
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let Some(prompt) = self.prompts.get(name) else {
            return JsonRpcError::invalid_params(Some(id), format!("Prompt '{name}' not found"))
                .into();
        };

        match tokio::time::timeout(prompt.timeout, prompt.invoke(arguments)).await {
            Ok(Ok(result)) => respond(id, &result),
            Ok(Err(err)) => JsonRpcError::internal_error(
                Some(id),
                Some(format!("Internal Server Error: {err}")),
            )
            .into(),
            Err(_elapsed) => JsonRpcError::internal_error(
                Some(id),
                Some(format!(
                    "Prompt '{}' timed out (> {}s).",
                    name,
                    prompt.timeout.as_secs()
                )),
            )
            .into(),
        }
    }

    /// The tool-call engine (see module docs): resolves the tool, then
    /// consumes its event sequence under a single deadline. Progress maps
    /// to `notifications/progress` when the caller supplied a token and is
    /// silently dropped otherwise. At most one result envelope is emitted,
    /// always last.
    fn handle_tools_call(
        &self,
        id: RequestId,
        params: Option<Value>,
    ) -> BoxStream<'static, OutboundMessage> {
        let server = self.clone();
        Box::pin(stream! {
            let Some(params) = params.as_ref().and_then(Value::as_object).cloned() else {
                yield JsonRpcError::invalid_params(Some(id), "Params must be an object").into();
                return;
            };
            let Some(name) = params.get("name").and_then(Value::as_str).map(str::to_string) else {
                yield JsonRpcError::invalid_params(Some(id), "Missing 'name'").into();
                return;
            };
            let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            let progress_token = params
                .get("progressToken")
                .or_else(|| params.get("_meta").and_then(|meta| meta.get("progressToken")))
                .and_then(ProgressToken::from_value);

            // A missing tool is a tool-level error, not a JSON-RPC error
            let Some(tool) = server.tools.get(&name) else {
                yield tool_error(id, format!("Tool '{name}' not found."));
                return;
            };

            let timeout_secs = tool.timeout.as_secs();
            let deadline = Instant::now() + tool.timeout;
            let mut events = tool.invoke(arguments);
            let mut result_sent = false;

            loop {
                match tokio::time::timeout_at(deadline, events.next()).await {
                    Err(_elapsed) => {
                        debug!(tool = %name, "invocation exceeded its deadline, cancelling");
                        drop(events);
                        yield tool_error(id, format!("Tool execution timed out ({timeout_secs}s)."));
                        return;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(err))) => {
                        yield tool_error(id, format!("Internal Tool Error: {err}"));
                        return;
                    }
                    Ok(Some(Ok(ToolEvent::Progress(progress)))) => {
                        // Progress without a token is dropped on purpose
                        if let Some(token) = progress_token.clone() {
                            yield notifications::progress(ProgressNotificationParams {
                                progress_token: token,
                                progress: progress.progress,
                                total: progress.total,
                                message: progress.message,
                            })
                            .into();
                        }
                    }
                    Ok(Some(Ok(ToolEvent::Result(result)))) => {
                        result_sent = true;
                        yield respond(id.clone(), &result);
                        break;
                    }
                }
            }

            if !result_sent {
                yield tool_error(id, format!("Tool '{name}' finished without returning a result."));
            }
        })
    }
}

/// Serialize a result into a success envelope; a serialization failure
/// degrades to an internal-error envelope for the same id.
fn respond<T: Serialize>(id: RequestId, result: &T) -> OutboundMessage {
    match JsonRpcResponse::of(id.clone(), result) {
        Ok(response) => response.into(),
        Err(err) => JsonRpcError::internal_error(
            Some(id),
            Some(format!("Internal Server Error: {err}")),
        )
        .into(),
    }
}

/// Tool-level failure: a *successful* envelope whose result has
/// `isError: true`
fn tool_error(id: RequestId, message: String) -> OutboundMessage {
    respond(id, &CallToolResult::error(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use strix_mcp_protocol::{PromptContent, PromptDefinition, PromptMessage, ToolContent};
    use strix_mcp_protocol::{GetPromptResult, ToolDefinition, ToolProgress};

    use crate::prompt::Prompt;
    use crate::resource::Resource;

    fn bitcoin_tool() -> Tool {
        Tool::single(
            ToolDefinition::new(
                "get_bitcoin_price",
                "Retrieves the current market price of Bitcoin.",
                json!({"type": "object", "properties": {}}),
            ),
            |_args| async {
                Ok(CallToolResult::success(vec![ToolContent::text(
                    "Bitcoin price is 89,123",
                )]))
            },
        )
    }

    async fn collect(server: &McpServer, request: JsonRpcRequest) -> Vec<OutboundMessage> {
        server.process_request(request).collect().await
    }

    fn request(id: i64, method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(id, method, params)
    }

    #[tokio::test]
    async fn test_ping_returns_empty_object() {
        let server = McpServer::new("test");
        let out = collect(&server, request(1, "ping", None)).await;
        assert_eq!(out.len(), 1);
        let OutboundMessage::Response(response) = &out[0] else {
            panic!("expected a response");
        };
        assert_eq!(response.result, json!({}));
    }

    #[tokio::test]
    async fn test_initialize_payload() {
        let server = McpServer::new("finance");
        let out = collect(&server, request(1, "initialize", Some(json!({})))).await;
        assert_eq!(out.len(), 1);
        let value = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(value["result"]["protocolVersion"], "2025-11-25");
        assert_eq!(value["result"]["serverInfo"]["name"], "finance");
        assert_eq!(value["result"]["serverInfo"]["version"], SERVER_VERSION);
        assert_eq!(value["result"]["capabilities"]["tools"]["listChanged"], true);
    }

    #[tokio::test]
    async fn test_unknown_method_yields_method_not_found() {
        let server = McpServer::new("test");
        let out = collect(&server, request(5, "tasks/list", None)).await;
        assert_eq!(out.len(), 1);
        let OutboundMessage::Error(error) = &out[0] else {
            panic!("expected an error");
        };
        assert_eq!(error.error.code, strix_mcp_protocol::error_codes::METHOD_NOT_FOUND);
        assert_eq!(error.id, Some(RequestId::Number(5)));
    }

    #[tokio::test]
    async fn test_notifications_yield_nothing() {
        let server = McpServer::new("test");
        let out = collect(
            &server,
            JsonRpcRequest::notification("notifications/initialized", None),
        )
        .await;
        assert!(out.is_empty());

        // Any id-less request is a notification and gets no response
        let out = collect(&server, JsonRpcRequest::notification("tools/list", None)).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_tools_list_snapshots_definitions() {
        let server = McpServer::new("test");
        server.tools.add(vec![bitcoin_tool()], false).unwrap();

        let out = collect(&server, request(2, "tools/list", None)).await;
        let value = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(value["id"], 2);
        assert_eq!(value["result"]["tools"][0]["name"], "get_bitcoin_price");
        assert!(value["result"]["tools"][0].get("inputSchema").is_some());
        assert!(value["result"].get("nextCursor").is_none());
    }

    #[tokio::test]
    async fn test_tools_call_single_result() {
        let server = McpServer::new("test");
        server.tools.add(vec![bitcoin_tool()], false).unwrap();

        let out = collect(
            &server,
            request(3, "tools/call", Some(json!({"name": "get_bitcoin_price", "arguments": {}}))),
        )
        .await;
        assert_eq!(out.len(), 1);
        let value = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(value["result"]["content"][0]["text"], "Bitcoin price is 89,123");
        assert_eq!(value["result"]["isError"], false);
    }

    #[tokio::test]
    async fn test_tools_call_missing_tool_is_tool_level_error() {
        let server = McpServer::new("test");
        let out = collect(
            &server,
            request(4, "tools/call", Some(json!({"name": "nope", "arguments": {}}))),
        )
        .await;
        assert_eq!(out.len(), 1);
        let value = serde_json::to_value(&out[0]).unwrap();
        // Success envelope carrying a tool-level error
        assert!(value.get("error").is_none());
        assert_eq!(value["result"]["isError"], true);
        assert_eq!(value["result"]["content"][0]["text"], "Tool 'nope' not found.");
    }

    #[tokio::test]
    async fn test_tools_call_invalid_params() {
        let server = McpServer::new("test");

        let out = collect(&server, request(5, "tools/call", Some(json!([1, 2])))).await;
        let OutboundMessage::Error(error) = &out[0] else {
            panic!("expected invalid params");
        };
        assert_eq!(error.error.code, strix_mcp_protocol::error_codes::INVALID_PARAMS);

        let out = collect(&server, request(6, "tools/call", Some(json!({"arguments": {}})))).await;
        let OutboundMessage::Error(error) = &out[0] else {
            panic!("expected invalid params");
        };
        assert_eq!(error.error.message, "Missing 'name'");
    }

    fn counting_stream_tool(name: &str) -> Tool {
        Tool::streaming(
            ToolDefinition::new(name, "counts to three", json!({"type": "object"})),
            |_args| {
                futures::stream::iter(vec![
                    Ok(ToolEvent::Progress(ToolProgress::new(1.0).with_total(3.0))),
                    Ok(ToolEvent::Progress(ToolProgress::new(2.0).with_total(3.0))),
                    Ok(ToolEvent::Result(CallToolResult::success(vec![
                        ToolContent::text("counted"),
                    ]))),
                ])
            },
        )
    }

    #[tokio::test]
    async fn test_streaming_progress_precedes_result() {
        let server = McpServer::new("test");
        server.tools.add(vec![counting_stream_tool("count")], false).unwrap();

        let out = collect(
            &server,
            request(
                7,
                "tools/call",
                Some(json!({"name": "count", "arguments": {}, "progressToken": "tok"})),
            ),
        )
        .await;
        assert_eq!(out.len(), 3);
        for message in &out[..2] {
            let OutboundMessage::Notification(notification) = message else {
                panic!("expected progress notifications first");
            };
            assert_eq!(notification.method, "notifications/progress");
            let params = notification.params.as_ref().unwrap();
            assert_eq!(params["progressToken"], "tok");
        }
        let value = serde_json::to_value(&out[2]).unwrap();
        assert_eq!(value["result"]["content"][0]["text"], "counted");
        assert_eq!(value["id"], 7);
    }

    #[tokio::test]
    async fn test_progress_without_token_is_dropped() {
        let server = McpServer::new("test");
        server.tools.add(vec![counting_stream_tool("count")], false).unwrap();

        let out = collect(
            &server,
            request(8, "tools/call", Some(json!({"name": "count", "arguments": {}}))),
        )
        .await;
        // Only the terminal result survives
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], OutboundMessage::Response(_)));
    }

    #[tokio::test]
    async fn test_progress_token_accepted_from_meta() {
        let server = McpServer::new("test");
        server.tools.add(vec![counting_stream_tool("count")], false).unwrap();

        let out = collect(
            &server,
            request(
                9,
                "tools/call",
                Some(json!({"name": "count", "arguments": {}, "_meta": {"progressToken": 42}})),
            ),
        )
        .await;
        assert_eq!(out.len(), 3);
        let OutboundMessage::Notification(notification) = &out[0] else {
            panic!("expected a progress notification");
        };
        assert_eq!(notification.params.as_ref().unwrap()["progressToken"], 42);
    }

    #[tokio::test]
    async fn test_stream_exhausted_without_result() {
        let server = McpServer::new("test");
        let tool = Tool::streaming(
            ToolDefinition::new("silent", "never answers", json!({"type": "object"})),
            |_args| {
                futures::stream::iter(vec![Ok(ToolEvent::Progress(ToolProgress::new(1.0)))])
            },
        );
        server.tools.add(vec![tool], false).unwrap();

        let out = collect(
            &server,
            request(10, "tools/call", Some(json!({"name": "silent", "arguments": {}}))),
        )
        .await;
        assert_eq!(out.len(), 1);
        let value = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(value["result"]["isError"], true);
        assert_eq!(
            value["result"]["content"][0]["text"],
            "Tool 'silent' finished without returning a result."
        );
    }

    #[tokio::test]
    async fn test_producer_error_surfaces_as_tool_error() {
        let server = McpServer::new("test");
        let tool = Tool::single(
            ToolDefinition::new("faulty", "always fails", json!({"type": "object"})),
            |_args| async {
                Err(strix_mcp_protocol::McpError::tool_execution("backend unreachable"))
            },
        );
        server.tools.add(vec![tool], false).unwrap();

        let out = collect(
            &server,
            request(11, "tools/call", Some(json!({"name": "faulty", "arguments": {}}))),
        )
        .await;
        let value = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(value["result"]["isError"], true);
        assert_eq!(
            value["result"]["content"][0]["text"],
            "Internal Tool Error: backend unreachable"
        );
        assert!(value.get("error").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_timeout_emits_timeout_envelope() {
        let server = McpServer::new("test");
        let tool = Tool::single(
            ToolDefinition::new("slow", "sleeps past its budget", json!({"type": "object"})),
            |_args| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(CallToolResult::success(vec![ToolContent::text("late")]))
            },
        )
        .with_timeout(Duration::from_secs(1));
        server.tools.add(vec![tool], false).unwrap();

        let out = collect(
            &server,
            request(12, "tools/call", Some(json!({"name": "slow", "arguments": {}}))),
        )
        .await;
        assert_eq!(out.len(), 1);
        let value = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(value["result"]["isError"], true);
        assert_eq!(
            value["result"]["content"][0]["text"],
            "Tool execution timed out (1s)."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_spans_the_whole_sequence() {
        // Each element arrives within 40s, but the total exceeds the 60s
        // default budget: the deadline is global, not per element.
        let server = McpServer::new("test");
        let tool = Tool::streaming(
            ToolDefinition::new("drip", "drips progress", json!({"type": "object"})),
            |_args| {
                stream! {
                    for i in 0..3 {
                        tokio::time::sleep(Duration::from_secs(40)).await;
                        yield Ok(ToolEvent::Progress(ToolProgress::new(i as f64)));
                    }
                    yield Ok(ToolEvent::Result(CallToolResult::success(vec![])));
                }
            },
        );
        server.tools.add(vec![tool], false).unwrap();

        let out = collect(
            &server,
            request(
                13,
                "tools/call",
                Some(json!({"name": "drip", "arguments": {}, "progressToken": 1})),
            ),
        )
        .await;
        let value = serde_json::to_value(out.last().unwrap()).unwrap();
        assert_eq!(value["result"]["isError"], true);
        assert!(
            value["result"]["content"][0]["text"]
                .as_str()
                .unwrap()
                .contains("timed out")
        );
    }

    #[tokio::test]
    async fn test_prompts_get_renders() {
        let server = McpServer::new("test");
        let prompt = Prompt::new(
            PromptDefinition::new("greet").with_description("A greeting"),
            |args| async move {
                let who = args.get("who").and_then(Value::as_str).unwrap_or("world");
                Ok(GetPromptResult::new(vec![PromptMessage::user(
                    PromptContent::text(format!("Hello, {who}!")),
                )]))
            },
        );
        server.prompts.add(vec![prompt], false).unwrap();

        let out = collect(
            &server,
            request(
                20,
                "prompts/get",
                Some(json!({"name": "greet", "arguments": {"who": "ada"}})),
            ),
        )
        .await;
        let value = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(value["result"]["messages"][0]["content"]["text"], "Hello, ada!");
    }

    #[tokio::test]
    async fn test_prompts_get_missing_prompt_is_invalid_params() {
        let server = McpServer::new("test");
        let out = collect(
            &server,
            request(21, "prompts/get", Some(json!({"name": "ghost"}))),
        )
        .await;
        let OutboundMessage::Error(error) = &out[0] else {
            panic!("expected an error");
        };
        assert_eq!(error.error.code, strix_mcp_protocol::error_codes::INVALID_PARAMS);
        assert_eq!(error.error.message, "Prompt 'ghost' not found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompts_get_timeout_is_internal_error() {
        let server = McpServer::new("test");
        let prompt = Prompt::new(PromptDefinition::new("slow"), |_args| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(GetPromptResult::new(vec![]))
        });
        server.prompts.add(vec![prompt], false).unwrap();

        let out = collect(
            &server,
            request(22, "prompts/get", Some(json!({"name": "slow"}))),
        )
        .await;
        let OutboundMessage::Error(error) = &out[0] else {
            panic!("expected an error");
        };
        assert_eq!(error.error.code, strix_mcp_protocol::error_codes::INTERNAL_ERROR);
        assert!(error.error.message.contains("timed out (> 3s)"));
    }

    #[tokio::test]
    async fn test_resources_read_hit_and_miss() {
        let server = McpServer::new("test");
        server
            .resources
            .add(
                vec![Resource::text("file:///greeting.txt", "greeting", "text/plain", "hello")],
                false,
            )
            .unwrap();

        let out = collect(
            &server,
            request(30, "resources/read", Some(json!({"uri": "file:///greeting.txt"}))),
        )
        .await;
        let value = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(value["result"]["contents"][0]["text"], "hello");
        assert_eq!(value["result"]["contents"][0]["uri"], "file:///greeting.txt");

        let out = collect(
            &server,
            request(31, "resources/read", Some(json!({"uri": "file:///missing"}))),
        )
        .await;
        let OutboundMessage::Error(error) = &out[0] else {
            panic!("expected an error");
        };
        assert_eq!(error.error.code, strix_mcp_protocol::error_codes::RESOURCE_NOT_FOUND);
        assert_eq!(
            error.error.data,
            Some(json!({"uri": "file:///missing"}))
        );
    }

    #[tokio::test]
    async fn test_resource_templates_list() {
        let server = McpServer::new("test");
        server
            .resource_templates
            .add(vec![ResourceTemplate::new("file:///{path}", "files")], false)
            .unwrap();

        let out = collect(&server, request(32, "resources/templates/list", None)).await;
        let value = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(value["result"]["resourceTemplates"][0]["name"], "files");
    }

    #[tokio::test]
    async fn test_registry_change_reaches_subscribers() {
        let server = McpServer::new("test");
        let mut first = server.subscribe();
        let mut second = server.subscribe();

        server.tools.add(vec![bitcoin_tool()], true).unwrap();

        let event = first.recv().await.unwrap();
        assert_eq!(event.method, "notifications/tools/list_changed");
        let event = second.recv().await.unwrap();
        assert_eq!(event.method, "notifications/tools/list_changed");
    }

    #[tokio::test]
    async fn test_silent_mutations_do_not_notify() {
        let server = McpServer::new("test");
        let mut events = server.subscribe();

        server.tools.add(vec![bitcoin_tool()], false).unwrap();
        server.prompts.add(vec![], true).unwrap();
        // Template registry never notifies
        server
            .resource_templates
            .add(vec![ResourceTemplate::new("file:///{p}", "t")], true)
            .unwrap();

        // Trigger one real event so recv has something to return
        server
            .resources
            .add(
                vec![Resource::text("file:///a", "a", "text/plain", "x")],
                true,
            )
            .unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.method, "notifications/resources/list_changed");
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_pruned_and_siblings_unaffected() {
        let server = McpServer::new("test");
        let dead = server.subscribe();
        let mut live = server.subscribe();
        drop(dead);

        server.tools.add(vec![bitcoin_tool()], true).unwrap();
        let event = live.recv().await.unwrap();
        assert_eq!(event.method, "notifications/tools/list_changed");
    }

    #[tokio::test]
    async fn test_full_subscriber_channel_drops_and_counts() {
        let server = McpServer::new("test");
        let _stalled = server.subscribe(); // never read

        for _ in 0..(SUBSCRIBER_CHANNEL_CAPACITY + 10) {
            server.notify_clients(notifications::tools_list_changed());
        }
        assert_eq!(server.events_dropped(), 10);
    }
}
