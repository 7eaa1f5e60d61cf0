//! Registered tools
//!
//! A [`Tool`] pairs a wire [`ToolDefinition`] with its implementation. The
//! implementation is declared at registration time as either
//! [`ToolHandler::Single`] (one awaited result) or
//! [`ToolHandler::Streaming`] (progress events followed by exactly one
//! result), so the call engine never has to inspect return types at
//! runtime.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use serde_json::Value;

use strix_mcp_protocol::{CallToolResult, McpResult, ToolDefinition, ToolProgress};

/// One element produced by a streaming tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    Progress(ToolProgress),
    Result(CallToolResult),
}

type SingleFn = Arc<dyn Fn(Value) -> BoxFuture<'static, McpResult<CallToolResult>> + Send + Sync>;
type StreamingFn = Arc<dyn Fn(Value) -> BoxStream<'static, McpResult<ToolEvent>> + Send + Sync>;

/// How a tool produces its output
#[derive(Clone)]
pub enum ToolHandler {
    /// One future resolving to the result
    Single(SingleFn),
    /// A lazy sequence of progress events ending in exactly one result
    Streaming(StreamingFn),
}

/// A tool registered with the server, keyed by `definition.name`
#[derive(Clone)]
pub struct Tool {
    pub definition: ToolDefinition,
    pub handler: ToolHandler,
    /// Wall-clock budget for one invocation, measured from start
    pub timeout: Duration,
}

impl Tool {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Register a single-result tool
    pub fn single<F, Fut>(definition: ToolDefinition, func: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<CallToolResult>> + Send + 'static,
    {
        Self {
            definition,
            handler: ToolHandler::Single(Arc::new(move |args| func(args).boxed())),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Register a streaming tool (progress events, then one result)
    pub fn streaming<F, S>(definition: ToolDefinition, func: F) -> Self
    where
        F: Fn(Value) -> S + Send + Sync + 'static,
        S: Stream<Item = McpResult<ToolEvent>> + Send + 'static,
    {
        Self {
            definition,
            handler: ToolHandler::Streaming(Arc::new(move |args| func(args).boxed())),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Start an invocation, normalized to the streaming shape: a
    /// single-result tool becomes a one-element sequence.
    pub(crate) fn invoke(&self, args: Value) -> BoxStream<'static, McpResult<ToolEvent>> {
        match &self.handler {
            ToolHandler::Single(func) => {
                let fut = func(args);
                futures::stream::once(async move { fut.await.map(ToolEvent::Result) }).boxed()
            }
            ToolHandler::Streaming(func) => func(args),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.definition.name)
            .field(
                "handler",
                &match &self.handler {
                    ToolHandler::Single(_) => "Single",
                    ToolHandler::Streaming(_) => "Streaming",
                },
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strix_mcp_protocol::ToolContent;

    fn definition() -> ToolDefinition {
        ToolDefinition::new("echo", "Echo the input back", json!({"type": "object"}))
    }

    #[tokio::test]
    async fn test_single_tool_normalizes_to_one_element_stream() {
        let tool = Tool::single(definition(), |args| async move {
            let text = args.get("text").and_then(Value::as_str).unwrap_or("").to_string();
            Ok(CallToolResult::success(vec![ToolContent::text(text)]))
        });

        let events: Vec<_> = tool.invoke(json!({"text": "hi"})).collect().await;
        assert_eq!(events.len(), 1);
        let ToolEvent::Result(result) = events[0].as_ref().unwrap() else {
            panic!("expected a result event");
        };
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn test_streaming_tool_passes_events_through() {
        let tool = Tool::streaming(definition(), |_args| {
            futures::stream::iter(vec![
                Ok(ToolEvent::Progress(ToolProgress::new(0.5))),
                Ok(ToolEvent::Result(CallToolResult::success(vec![
                    ToolContent::text("done"),
                ]))),
            ])
        });

        let events: Vec<_> = tool.invoke(json!({})).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(ToolEvent::Progress(_))));
        assert!(matches!(events[1], Ok(ToolEvent::Result(_))));
    }

    #[test]
    fn test_default_timeout() {
        let tool = Tool::single(definition(), |_| async {
            Ok(CallToolResult::success(vec![]))
        });
        assert_eq!(tool.timeout, Duration::from_secs(60));

        let tool = tool.with_timeout(Duration::from_secs(1));
        assert_eq!(tool.timeout, Duration::from_secs(1));
    }
}
