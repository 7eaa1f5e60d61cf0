//! Registered prompts

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use strix_mcp_protocol::{GetPromptResult, McpResult, PromptDefinition};

type PromptFn = Arc<dyn Fn(Value) -> BoxFuture<'static, McpResult<GetPromptResult>> + Send + Sync>;

/// A prompt registered with the server, keyed by `definition.name`
#[derive(Clone)]
pub struct Prompt {
    pub definition: PromptDefinition,
    handler: PromptFn,
    /// Wall-clock budget for rendering the prompt
    pub timeout: Duration,
}

impl Prompt {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new<F, Fut>(definition: PromptDefinition, func: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<GetPromptResult>> + Send + 'static,
    {
        Self {
            definition,
            handler: Arc::new(move |args| func(args).boxed()),
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

    pub(crate) fn invoke(&self, args: Value) -> BoxFuture<'static, McpResult<GetPromptResult>> {
        (self.handler)(args)
    }
}

impl fmt::Debug for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prompt")
            .field("name", &self.definition.name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strix_mcp_protocol::{PromptContent, PromptMessage};

    #[tokio::test]
    async fn test_prompt_invocation() {
        let prompt = Prompt::new(PromptDefinition::new("greet"), |args| async move {
            let who = args.get("who").and_then(Value::as_str).unwrap_or("world");
            Ok(GetPromptResult::new(vec![PromptMessage::user(
                PromptContent::text(format!("Hello, {who}!")),
            )]))
        });

        let result = prompt.invoke(json!({"who": "ada"})).await.unwrap();
        assert_eq!(
            result.messages[0].content,
            PromptContent::text("Hello, ada!")
        );
    }

    #[test]
    fn test_default_timeout_is_three_seconds() {
        let prompt = Prompt::new(PromptDefinition::new("p"), |_| async {
            Ok(GetPromptResult::new(vec![]))
        });
        assert_eq!(prompt.timeout, Duration::from_secs(3));
    }
}
