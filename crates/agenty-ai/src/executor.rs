//! The agent loop: repeated model calls interleaved with tool execution
//! until the model stops requesting tools or the iteration cap is hit.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::llm::{
    AnthropicProvider, ApiKind, ChatProvider, ChatRequest, GeminiProvider, KimiProvider, Message,
    OpenAiProvider, ResponseFormat, Role,
};
use crate::tools::Registry;

/// Upper bound on adapter round-trips per turn. Hitting the cap is a
/// bounded-work guarantee, not an error.
pub const MAX_TOOL_CALL_ITERATIONS: usize = 20;

pub struct ChatParams {
    pub messages: Vec<Message>,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub kind: ApiKind,
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug)]
pub struct ChatResult {
    pub total_tokens: i64,
    /// Only the messages appended during this call; the caller's input
    /// prefix is excluded.
    pub messages: Vec<Message>,
}

pub struct ChatExecutor {
    registry: Arc<Registry>,
    providers: HashMap<ApiKind, Arc<dyn ChatProvider>>,
}

impl ChatExecutor {
    pub fn new(registry: Arc<Registry>) -> Self {
        let mut providers: HashMap<ApiKind, Arc<dyn ChatProvider>> = HashMap::new();
        providers.insert(ApiKind::OpenAi, Arc::new(OpenAiProvider::new()));
        providers.insert(ApiKind::Anthropic, Arc::new(AnthropicProvider::new()));
        providers.insert(ApiKind::Gemini, Arc::new(GeminiProvider::new()));
        providers.insert(ApiKind::Kimi, Arc::new(KimiProvider::new()));

        Self {
            registry,
            providers,
        }
    }

    /// Replace the adapter for one provider kind. Used by tests to script
    /// model behavior.
    pub fn with_provider(mut self, kind: ApiKind, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    pub async fn chat(&self, params: ChatParams) -> Result<ChatResult> {
        let provider = self
            .providers
            .get(&params.kind)
            .or_else(|| self.providers.get(&ApiKind::OpenAi))
            .expect("openai provider is always registered");

        // One stable snapshot of the tool catalog for the whole loop.
        let tool_defs = self.registry.definitions();

        let input_len = params.messages.len();
        let mut messages = params.messages;
        let mut total_tokens: i64 = 0;

        for iteration in 0..MAX_TOOL_CALL_ITERATIONS {
            let request = ChatRequest {
                model: params.model.clone(),
                messages: messages.clone(),
                tools: tool_defs.clone(),
                base_url: params.base_url.clone(),
                api_key: params.api_key.clone(),
                max_tokens: None,
                response_format: params.response_format.clone(),
            };

            let response = provider.chat(&request).await?;
            total_tokens += response.total_tokens;

            let mut assistant = Message::assistant(response.content);
            assistant.tool_calls = response.tool_calls.clone();
            assistant.reasoning_blocks = response.reasoning_blocks;
            assistant.reasoning_content = response.reasoning_content.clone();
            messages.push(assistant);

            if response.tool_calls.is_empty() {
                return Ok(ChatResult {
                    total_tokens,
                    messages: messages.split_off(input_len),
                });
            }

            info!(
                count = response.tool_calls.len(),
                iteration = iteration + 1,
                "executing tool calls"
            );

            for call in &response.tool_calls {
                info!(name = %call.name, id = %call.id, "executing tool");
                let result = self.registry.execute(call).await;

                messages.push(Message {
                    role: Role::Tool,
                    content: result.content.clone(),
                    tool_calls: Vec::new(),
                    tool_result: Some(result),
                    reasoning_blocks: Vec::new(),
                    reasoning_content: response.reasoning_content.clone(),
                });
            }
        }

        Ok(ChatResult {
            total_tokens,
            messages: messages.split_off(input_len),
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::{AiError, Result};
    use crate::llm::{MockProvider, MockStep, ToolCall};
    use crate::tools::{Tool, ToolDefinition, ToolParameters};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: "Echo input".to_string(),
                parameters: ToolParameters::object()
                    .property("value", "string", "value to echo")
                    .required(&["value"]),
            }
        }

        async fn execute(&self, arguments: &str) -> Result<String> {
            let value: serde_json::Value = serde_json::from_str(arguments)
                .map_err(|err| AiError::InvalidArguments(err.to_string()))?;
            Ok(value["value"].as_str().unwrap_or_default().to_string())
        }
    }

    fn executor_with(registry: Arc<Registry>, mock: MockProvider) -> ChatExecutor {
        ChatExecutor::new(registry).with_provider(ApiKind::OpenAi, Arc::new(mock))
    }

    fn params(messages: Vec<Message>) -> ChatParams {
        ChatParams {
            messages,
            model: "mock-model".to_string(),
            base_url: String::new(),
            api_key: String::new(),
            kind: ApiKind::OpenAi,
            response_format: None,
        }
    }

    #[tokio::test]
    async fn tool_call_then_final_answer() {
        let registry = Arc::new(Registry::new());
        registry.register(EchoTool);

        let mock = MockProvider::from_steps(vec![
            MockStep::tool_call("call_1", "echo", "{\"value\":\"x\"}"),
            MockStep::text("done"),
        ]);
        let executor = executor_with(registry, mock.clone());

        let result = executor
            .chat(params(vec![Message::user("say hi then call echo('x')")]))
            .await
            .unwrap();

        assert_eq!(result.messages.len(), 3);
        assert_eq!(result.messages[0].role, Role::Assistant);
        assert_eq!(result.messages[0].tool_calls[0].name, "echo");
        assert_eq!(result.messages[1].role, Role::Tool);
        let tool_result = result.messages[1].tool_result.as_ref().unwrap();
        assert_eq!(tool_result.call_id, "call_1");
        assert_eq!(tool_result.content, "x");
        assert!(!tool_result.is_error);
        assert_eq!(result.messages[2].role, Role::Assistant);
        assert_eq!(result.messages[2].content, "done");

        // Two adapter round-trips at 10 tokens each.
        assert_eq!(result.total_tokens, 20);
        assert_eq!(mock.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn unknown_tool_produces_error_result_and_loop_continues() {
        let registry = Arc::new(Registry::new());

        let mock = MockProvider::from_steps(vec![
            MockStep::tool_call("call_1", "foo", "{}"),
            MockStep::text("recovered"),
        ]);
        let executor = executor_with(registry, mock);

        let result = executor
            .chat(params(vec![Message::user("use foo")]))
            .await
            .unwrap();

        let tool_result = result.messages[1].tool_result.as_ref().unwrap();
        assert!(tool_result.is_error);
        assert_eq!(tool_result.content, "tool not found: foo");
        assert_eq!(result.messages[2].content, "recovered");
    }

    #[tokio::test]
    async fn iteration_cap_bounds_the_loop() {
        let registry = Arc::new(Registry::new());
        registry.register(EchoTool);

        let steps: Vec<MockStep> = (0..MAX_TOOL_CALL_ITERATIONS + 5)
            .map(|i| MockStep::tool_call(format!("call_{i}"), "echo", "{\"value\":\"again\"}"))
            .collect();
        let mock = MockProvider::from_steps(steps);
        let executor = executor_with(registry, mock.clone());

        let result = executor.chat(params(vec![Message::user("loop")])).await.unwrap();

        assert_eq!(mock.requests().await.len(), MAX_TOOL_CALL_ITERATIONS);
        // One assistant + one tool message per iteration; ends on a tool message.
        assert_eq!(result.messages.len(), MAX_TOOL_CALL_ITERATIONS * 2);
        assert_eq!(result.messages.last().unwrap().role, Role::Tool);
    }

    #[tokio::test]
    async fn every_tool_call_is_paired_in_order() {
        let registry = Arc::new(Registry::new());
        registry.register(EchoTool);

        let mock = MockProvider::from_steps(vec![
            MockStep::ToolCalls(vec![
                ToolCall {
                    id: "call_a".to_string(),
                    name: "echo".to_string(),
                    arguments: "{\"value\":\"1\"}".to_string(),
                },
                ToolCall {
                    id: "call_b".to_string(),
                    name: "echo".to_string(),
                    arguments: "{\"value\":\"2\"}".to_string(),
                },
            ]),
            MockStep::text("done"),
        ]);
        let executor = executor_with(registry, mock);

        let result = executor.chat(params(vec![Message::user("two calls")])).await.unwrap();

        let ids: Vec<&str> = result
            .messages
            .iter()
            .filter_map(|m| m.tool_result.as_ref())
            .map(|r| r.call_id.as_str())
            .collect();
        assert_eq!(ids, vec!["call_a", "call_b"]);
    }

    #[tokio::test]
    async fn provider_error_surfaces_immediately() {
        let registry = Arc::new(Registry::new());
        let mock = MockProvider::from_steps(vec![MockStep::Error("upstream down".to_string())]);
        let executor = executor_with(registry, mock);

        let err = executor.chat(params(vec![Message::user("hi")])).await.unwrap_err();
        assert!(err.to_string().contains("upstream down"));
    }

    #[tokio::test]
    async fn unknown_kind_falls_back_to_openai_adapter() {
        let registry = Arc::new(Registry::new());
        let mock = MockProvider::from_steps(vec![MockStep::text("fallback ok")]);
        // Register the mock as the OpenAI adapter, then ask for a kind with
        // no registered adapter.
        let mut executor = ChatExecutor::new(registry).with_provider(ApiKind::OpenAi, Arc::new(mock));
        executor.providers.remove(&ApiKind::Kimi);

        let mut p = params(vec![Message::user("hi")]);
        p.kind = ApiKind::Kimi;
        let result = executor.chat(p).await.unwrap();
        assert_eq!(result.messages[0].content, "fallback ok");
    }

    #[tokio::test]
    async fn response_format_is_propagated_every_iteration() {
        let registry = Arc::new(Registry::new());
        registry.register(EchoTool);

        let mock = MockProvider::from_steps(vec![
            MockStep::tool_call("call_1", "echo", "{\"value\":\"x\"}"),
            MockStep::text("{\"facts\":[]}"),
        ]);
        let executor = executor_with(registry, mock.clone());

        let mut p = params(vec![Message::user("extract")]);
        p.response_format = Some(ResponseFormat::json_object());
        executor.chat(p).await.unwrap();

        let requests = mock.requests().await;
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.response_format.is_some()));
    }
}
