//! Registry for tools available to the agent loop

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::llm::{ToolCall, ToolResult};
use crate::tools::traits::{Tool, ToolDefinition};

/// Thread-safe name → tool mapping.
#[derive(Default)]
pub struct Registry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    pub fn register<T: Tool + 'static>(&self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.write().expect("registry lock").insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().expect("registry lock").get(name).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.tools
            .read()
            .expect("registry lock")
            .values()
            .cloned()
            .collect()
    }

    /// Definitions sorted by name. Some providers cache tool schemas, so
    /// the same registry must serialize identically across restarts.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().expect("registry lock");
        let mut names: Vec<&String> = tools.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| tools[name].definition())
            .collect()
    }

    /// Dispatch one tool call. Failures are captured in the result payload
    /// instead of propagating; the model is expected to recover.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            return ToolResult {
                call_id: call.id.clone(),
                name: call.name.clone(),
                content: format!("tool not found: {}", call.name),
                is_error: true,
            };
        };

        match tool.execute(&call.arguments).await {
            Ok(content) => ToolResult {
                call_id: call.id.clone(),
                name: call.name.clone(),
                content,
                is_error: false,
            },
            Err(err) => ToolResult {
                call_id: call.id.clone(),
                name: call.name.clone(),
                content: format!("error: {}", err),
                is_error: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::{AiError, Result};
    use crate::tools::traits::ToolParameters;

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
            Ok(arguments.to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "fail".to_string(),
                description: "Always fails".to_string(),
                parameters: ToolParameters::object(),
            }
        }

        async fn execute(&self, _arguments: &str) -> Result<String> {
            Err(AiError::Tool("boom".to_string()))
        }
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let registry = Registry::new();
        registry.register(FailingTool);
        registry.register(EchoTool);

        let defs = registry.definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "fail"]);
    }

    #[test]
    fn definitions_are_a_permutation_of_all() {
        let registry = Registry::new();
        registry.register(EchoTool);
        registry.register(FailingTool);

        let mut all_names: Vec<String> = registry
            .all()
            .iter()
            .map(|t| t.definition().name)
            .collect();
        all_names.sort();
        let def_names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(all_names, def_names);
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_result() {
        let registry = Registry::new();
        let result = registry
            .execute(&ToolCall {
                id: "call_1".to_string(),
                name: "foo".to_string(),
                arguments: "{}".to_string(),
            })
            .await;

        assert!(result.is_error);
        assert_eq!(result.content, "tool not found: foo");
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn tool_failure_is_captured_not_propagated() {
        let registry = Registry::new();
        registry.register(FailingTool);

        let result = registry
            .execute(&ToolCall {
                id: "call_2".to_string(),
                name: "fail".to_string(),
                arguments: "{}".to_string(),
            })
            .await;

        assert!(result.is_error);
        assert_eq!(result.content, "error: tool error: boom");
    }

    #[tokio::test]
    async fn successful_execution_returns_content() {
        let registry = Registry::new();
        registry.register(EchoTool);

        let result = registry
            .execute(&ToolCall {
                id: "call_3".to_string(),
                name: "echo".to_string(),
                arguments: "{\"value\":\"x\"}".to_string(),
            })
            .await;

        assert!(!result.is_error);
        assert_eq!(result.content, "{\"value\":\"x\"}");
        assert_eq!(result.name, "echo");
    }
}
