//! OpenAI-compatible chat completions adapter

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::llm::provider::{
    ChatProvider, ChatRequest, ChatResponse, Message, ResponseFormatKind, Role, ToolCall,
};
use crate::tools::ToolDefinition;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: Client,
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiProvider {
    pub fn new() -> Self {
        Self {
            client: build_http_client(),
        }
    }
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Serialize)]
struct WireToolCall {
    id: String,
    r#type: &'static str,
    function: WireFunctionCall,
}

#[derive(Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    r#type: &'static str,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireResponseToolCall>>,
}

#[derive(Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireResponseFunction,
}

#[derive(Deserialize)]
struct WireResponseFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireUsage {
    total_tokens: i64,
}

#[derive(Deserialize)]
struct WireErrorEnvelope {
    error: WireError,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}

fn build_messages(messages: &[Message]) -> Vec<WireMessage> {
    messages
        .iter()
        .filter_map(|msg| match msg.role {
            Role::System => Some(WireMessage {
                role: "system",
                content: Some(msg.content.clone()),
                tool_call_id: None,
                tool_calls: None,
            }),
            Role::User => Some(WireMessage {
                role: "user",
                content: Some(msg.content.clone()),
                tool_call_id: None,
                tool_calls: None,
            }),
            Role::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| WireToolCall {
                                id: tc.id.clone(),
                                r#type: "function",
                                function: WireFunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };
                let content = if tool_calls.is_some() && msg.content.is_empty() {
                    None
                } else {
                    Some(msg.content.clone())
                };
                Some(WireMessage {
                    role: "assistant",
                    content,
                    tool_call_id: None,
                    tool_calls,
                })
            }
            Role::Tool => msg.tool_result.as_ref().map(|result| WireMessage {
                role: "tool",
                content: Some(result.content.clone()),
                tool_call_id: Some(result.call_id.clone()),
                tool_calls: None,
            }),
        })
        .collect()
}

fn build_tools(defs: &[ToolDefinition]) -> Vec<WireTool> {
    defs.iter()
        .map(|def| WireTool {
            r#type: "function",
            function: WireFunction {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.to_schema_value(),
            },
        })
        .collect()
}

fn build_response_format(request: &ChatRequest) -> Option<Value> {
    let format = request.response_format.as_ref()?;
    match format.kind {
        ResponseFormatKind::Text => None,
        ResponseFormatKind::JsonObject => Some(serde_json::json!({"type": "json_object"})),
        ResponseFormatKind::JsonSchema => {
            let schema = format.json_schema.as_ref()?;
            Some(serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "description": schema.description,
                    "strict": schema.strict,
                    "schema": schema.schema,
                }
            }))
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let base_url = if request.base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            request.base_url.trim_end_matches('/')
        };

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(build_tools(&request.tools))
        };

        let body = WireRequest {
            model: request.model.clone(),
            messages: build_messages(&request.messages),
            tools,
            max_tokens: request.max_tokens,
            response_format: build_response_format(request),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", base_url))
            .header("Authorization", format!("Bearer {}", request.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(AiError::Provider(format!(
                "OpenAI API error (status {}): {}",
                status, message
            )));
        }

        let data: WireResponse = response.json().await?;

        let mut result = ChatResponse {
            total_tokens: data.usage.map(|u| u.total_tokens).unwrap_or(0),
            ..Default::default()
        };

        if let Some(choice) = data.choices.into_iter().next() {
            result.content = choice.message.content.unwrap_or_default();
            result.tool_calls = choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                })
                .collect();
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{JsonSchemaFormat, ResponseFormat, ToolResult};

    #[test]
    fn assistant_tool_calls_keep_raw_arguments() {
        let mut msg = Message::assistant("");
        msg.tool_calls.push(ToolCall {
            id: "call_1".to_string(),
            name: "read_file".to_string(),
            arguments: "{\"path\":\"/tmp/a\"}".to_string(),
        });

        let wire = build_messages(&[msg]);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json[0]["role"], "assistant");
        assert!(json[0].get("content").is_none());
        assert_eq!(json[0]["tool_calls"][0]["type"], "function");
        assert_eq!(
            json[0]["tool_calls"][0]["function"]["arguments"],
            "{\"path\":\"/tmp/a\"}"
        );
    }

    #[test]
    fn tool_result_maps_to_tool_role_with_call_id() {
        let msg = Message::tool(ToolResult {
            call_id: "call_9".to_string(),
            name: "echo".to_string(),
            content: "hi".to_string(),
            is_error: false,
        });

        let wire = build_messages(&[msg]);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json[0]["role"], "tool");
        assert_eq!(json[0]["tool_call_id"], "call_9");
        assert_eq!(json[0]["content"], "hi");
    }

    #[test]
    fn tool_message_without_result_is_dropped() {
        let msg = Message {
            role: Role::Tool,
            content: "orphan".to_string(),
            tool_calls: Vec::new(),
            tool_result: None,
            reasoning_blocks: Vec::new(),
            reasoning_content: None,
        };

        assert!(build_messages(&[msg]).is_empty());
    }

    #[test]
    fn json_schema_format_is_forwarded_strict() {
        let request = ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![Message::user("hi")],
            tools: Vec::new(),
            base_url: String::new(),
            api_key: String::new(),
            max_tokens: None,
            response_format: Some(ResponseFormat::json_schema(JsonSchemaFormat {
                name: "memory_evaluation".to_string(),
                description: "facts".to_string(),
                strict: true,
                schema: serde_json::json!({"type": "object"}),
            })),
        };

        let format = build_response_format(&request).unwrap();
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["strict"], true);
        assert_eq!(format["json_schema"]["name"], "memory_evaluation");
    }
}
