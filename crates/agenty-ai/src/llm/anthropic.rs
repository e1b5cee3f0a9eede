//! Anthropic messages adapter
//!
//! System messages are lifted into the top-level `system` field, tool
//! results travel as user-role `tool_result` blocks, and thinking /
//! redacted_thinking blocks round-trip with their signatures intact.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::llm::provider::{
    ChatProvider, ChatRequest, ChatResponse, Message, ReasoningBlock, Role, ToolCall,
};
use crate::tools::ToolDefinition;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const THINKING_BUDGET_TOKENS: u32 = 31999;
const DEFAULT_MAX_TOKENS: u32 = 64000;

pub struct AnthropicProvider {
    client: Client,
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AnthropicProvider {
    pub fn new() -> Self {
        Self {
            client: build_http_client(),
        }
    }
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<WireTextBlock>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    thinking: WireThinking,
}

#[derive(Serialize)]
struct WireThinking {
    r#type: &'static str,
    budget_tokens: u32,
}

#[derive(Serialize)]
struct WireTextBlock {
    r#type: &'static str,
    text: String,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<WireBlock>,
}

#[derive(Serialize)]
struct WireBlock {
    r#type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    // thinking blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    // tool_use blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<Value>,
    // tool_result blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_use_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_error: Option<bool>,
}

impl WireBlock {
    fn empty(kind: &'static str) -> Self {
        Self {
            r#type: kind,
            text: None,
            thinking: None,
            signature: None,
            data: None,
            id: None,
            name: None,
            input: None,
            tool_use_id: None,
            content: None,
            is_error: None,
        }
    }

    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::empty("text")
        }
    }

    fn thinking(block: &ReasoningBlock) -> Self {
        if block.redacted {
            Self {
                data: Some(block.signature.clone()),
                ..Self::empty("redacted_thinking")
            }
        } else {
            Self {
                thinking: Some(block.summary.clone()),
                signature: Some(block.signature.clone()),
                ..Self::empty("thinking")
            }
        }
    }

    fn tool_use(call: &ToolCall) -> Self {
        let input = serde_json::from_str(&call.arguments).unwrap_or_else(|_| Value::Object(Default::default()));
        Self {
            id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            input: Some(input),
            ..Self::empty("tool_use")
        }
    }
}

#[derive(Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Deserialize)]
struct WireResponse {
    content: Vec<WireResponseBlock>,
    usage: WireUsage,
}

#[derive(Deserialize)]
struct WireResponseBlock {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Deserialize)]
struct WireUsage {
    input_tokens: i64,
    output_tokens: i64,
}

#[derive(Deserialize)]
struct WireErrorEnvelope {
    error: WireError,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}

fn thinking_blocks(blocks: &[ReasoningBlock]) -> Vec<WireBlock> {
    blocks.iter().map(WireBlock::thinking).collect()
}

fn build_messages(messages: &[Message]) -> (Vec<WireTextBlock>, Vec<WireMessage>) {
    let mut system = Vec::new();
    let mut wire = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => system.push(WireTextBlock {
                r#type: "text",
                text: msg.content.clone(),
            }),
            Role::User => {
                let mut blocks = thinking_blocks(&msg.reasoning_blocks);
                blocks.push(WireBlock::text(msg.content.clone()));
                wire.push(WireMessage {
                    role: "user",
                    content: blocks,
                });
            }
            Role::Assistant => {
                if msg.tool_calls.is_empty() {
                    wire.push(WireMessage {
                        role: "assistant",
                        content: vec![WireBlock::text(msg.content.clone())],
                    });
                } else {
                    let mut blocks = thinking_blocks(&msg.reasoning_blocks);
                    if !msg.content.is_empty() {
                        blocks.push(WireBlock::text(msg.content.clone()));
                    }
                    blocks.extend(msg.tool_calls.iter().map(WireBlock::tool_use));
                    wire.push(WireMessage {
                        role: "assistant",
                        content: blocks,
                    });
                }
            }
            Role::Tool => {
                let Some(result) = &msg.tool_result else {
                    continue;
                };
                let mut blocks = thinking_blocks(&msg.reasoning_blocks);
                blocks.push(WireBlock {
                    tool_use_id: Some(result.call_id.clone()),
                    content: Some(result.content.clone()),
                    is_error: Some(result.is_error),
                    ..WireBlock::empty("tool_result")
                });
                wire.push(WireMessage {
                    role: "user",
                    content: blocks,
                });
            }
        }
    }

    (system, wire)
}

fn build_tools(defs: &[ToolDefinition]) -> Vec<WireTool> {
    defs.iter()
        .map(|def| WireTool {
            name: def.name.clone(),
            description: def.description.clone(),
            input_schema: def.parameters.to_schema_value(),
        })
        .collect()
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let base_url = if request.base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            request.base_url.trim_end_matches('/')
        };

        let (system, messages) = build_messages(&request.messages);
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(build_tools(&request.tools))
        };

        let body = WireRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages,
            tools,
            thinking: WireThinking {
                r#type: "enabled",
                budget_tokens: THINKING_BUDGET_TOKENS,
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", base_url))
            .header("x-api-key", &request.api_key)
            .header("anthropic-version", API_VERSION)
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
                "Anthropic API error (status {}): {}",
                status, message
            )));
        }

        let data: WireResponse = response.json().await?;

        let mut result = ChatResponse {
            total_tokens: data.usage.input_tokens + data.usage.output_tokens,
            ..Default::default()
        };

        let mut text_parts = Vec::new();
        for block in data.content {
            match block.r#type.as_str() {
                "text" => {
                    if let Some(text) = block.text {
                        text_parts.push(text);
                    }
                }
                "tool_use" => {
                    if let (Some(id), Some(name), Some(input)) = (block.id, block.name, block.input)
                    {
                        result.tool_calls.push(ToolCall {
                            id,
                            name,
                            arguments: input.to_string(),
                        });
                    }
                }
                "thinking" => result.reasoning_blocks.push(ReasoningBlock {
                    summary: block.thinking.unwrap_or_default(),
                    signature: block.signature.unwrap_or_default(),
                    redacted: false,
                }),
                "redacted_thinking" => result.reasoning_blocks.push(ReasoningBlock {
                    summary: String::new(),
                    signature: block.data.unwrap_or_default(),
                    redacted: true,
                }),
                _ => {}
            }
        }
        result.content = text_parts.join("\n");

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ToolResult;

    #[test]
    fn system_messages_are_lifted_out_of_the_message_list() {
        let messages = vec![Message::system("be brief"), Message::user("hi")];
        let (system, wire) = build_messages(&messages);

        assert_eq!(system.len(), 1);
        assert_eq!(system[0].text, "be brief");
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].role, "user");
    }

    #[test]
    fn thinking_signature_is_echoed_byte_exact() {
        let mut msg = Message::assistant("done");
        msg.tool_calls.push(ToolCall {
            id: "toolu_1".to_string(),
            name: "echo".to_string(),
            arguments: "{}".to_string(),
        });
        msg.reasoning_blocks.push(ReasoningBlock {
            summary: "chain".to_string(),
            signature: "sig-ABC==".to_string(),
            redacted: false,
        });

        let (_, wire) = build_messages(&[msg]);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json[0]["content"][0]["type"], "thinking");
        assert_eq!(json[0]["content"][0]["signature"], "sig-ABC==");
        assert_eq!(json[0]["content"][1]["type"], "text");
        assert_eq!(json[0]["content"][2]["type"], "tool_use");
    }

    #[test]
    fn redacted_thinking_round_trips_as_data() {
        let mut msg = Message::assistant("");
        msg.tool_calls.push(ToolCall {
            id: "toolu_2".to_string(),
            name: "echo".to_string(),
            arguments: "{}".to_string(),
        });
        msg.reasoning_blocks.push(ReasoningBlock {
            summary: String::new(),
            signature: "opaque-blob".to_string(),
            redacted: true,
        });

        let (_, wire) = build_messages(&[msg]);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json[0]["content"][0]["type"], "redacted_thinking");
        assert_eq!(json[0]["content"][0]["data"], "opaque-blob");
    }

    #[test]
    fn tool_results_become_user_tool_result_blocks() {
        let msg = Message::tool(ToolResult {
            call_id: "toolu_3".to_string(),
            name: "read_file".to_string(),
            content: "nope".to_string(),
            is_error: true,
        });

        let (_, wire) = build_messages(&[msg]);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json[0]["role"], "user");
        assert_eq!(json[0]["content"][0]["type"], "tool_result");
        assert_eq!(json[0]["content"][0]["tool_use_id"], "toolu_3");
        assert_eq!(json[0]["content"][0]["is_error"], true);
    }

    #[test]
    fn malformed_tool_arguments_fall_back_to_empty_object() {
        let call = ToolCall {
            id: "toolu_4".to_string(),
            name: "echo".to_string(),
            arguments: "not json".to_string(),
        };

        let block = WireBlock::tool_use(&call);
        assert_eq!(block.input, Some(Value::Object(Default::default())));
    }
}
