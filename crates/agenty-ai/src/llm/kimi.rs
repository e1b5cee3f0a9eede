//! Moonshot Kimi chat completions adapter
//!
//! OpenAI-compatible wire format with two Kimi extensions: a `thinking`
//! request toggle (disabled for models outside the kimi-k2 family) and a
//! `reasoning_content` field on assistant messages that must be sent back
//! on later turns to keep chain-of-thought continuity.

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

const DEFAULT_BASE_URL: &str = "https://api.moonshot.ai/v1";
const TOOL_TYPE_FUNCTION: &str = "function";
const THINKING_DISABLED: &str = "disabled";

pub struct KimiProvider {
    client: Client,
}

impl Default for KimiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl KimiProvider {
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
    thinking: Option<WireThinking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireResponseFormat>,
}

#[derive(Serialize)]
struct WireThinking {
    r#type: &'static str,
}

#[derive(Serialize)]
struct WireResponseFormat {
    r#type: &'static str,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reasoning_content: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    r#type: String,
    function: WireToolFunction,
}

#[derive(Serialize, Deserialize)]
struct WireToolFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    r#type: &'static str,
    function: WireToolFunctionDef,
}

#[derive(Serialize)]
struct WireToolFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireUsage {
    total_tokens: i64,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}

/// Thinking stays on only for the kimi-k2 model family.
fn is_thinking_model(model: &str) -> bool {
    model.starts_with("kimi-k2")
}

fn build_messages(messages: &[Message]) -> Vec<WireMessage> {
    messages
        .iter()
        .filter_map(|msg| match msg.role {
            Role::System => Some(WireMessage {
                role: "system".to_string(),
                content: msg.content.clone(),
                tool_calls: None,
                tool_call_id: None,
                reasoning_content: None,
            }),
            Role::User => Some(WireMessage {
                role: "user".to_string(),
                content: msg.content.clone(),
                tool_calls: None,
                tool_call_id: None,
                reasoning_content: msg.reasoning_content.clone(),
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
                                r#type: TOOL_TYPE_FUNCTION.to_string(),
                                function: WireToolFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };
                Some(WireMessage {
                    role: "assistant".to_string(),
                    content: msg.content.clone(),
                    tool_calls,
                    tool_call_id: None,
                    reasoning_content: msg.reasoning_content.clone(),
                })
            }
            Role::Tool => msg.tool_result.as_ref().map(|result| WireMessage {
                role: "tool".to_string(),
                content: result.content.clone(),
                tool_calls: None,
                tool_call_id: Some(result.call_id.clone()),
                reasoning_content: msg.reasoning_content.clone(),
            }),
        })
        .collect()
}

fn build_tools(defs: &[ToolDefinition]) -> Vec<WireTool> {
    defs.iter()
        .map(|def| WireTool {
            r#type: TOOL_TYPE_FUNCTION,
            function: WireToolFunctionDef {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.to_schema_value(),
            },
        })
        .collect()
}

#[async_trait]
impl ChatProvider for KimiProvider {
    fn name(&self) -> &str {
        "kimi"
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

        let thinking = if is_thinking_model(&request.model) {
            None
        } else {
            Some(WireThinking {
                r#type: THINKING_DISABLED,
            })
        };

        // Kimi has no strict-schema mode; json_schema downgrades to json_object.
        let response_format = request.response_format.as_ref().and_then(|f| match f.kind {
            ResponseFormatKind::JsonObject | ResponseFormatKind::JsonSchema => {
                Some(WireResponseFormat {
                    r#type: "json_object",
                })
            }
            ResponseFormatKind::Text => None,
        });

        let body = WireRequest {
            model: request.model.clone(),
            messages: build_messages(&request.messages),
            tools,
            thinking,
            response_format,
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
            let message = serde_json::from_str::<WireResponse>(&text)
                .ok()
                .and_then(|r| r.error.map(|e| e.message))
                .unwrap_or(text);
            return Err(AiError::Provider(format!(
                "Kimi API error (status {}): {}",
                status, message
            )));
        }

        let data: WireResponse = response.json().await?;
        if let Some(error) = data.error {
            return Err(AiError::Provider(format!("Kimi API error: {}", error.message)));
        }

        let mut result = ChatResponse {
            total_tokens: data.usage.map(|u| u.total_tokens).unwrap_or(0),
            ..Default::default()
        };

        if let Some(choice) = data.choices.into_iter().next() {
            result.content = choice.message.content;
            result.reasoning_content = choice.message.reasoning_content;
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
