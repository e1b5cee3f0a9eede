//! Google Gemini generateContent adapter
//!
//! Gemini has no tool-call ids; `call_<functionName>` is synthesized so the
//! rest of the pipeline can pair calls with results. Tool results travel
//! back as `functionResponse` parts keyed by function name.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AiError, Result};
use crate::http_client::build_http_client;
use crate::llm::provider::{ChatProvider, ChatRequest, ChatResponse, Message, Role, ToolCall};
use crate::tools::ToolDefinition;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    client: Client,
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            client: build_http_client(),
        }
    }
}

#[derive(Serialize)]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireToolContainer>>,
}

#[derive(Serialize, Deserialize)]
struct WireContent {
    role: String,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize, Default)]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "functionCall", default, skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(
        rename = "functionResponse",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    function_response: Option<WireFunctionResponse>,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    args: Value,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Serialize)]
struct WireToolContainer {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<WireFunctionDecl>,
}

#[derive(Serialize)]
struct WireFunctionDecl {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireCandidate {
    content: WireContent,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: i64,
}

#[derive(Deserialize)]
struct WireErrorEnvelope {
    error: WireError,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}

fn build_contents(messages: &[Message]) -> Vec<WireContent> {
    let mut contents = Vec::new();

    for msg in messages {
        match msg.role {
            // Gemini has no dedicated system channel; inject as a user turn.
            Role::System | Role::User => contents.push(WireContent {
                role: "user".to_string(),
                parts: vec![WirePart {
                    text: Some(msg.content.clone()),
                    ..Default::default()
                }],
            }),
            Role::Assistant => {
                let mut parts = Vec::new();
                if !msg.content.is_empty() {
                    parts.push(WirePart {
                        text: Some(msg.content.clone()),
                        ..Default::default()
                    });
                }
                for call in &msg.tool_calls {
                    let args =
                        serde_json::from_str(&call.arguments).unwrap_or(Value::Object(Default::default()));
                    parts.push(WirePart {
                        function_call: Some(WireFunctionCall {
                            name: call.name.clone(),
                            args,
                        }),
                        ..Default::default()
                    });
                }
                contents.push(WireContent {
                    role: "model".to_string(),
                    parts,
                });
            }
            Role::Tool => {
                let Some(result) = &msg.tool_result else {
                    continue;
                };
                contents.push(WireContent {
                    role: "user".to_string(),
                    parts: vec![WirePart {
                        function_response: Some(WireFunctionResponse {
                            name: result.name.clone(),
                            response: serde_json::json!({"result": result.content}),
                        }),
                        ..Default::default()
                    }],
                });
            }
        }
    }

    contents
}

fn build_tools(defs: &[ToolDefinition]) -> Vec<WireToolContainer> {
    let declarations = defs
        .iter()
        .map(|def| WireFunctionDecl {
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: def.parameters.to_schema_value(),
        })
        .collect();
    vec![WireToolContainer {
        function_declarations: declarations,
    }]
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
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
            contents: build_contents(&request.messages),
            tools,
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            base_url, request.model, request.api_key
        );
        let response = self
            .client
            .post(url)
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
                "Gemini API error (status {}): {}",
                status, message
            )));
        }

        let data: WireResponse = response.json().await?;

        let mut result = ChatResponse {
            total_tokens: data
                .usage_metadata
                .map(|u| u.total_token_count)
                .unwrap_or(0),
            ..Default::default()
        };

        if let Some(candidate) = data.candidates.into_iter().next() {
            let mut text_parts = Vec::new();
            for part in candidate.content.parts {
                if let Some(text) = part.text {
                    if !text.is_empty() {
                        text_parts.push(text);
                    }
                }
                if let Some(call) = part.function_call {
                    result.tool_calls.push(ToolCall {
                        id: format!("call_{}", call.name),
                        name: call.name,
                        arguments: call.args.to_string(),
                    });
                }
            }
            result.content = text_parts.join("\n");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ToolResult;

    #[test]
    fn system_messages_become_leading_user_turns() {
        let messages = vec![Message::system("be brief"), Message::user("hi")];
        let contents = build_contents(&messages);

        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[0].parts[0].text.as_deref(), Some("be brief"));
    }

    #[test]
    fn assistant_tool_calls_become_function_call_parts() {
        let mut msg = Message::assistant("let me check");
        msg.tool_calls.push(ToolCall {
            id: "call_read_file".to_string(),
            name: "read_file".to_string(),
            arguments: "{\"path\":\"/tmp/a\"}".to_string(),
        });

        let contents = build_contents(&[msg]);
        let json = serde_json::to_value(&contents).unwrap();

        assert_eq!(json[0]["role"], "model");
        assert_eq!(json[0]["parts"][0]["text"], "let me check");
        assert_eq!(json[0]["parts"][1]["functionCall"]["name"], "read_file");
        assert_eq!(json[0]["parts"][1]["functionCall"]["args"]["path"], "/tmp/a");
    }

    #[test]
    fn tool_results_correlate_by_function_name() {
        let msg = Message::tool(ToolResult {
            call_id: "call_read_file".to_string(),
            name: "read_file".to_string(),
            content: "data".to_string(),
            is_error: false,
        });

        let contents = build_contents(&[msg]);
        let json = serde_json::to_value(&contents).unwrap();

        assert_eq!(json[0]["role"], "user");
        assert_eq!(json[0]["parts"][0]["functionResponse"]["name"], "read_file");
        assert_eq!(
            json[0]["parts"][0]["functionResponse"]["response"]["result"],
            "data"
        );
    }

    #[test]
    fn function_call_response_synthesizes_call_id() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "echo", "args": {"x": 1}}}]
                }
            }],
            "usageMetadata": {"totalTokenCount": 7}
        });

        let data: WireResponse = serde_json::from_value(raw).unwrap();
        let candidate = data.candidates.into_iter().next().unwrap();
        let call = candidate.content.parts[0].function_call.as_ref().unwrap();
        assert_eq!(format!("call_{}", call.name), "call_echo");
    }
}
