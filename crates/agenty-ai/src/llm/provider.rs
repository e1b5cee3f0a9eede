//! Normalized chat types and the provider capability trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::tools::ToolDefinition;

/// Wire protocol family of a provider endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    OpenAi,
    Anthropic,
    Gemini,
    Kimi,
}

impl ApiKind {
    /// Parse a provider type tag. Returns `None` for unknown tags;
    /// callers that must not fail fall back to [`ApiKind::OpenAi`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "gemini" => Some(Self::Gemini),
            "kimi" => Some(Self::Kimi),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Kimi => "kimi",
        }
    }
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

/// A tool invocation requested by the model. `arguments` is kept as the raw
/// JSON string the provider produced; it is never re-parsed and re-emitted,
/// so key order and whitespace survive persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Result of one tool invocation, paired to its call by `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

/// Provider-specific chain-of-thought payload. Anthropic `thinking` blocks
/// carry a cryptographic signature that must be echoed back unchanged;
/// `redacted_thinking` blocks carry only opaque data in `signature`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningBlock {
    pub summary: String,
    pub signature: String,
    #[serde(default)]
    pub redacted: bool,
}

/// One normalized conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning_blocks: Vec<ReasoningBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(result: ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: result.content.clone(),
            tool_calls: Vec::new(),
            tool_result: Some(result),
            reasoning_blocks: Vec::new(),
            reasoning_content: None,
        }
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_result: None,
            reasoning_blocks: Vec::new(),
            reasoning_content: None,
        }
    }
}

/// Structured-output format requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatKind {
    Text,
    JsonObject,
    JsonSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub description: String,
    pub strict: bool,
    pub schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFormat {
    pub kind: ResponseFormatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<JsonSchemaFormat>,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: ResponseFormatKind::JsonObject,
            json_schema: None,
        }
    }

    pub fn json_schema(schema: JsonSchemaFormat) -> Self {
        Self {
            kind: ResponseFormatKind::JsonSchema,
            json_schema: Some(schema),
        }
    }
}

/// Normalized request handed to an adapter.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub base_url: String,
    pub api_key: String,
    pub max_tokens: Option<u32>,
    pub response_format: Option<ResponseFormat>,
}

/// Normalized response from an adapter.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub reasoning_blocks: Vec<ReasoningBlock>,
    pub reasoning_content: Option<String>,
    pub total_tokens: i64,
}

/// One provider wire protocol translated to the normalized schema.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Run one chat completion round-trip
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_kind_parses_known_tags() {
        assert_eq!(ApiKind::from_tag("openai"), Some(ApiKind::OpenAi));
        assert_eq!(ApiKind::from_tag("anthropic"), Some(ApiKind::Anthropic));
        assert_eq!(ApiKind::from_tag("gemini"), Some(ApiKind::Gemini));
        assert_eq!(ApiKind::from_tag("kimi"), Some(ApiKind::Kimi));
        assert_eq!(ApiKind::from_tag("mystery"), None);
    }

    #[test]
    fn tool_call_arguments_survive_serialization_verbatim() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "echo".to_string(),
            arguments: "{\"b\": 1,  \"a\": 2}".to_string(),
        };

        let json = serde_json::to_string(&call).unwrap();
        let back: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back.arguments, "{\"b\": 1,  \"a\": 2}");
    }

    #[test]
    fn tool_result_uses_camel_case_fields() {
        let result = ToolResult {
            call_id: "call_1".to_string(),
            name: "echo".to_string(),
            content: "x".to_string(),
            is_error: true,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["callId"], "call_1");
        assert_eq!(json["isError"], true);
    }
}
