//! Background memory evaluator
//!
//! Mines user-stated facts out of a finished turn with a secondary model
//! call. Never fails the main request: every error is logged and dropped.

use agenty_ai::{
    ApiKind, ChatExecutor, ChatParams, JsonSchemaFormat, Message, ResponseFormat, Role,
};
use agenty_storage::ModelProvider;
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use crate::prompts::memory_eval_prompt;
use crate::services::memory::MemoryService;

#[derive(Deserialize)]
struct EvalResult {
    #[serde(default)]
    facts: Vec<String>,
}

/// Build the conversational snippet the evaluator sees: the user message
/// plus assistant contents only. Tool output and reasoning are excluded so
/// the model cannot mine facts from them.
fn build_snippet(user_message: &str, assistant_messages: &[Message]) -> String {
    let mut snippet = format!("User: {}\n", user_message);
    for msg in assistant_messages {
        if msg.role == Role::Assistant && !msg.content.is_empty() {
            snippet.push_str("Assistant: ");
            snippet.push_str(&msg.content);
            snippet.push('\n');
        }
    }
    snippet
}

fn response_format_for(kind: ApiKind) -> ResponseFormat {
    if kind == ApiKind::OpenAi {
        ResponseFormat::json_schema(JsonSchemaFormat {
            name: "memory_evaluation".to_string(),
            description: "Extract facts from conversation for long-term memory".to_string(),
            strict: true,
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "facts": {
                        "type": "array",
                        "items": {"type": "string"}
                    }
                },
                "required": ["facts"],
                "additionalProperties": false
            }),
        })
    } else {
        ResponseFormat::json_object()
    }
}

pub(crate) async fn evaluate_and_save_memory(
    executor: &ChatExecutor,
    memory: &MemoryService,
    provider: &ModelProvider,
    model_code: &str,
    user_message: &str,
    assistant_messages: &[Message],
) {
    let kind = ApiKind::from_tag(&provider.kind).unwrap_or(ApiKind::OpenAi);

    let messages = vec![
        Message::system(memory_eval_prompt(Utc::now())),
        Message::user(build_snippet(user_message, assistant_messages)),
    ];

    let result = match executor
        .chat(ChatParams {
            messages,
            model: model_code.to_string(),
            base_url: provider.base_url.clone(),
            api_key: provider.api_key.clone(),
            kind,
            response_format: Some(response_format_for(kind)),
        })
        .await
    {
        Ok(result) => result,
        Err(err) => {
            error!(error = %err, "memory evaluation failed");
            return;
        }
    };

    let Some(content) = result
        .messages
        .iter()
        .find(|m| m.role == Role::Assistant && !m.content.is_empty())
        .map(|m| m.content.as_str())
    else {
        return;
    };

    let eval: EvalResult = match serde_json::from_str(content) {
        Ok(eval) => eval,
        Err(err) => {
            error!(error = %err, content, "failed to parse memory evaluation result");
            return;
        }
    };

    for fact in eval.facts {
        let fact = fact.trim();
        if fact.is_empty() {
            continue;
        }
        match memory.save_memory(fact).await {
            Ok(_) => info!(fact, "auto-saved memory"),
            Err(err) => error!(error = %err, fact, "failed to auto-save memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_includes_only_user_and_assistant_content() {
        let mut tool_msg = Message::tool(agenty_ai::ToolResult {
            call_id: "call_1".to_string(),
            name: "read_file".to_string(),
            content: "secret file contents".to_string(),
            is_error: false,
        });
        tool_msg.content = "secret file contents".to_string();

        let assistant_messages = vec![
            Message::assistant("Sure, checking."),
            tool_msg,
            Message::assistant("All done."),
        ];

        let snippet = build_snippet("I live in Berlin", &assistant_messages);
        assert_eq!(
            snippet,
            "User: I live in Berlin\nAssistant: Sure, checking.\nAssistant: All done.\n"
        );
        assert!(!snippet.contains("secret file contents"));
    }

    #[test]
    fn openai_gets_a_strict_schema() {
        let format = response_format_for(ApiKind::OpenAi);
        let schema = format.json_schema.unwrap();
        assert!(schema.strict);
        assert_eq!(schema.schema["required"][0], "facts");
    }

    #[test]
    fn other_providers_get_json_object() {
        for kind in [ApiKind::Anthropic, ApiKind::Gemini, ApiKind::Kimi] {
            let format = response_format_for(kind);
            assert_eq!(format.kind, agenty_ai::ResponseFormatKind::JsonObject);
            assert!(format.json_schema.is_none());
        }
    }

    #[test]
    fn eval_result_parses_strict_json() {
        let eval: EvalResult =
            serde_json::from_str("{\"facts\": [\"User lives in Berlin\", \"\"]}").unwrap();
        assert_eq!(eval.facts.len(), 2);
    }
}
