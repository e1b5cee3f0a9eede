//! Deterministic scripted provider for agent-loop tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{AiError, Result};
use crate::llm::provider::{ChatProvider, ChatRequest, ChatResponse, ToolCall};

/// One scripted completion step.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Return a plain assistant message.
    Text(String),
    /// Return one or more tool calls.
    ToolCalls(Vec<ToolCall>),
    /// Return a provider error.
    Error(String),
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::ToolCalls(vec![ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }])
    }
}

/// A scripted provider that pops one step per chat call. Each step consumes
/// a fixed 10 tokens so loop-level accounting stays assertable.
#[derive(Clone, Default)]
pub struct MockProvider {
    script: Arc<Mutex<VecDeque<MockStep>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockProvider {
    pub fn from_steps(steps: Vec<MockStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Requests seen so far, for asserting what reached the wire.
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().await.push(request.clone());

        let step = self.script.lock().await.pop_front();
        let Some(step) = step else {
            return Ok(ChatResponse {
                content: "mock-ok".to_string(),
                total_tokens: 10,
                ..Default::default()
            });
        };

        match step {
            MockStep::Text(content) => Ok(ChatResponse {
                content,
                total_tokens: 10,
                ..Default::default()
            }),
            MockStep::ToolCalls(tool_calls) => Ok(ChatResponse {
                tool_calls,
                total_tokens: 10,
                ..Default::default()
            }),
            MockStep::Error(message) => Err(AiError::Provider(message)),
        }
    }
}
