//! LLM module - multi-provider chat adapters behind one normalized schema

mod anthropic;
mod gemini;
mod kimi;
pub mod mock;
mod openai;
mod provider;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use kimi::KimiProvider;
pub use mock::{MockProvider, MockStep};
pub use openai::OpenAiProvider;
pub use provider::{
    ApiKind, ChatProvider, ChatRequest, ChatResponse, JsonSchemaFormat, Message, ReasoningBlock,
    ResponseFormat, ResponseFormatKind, Role, ToolCall, ToolResult,
};
