//! Agenty AI - provider adapters and tool-calling runtime
//!
//! This crate provides:
//! - Normalized chat types and the `ChatProvider` capability
//! - Wire adapters for OpenAI-compatible, Anthropic, Gemini, and Kimi APIs
//! - The bounded agent loop (`ChatExecutor`)
//! - Tool registry and built-in file/shell/memory tools
//! - OpenAI-compatible embedding client

pub mod embedding;
pub mod error;
pub mod executor;
mod http_client;
pub mod llm;
pub mod tools;

pub use embedding::{normalize_vector, EmbeddingClient};
pub use error::{AiError, Result};
pub use executor::{ChatExecutor, ChatParams, ChatResult, MAX_TOOL_CALL_ITERATIONS};
pub use llm::{
    ApiKind, ChatProvider, ChatRequest, ChatResponse, JsonSchemaFormat, Message, ReasoningBlock,
    ResponseFormat, ResponseFormatKind, Role, ToolCall, ToolResult,
};
pub use tools::{
    ListDirectoryTool, MemoryBackend, MemoryMatch, ParameterProperty, ReadFileTool, Registry,
    ReplaceInFileTool, RunShellCommandTool, SaveMemoryTool, SearchMemoryTool, Tool, ToolDefinition,
    ToolParameters, WriteFileTool,
};
