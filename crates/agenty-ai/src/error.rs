//! Error types for the AI crate

use thiserror::Error;

/// AI runtime error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for AI operations
pub type Result<T> = std::result::Result<T, AiError>;
