//! Memory tools bound to a pluggable backend
//!
//! The backend lives with the service layer; these tools only shape the
//! model-facing contract. They are registered only when the memory engine
//! is enabled.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AiError, Result};
use crate::tools::traits::{Tool, ToolDefinition, ToolParameters};

const MEMORY_TOP_K: usize = 5;

/// One search hit returned by the memory backend.
#[derive(Debug, Clone)]
pub struct MemoryMatch {
    pub content: String,
    pub score: f64,
}

/// Long-term memory capability consumed by the built-in memory tools.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Persist one fact, returning its id.
    async fn save(&self, content: &str) -> anyhow::Result<String>;

    /// Hybrid search over stored facts.
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<MemoryMatch>>;
}

pub struct SaveMemoryTool {
    backend: Arc<dyn MemoryBackend>,
}

impl SaveMemoryTool {
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct SaveMemoryArgs {
    content: String,
}

#[async_trait]
impl Tool for SaveMemoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "save_memory".to_string(),
            description:
                "Save a piece of information to long-term memory for future reference. Use this to remember important facts, user preferences, or key information from conversations."
                    .to_string(),
            parameters: ToolParameters::object()
                .property(
                    "content",
                    "string",
                    "The information to save to memory. Should be a clear, concise statement of the fact or information to remember.",
                )
                .required(&["content"]),
        }
    }

    async fn execute(&self, arguments: &str) -> Result<String> {
        let args: SaveMemoryArgs =
            serde_json::from_str(arguments).map_err(|err| AiError::InvalidArguments(err.to_string()))?;

        if args.content.trim().is_empty() {
            return Err(AiError::InvalidArguments(
                "content cannot be empty".to_string(),
            ));
        }

        let id = self
            .backend
            .save(args.content.trim())
            .await
            .map_err(|err| AiError::Tool(format!("failed to save memory: {}", err)))?;

        Ok(format!("Memory saved successfully with ID: {}", id))
    }
}

pub struct SearchMemoryTool {
    backend: Arc<dyn MemoryBackend>,
}

impl SearchMemoryTool {
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[derive(Deserialize)]
struct SearchMemoryArgs {
    query: String,
}

#[async_trait]
impl Tool for SearchMemoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_memory".to_string(),
            description:
                "Search long-term memory for relevant information. Uses semantic search, full-text search, and keyword matching to find the most relevant memories."
                    .to_string(),
            parameters: ToolParameters::object()
                .property("query", "string", "The search query to find relevant memories")
                .required(&["query"]),
        }
    }

    async fn execute(&self, arguments: &str) -> Result<String> {
        let args: SearchMemoryArgs =
            serde_json::from_str(arguments).map_err(|err| AiError::InvalidArguments(err.to_string()))?;

        if args.query.trim().is_empty() {
            return Err(AiError::InvalidArguments("query cannot be empty".to_string()));
        }

        let results = self
            .backend
            .search(&args.query, MEMORY_TOP_K)
            .await
            .map_err(|err| AiError::Tool(format!("failed to search memory: {}", err)))?;

        if results.is_empty() {
            return Ok("No relevant memories found.".to_string());
        }

        let mut output = format!("Found {} relevant memories:\n\n", results.len());
        for (i, result) in results.iter().enumerate() {
            output.push_str(&format!(
                "{}. [Score: {:.4}] {}\n",
                i + 1,
                result.score,
                result.content
            ));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeBackend {
        saved: Mutex<Vec<String>>,
        results: Vec<MemoryMatch>,
    }

    #[async_trait]
    impl MemoryBackend for FakeBackend {
        async fn save(&self, content: &str) -> anyhow::Result<String> {
            self.saved.lock().unwrap().push(content.to_string());
            Ok("mem-1".to_string())
        }

        async fn search(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<MemoryMatch>> {
            Ok(self.results.clone())
        }
    }

    #[tokio::test]
    async fn save_memory_trims_and_reports_id() {
        let backend = Arc::new(FakeBackend::default());
        let tool = SaveMemoryTool::new(backend.clone());

        let output = tool
            .execute("{\"content\": \"  user likes tea  \"}")
            .await
            .unwrap();

        assert!(output.contains("mem-1"));
        assert_eq!(backend.saved.lock().unwrap()[0], "user likes tea");
    }

    #[tokio::test]
    async fn save_memory_rejects_blank_content() {
        let tool = SaveMemoryTool::new(Arc::new(FakeBackend::default()));
        assert!(tool.execute("{\"content\": \"   \"}").await.is_err());
    }

    #[tokio::test]
    async fn search_memory_formats_scored_results() {
        let backend = Arc::new(FakeBackend {
            saved: Mutex::new(Vec::new()),
            results: vec![MemoryMatch {
                content: "Paris is the capital of France".to_string(),
                score: 0.0323,
            }],
        });
        let tool = SearchMemoryTool::new(backend);

        let output = tool.execute("{\"query\": \"capital France\"}").await.unwrap();
        assert!(output.contains("Found 1 relevant memories"));
        assert!(output.contains("[Score: 0.0323]"));
    }

    #[tokio::test]
    async fn search_memory_handles_empty_results() {
        let tool = SearchMemoryTool::new(Arc::new(FakeBackend::default()));
        let output = tool.execute("{\"query\": \"anything\"}").await.unwrap();
        assert_eq!(output, "No relevant memories found.");
    }
}
