//! Hybrid memory engine: embedding write path and three-way RRF retrieval

use std::collections::HashMap;

use agenty_ai::{EmbeddingClient, MemoryBackend, MemoryMatch};
use agenty_storage::{MemoryDto, MemorySearchResult, MemoryStore};
use async_trait::async_trait;
use tracing::error;
use uuid::Uuid;

use crate::error::{BusinessError, Result};

const RRF_K: f64 = 60.0;
const DEFAULT_SEARCH_LIMIT: usize = 5;

pub struct MemoryService {
    store: MemoryStore,
    embedder: Option<EmbeddingClient>,
}

impl MemoryService {
    pub fn new(store: MemoryStore, embedder: Option<EmbeddingClient>) -> Self {
        Self { store, embedder }
    }

    /// The engine is inert without an embedding endpoint; memory tools are
    /// not registered in that state.
    pub fn is_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            BusinessError::invalid_params("embedding service is not configured")
        })?;
        Ok(embedder.embed(text).await?)
    }

    pub async fn save_memory(&self, content: &str) -> Result<MemoryDto> {
        let embedding = self.embed(content).await.inspect_err(
            |err| error!(error = %err, "failed to embed memory content"),
        )?;

        let memory = self
            .store
            .insert(content, embedding)
            .await
            .inspect_err(|err| error!(error = %err, "failed to save memory"))?;
        Ok(memory.to_dto())
    }

    /// Three candidate searches (vector, full-text, substring), each over
    /// `3 * limit` rows, fused with Reciprocal Rank Fusion. A failed leg
    /// logs and contributes nothing.
    pub async fn search_memory(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemorySearchResult>> {
        let limit = if limit == 0 { DEFAULT_SEARCH_LIMIT } else { limit };
        let candidate_limit = (limit * 3) as i64;

        let vector_results = match self.embed(query).await {
            Ok(embedding) => self
                .store
                .vector_search(embedding, candidate_limit)
                .await
                .unwrap_or_else(|err| {
                    error!(error = %err, "vector search failed");
                    Vec::new()
                }),
            Err(err) => {
                error!(error = %err, "failed to embed search query");
                Vec::new()
            }
        };

        let full_text_results = self
            .store
            .full_text_search(query, candidate_limit)
            .await
            .unwrap_or_else(|err| {
                error!(error = %err, "full text search failed");
                Vec::new()
            });

        let keyword_results = self
            .store
            .keyword_search(query, candidate_limit)
            .await
            .unwrap_or_else(|err| {
                error!(error = %err, "keyword search failed");
                Vec::new()
            });

        let ranked = [
            to_ranked(vector_results),
            to_ranked(full_text_results),
            to_ranked(keyword_results),
        ];
        Ok(rrf_merge(limit, &ranked))
    }
}

fn to_ranked(memories: Vec<agenty_storage::Memory>) -> Vec<(Uuid, MemoryDto)> {
    memories.into_iter().map(|m| (m.id, m.to_dto())).collect()
}

/// Reciprocal Rank Fusion: `score(d) = Σ 1 / (K + rank)` over every list
/// containing `d`, ranks starting at 1. Ties keep first-seen order.
fn rrf_merge(limit: usize, result_sets: &[Vec<(Uuid, MemoryDto)>]) -> Vec<MemorySearchResult> {
    let mut scores: HashMap<Uuid, f64> = HashMap::new();
    let mut items: HashMap<Uuid, MemoryDto> = HashMap::new();
    let mut order: Vec<Uuid> = Vec::new();

    for results in result_sets {
        for (rank, (id, memory)) in results.iter().enumerate() {
            *scores.entry(*id).or_default() += 1.0 / (RRF_K + (rank + 1) as f64);
            if !items.contains_key(id) {
                items.insert(*id, memory.clone());
                order.push(*id);
            }
        }
    }

    let mut sorted = order;
    sorted.sort_by(|a, b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(limit);

    sorted
        .into_iter()
        .map(|id| MemorySearchResult {
            score: scores[&id],
            memory: items.remove(&id).expect("scored id has an item"),
        })
        .collect()
}

/// Bridge to the built-in `save_memory` / `search_memory` tools.
#[async_trait]
impl MemoryBackend for MemoryService {
    async fn save(&self, content: &str) -> anyhow::Result<String> {
        let dto = self
            .save_memory(content)
            .await
            .map_err(|err| anyhow::anyhow!("{}", err))?;
        Ok(dto.id.to_string())
    }

    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<MemoryMatch>> {
        let results = self
            .search_memory(query, limit)
            .await
            .map_err(|err| anyhow::anyhow!("{}", err))?;
        Ok(results
            .into_iter()
            .map(|r| MemoryMatch {
                content: r.memory.content,
                score: r.score,
            })
            .collect())
    }
}
