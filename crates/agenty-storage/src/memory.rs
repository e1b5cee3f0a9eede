//! Memory entity and the three candidate searches behind hybrid retrieval

use anyhow::Result;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Memory {
    pub id: Uuid,
    pub content: String,
    pub embedding: Vector,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryDto {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memory {
    pub fn to_dto(&self) -> MemoryDto {
        MemoryDto {
            id: self.id,
            content: self.content.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemorySearchResult {
    pub memory: MemoryDto,
    pub score: f64,
}

#[derive(Clone)]
pub struct MemoryStore {
    pool: PgPool,
}

impl MemoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, content: &str, embedding: Vec<f32>) -> Result<Memory> {
        let memory = sqlx::query_as::<_, Memory>(
            "INSERT INTO memories (id, content, embedding) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(content)
        .bind(Vector::from(embedding))
        .fetch_one(&self.pool)
        .await?;
        Ok(memory)
    }

    /// Nearest neighbors by cosine distance, closest first.
    pub async fn vector_search(&self, embedding: Vec<f32>, limit: i64) -> Result<Vec<Memory>> {
        let memories = sqlx::query_as::<_, Memory>(
            "SELECT * FROM memories WHERE deleted_at IS NULL \
             ORDER BY embedding <=> $1 LIMIT $2",
        )
        .bind(Vector::from(embedding))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(memories)
    }

    /// Full-text candidates ranked by ts_rank. The tsquery OR-joins the
    /// query tokens; see [`build_tsquery`].
    pub async fn full_text_search(&self, query: &str, limit: i64) -> Result<Vec<Memory>> {
        let Some(tsquery) = build_tsquery(query) else {
            return Ok(Vec::new());
        };

        let memories = sqlx::query_as::<_, Memory>(
            "SELECT * FROM memories WHERE deleted_at IS NULL \
             AND to_tsvector('simple', content) @@ to_tsquery('simple', $1) \
             ORDER BY ts_rank(to_tsvector('simple', content), to_tsquery('simple', $1)) DESC \
             LIMIT $2",
        )
        .bind(tsquery)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(memories)
    }

    /// Substring candidates: rows matching any whitespace token of the
    /// query, case-insensitively.
    pub async fn keyword_search(&self, query: &str, limit: i64) -> Result<Vec<Memory>> {
        let patterns = build_like_patterns(query);
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        let memories = sqlx::query_as::<_, Memory>(
            "SELECT * FROM memories WHERE deleted_at IS NULL \
             AND content ILIKE ANY($1) LIMIT $2",
        )
        .bind(patterns)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(memories)
    }
}

/// OR-join whitespace tokens into a `to_tsquery` expression. Returns `None`
/// for an all-whitespace query.
pub fn build_tsquery(query: &str) -> Option<String> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }
    Some(tokens.join(" | "))
}

/// `%token%` patterns for the ILIKE OR-chain.
pub fn build_like_patterns(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| format!("%{}%", token))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsquery_or_joins_tokens() {
        assert_eq!(
            build_tsquery("capital of France").as_deref(),
            Some("capital | of | France")
        );
    }

    #[test]
    fn tsquery_is_none_for_blank_query() {
        assert_eq!(build_tsquery("   "), None);
    }

    #[test]
    fn like_patterns_wrap_each_token() {
        assert_eq!(
            build_like_patterns("capital France"),
            vec!["%capital%", "%France%"]
        );
    }

    #[test]
    fn like_patterns_empty_for_blank_query() {
        assert!(build_like_patterns("").is_empty());
    }
}
