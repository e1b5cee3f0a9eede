//! OpenAI-compatible embedding client

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};
use crate::http_client::build_http_client;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct WireResponse {
    data: Vec<WireEmbedding>,
}

#[derive(Deserialize)]
struct WireEmbedding {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        let base_url = base_url.into();
        let base_url = if base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url.trim_end_matches('/').to_string()
        };

        Self {
            client: build_http_client(),
            base_url,
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed one text and L2-normalize the result so cosine distance equals
    /// 1 - dot product even for providers that do not normalize.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = WireRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AiError::Embedding(format!(
                "embedding API error (status {}): {}",
                status, text
            )));
        }

        let data: WireResponse = response.json().await?;
        let embedding = data
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AiError::Embedding("empty embedding response".to_string()))?;

        Ok(normalize_vector(embedding))
    }
}

/// Scale a vector to unit length. The zero vector passes through unchanged.
pub fn normalize_vector(vec: Vec<f32>) -> Vec<f32> {
    let norm: f64 = vec.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>().sqrt();
    if norm == 0.0 {
        return vec;
    }
    vec.into_iter().map(|v| (v as f64 / norm) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l2(vec: &[f32]) -> f64 {
        vec.iter().map(|v| (*v as f64) * (*v as f64)).sum::<f64>().sqrt()
    }

    #[test]
    fn normalized_vector_has_unit_length() {
        let vec = normalize_vector(vec![3.0, 4.0]);
        assert!((l2(&vec) - 1.0).abs() < 1e-6);
        assert!((vec[0] - 0.6).abs() < 1e-6);
        assert!((vec[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn large_vectors_normalize_within_tolerance() {
        let vec: Vec<f32> = (1..=1536).map(|i| i as f32 * 0.001).collect();
        let normalized = normalize_vector(vec);
        assert!((l2(&normalized) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_passes_through() {
        let vec = normalize_vector(vec![0.0, 0.0, 0.0]);
        assert_eq!(vec, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn already_unit_vector_is_stable() {
        let vec = normalize_vector(vec![1.0, 0.0]);
        assert_eq!(vec, vec![1.0, 0.0]);
    }
}
