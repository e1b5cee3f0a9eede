//! Model provider entity and store

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::pagination::PageRequest;

/// An LLM endpoint identity. The API key never leaves the server; DTOs
/// carry a censored rendering only.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ModelProvider {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub base_url: String,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProviderDto {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub base_url: String,
    pub api_key_censored: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelProvider {
    pub fn to_dto(&self) -> ModelProviderDto {
        ModelProviderDto {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind.clone(),
            base_url: self.base_url.clone(),
            api_key_censored: censor_api_key(&self.api_key),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn censor_api_key(api_key: &str) -> String {
    if api_key.is_empty() {
        "<not set>".to_string()
    } else if api_key.len() > 10 {
        format!("{}****{}", &api_key[..4], &api_key[api_key.len() - 2..])
    } else {
        "****".to_string()
    }
}

#[derive(Clone)]
pub struct ProviderStore {
    pool: PgPool,
}

impl ProviderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        name: &str,
        kind: &str,
        base_url: &str,
        api_key: &str,
    ) -> Result<ModelProvider> {
        let provider = sqlx::query_as::<_, ModelProvider>(
            "INSERT INTO model_providers (id, name, kind, base_url, api_key) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(name)
        .bind(kind)
        .bind(base_url)
        .bind(api_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(provider)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<ModelProvider>> {
        let provider = sqlx::query_as::<_, ModelProvider>(
            "SELECT * FROM model_providers WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(provider)
    }

    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ModelProvider>> {
        let providers = sqlx::query_as::<_, ModelProvider>(
            "SELECT * FROM model_providers WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(providers)
    }

    pub async fn name_exists(&self, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM model_providers \
             WHERE name = $1 AND deleted_at IS NULL AND ($2::uuid IS NULL OR id != $2)",
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn exists_by_name_and_kind(&self, name: &str, kind: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM model_providers \
             WHERE name = $1 AND kind = $2 AND deleted_at IS NULL",
        )
        .bind(name)
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn list(&self, page: &PageRequest) -> Result<(Vec<ModelProvider>, i64)> {
        let providers = sqlx::query_as::<_, ModelProvider>(
            "SELECT * FROM model_providers WHERE deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM model_providers WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok((providers, total))
    }

    pub async fn update(&self, provider: &ModelProvider) -> Result<()> {
        sqlx::query(
            "UPDATE model_providers \
             SET name = $2, kind = $3, base_url = $4, api_key = $5, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(provider.id)
        .bind(&provider.name)
        .bind(&provider.kind)
        .bind(&provider.base_url)
        .bind(&provider.api_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Soft-delete a provider and, when `force` is set, its models in one
    /// transaction. Returns false when models exist and `force` is unset.
    pub async fn soft_delete(&self, id: Uuid, force: bool) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let model_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM models WHERE provider_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if model_count > 0 {
            if !force {
                tx.rollback().await?;
                return Ok(false);
            }
            sqlx::query(
                "UPDATE models SET deleted_at = now() \
                 WHERE provider_id = $1 AND deleted_at IS NULL",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE model_providers SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_api_keys_keep_head_and_tail() {
        assert_eq!(censor_api_key("sk-abcdef123456"), "sk-a****56");
    }

    #[test]
    fn short_api_keys_are_fully_masked() {
        assert_eq!(censor_api_key("short"), "****");
    }

    #[test]
    fn empty_api_key_reads_not_set() {
        assert_eq!(censor_api_key(""), "<not set>");
    }
}
