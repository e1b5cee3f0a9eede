//! Model entity and store

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::pagination::PageRequest;
use crate::provider::ModelProviderDto;

/// A named model hosted by one provider. `code` is the string sent to the
/// provider on the wire; `name` is the display name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Model {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub code: String,
    pub default_model: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDto {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ModelProviderDto>,
    pub name: String,
    pub code: String,
    pub default_model: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn to_dto(&self, provider: Option<ModelProviderDto>) -> ModelDto {
        ModelDto {
            id: self.id,
            provider,
            name: self.name.clone(),
            code: self.code.clone(),
            default_model: self.default_model,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct ModelStore {
    pool: PgPool,
}

impl ModelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        provider_id: Uuid,
        name: &str,
        code: &str,
        default_model: bool,
    ) -> Result<Model> {
        let mut tx = self.pool.begin().await?;

        // A new default displaces the previous one.
        if default_model {
            sqlx::query(
                "UPDATE models SET default_model = FALSE \
                 WHERE default_model IS TRUE AND deleted_at IS NULL",
            )
            .execute(&mut *tx)
            .await?;
        }

        let model = sqlx::query_as::<_, Model>(
            "INSERT INTO models (id, provider_id, name, code, default_model) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(provider_id)
        .bind(name)
        .bind(code)
        .bind(default_model)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(model)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Model>> {
        let model =
            sqlx::query_as::<_, Model>("SELECT * FROM models WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(model)
    }

    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Model>> {
        let models = sqlx::query_as::<_, Model>(
            "SELECT * FROM models WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(models)
    }

    pub async fn find_default(&self) -> Result<Option<Model>> {
        let model = sqlx::query_as::<_, Model>(
            "SELECT * FROM models WHERE default_model IS TRUE AND deleted_at IS NULL",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(model)
    }

    pub async fn find_latest(&self) -> Result<Option<Model>> {
        let model = sqlx::query_as::<_, Model>(
            "SELECT * FROM models WHERE deleted_at IS NULL ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(model)
    }

    pub async fn name_exists(
        &self,
        provider_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM models \
             WHERE provider_id = $1 AND name = $2 AND deleted_at IS NULL \
             AND ($3::uuid IS NULL OR id != $3)",
        )
        .bind(provider_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn code_exists(
        &self,
        provider_id: Uuid,
        code: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM models \
             WHERE provider_id = $1 AND code = $2 AND deleted_at IS NULL \
             AND ($3::uuid IS NULL OR id != $3)",
        )
        .bind(provider_id)
        .bind(code)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn list(&self, page: &PageRequest) -> Result<(Vec<Model>, i64)> {
        let models = sqlx::query_as::<_, Model>(
            "SELECT * FROM models WHERE deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM models WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;

        Ok((models, total))
    }

    pub async fn list_by_provider(
        &self,
        provider_id: Uuid,
        page: &PageRequest,
    ) -> Result<(Vec<Model>, i64)> {
        let models = sqlx::query_as::<_, Model>(
            "SELECT * FROM models WHERE provider_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(provider_id)
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM models WHERE provider_id = $1 AND deleted_at IS NULL",
        )
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((models, total))
    }

    pub async fn update_fields(&self, model: &Model) -> Result<()> {
        sqlx::query(
            "UPDATE models SET name = $2, code = $3, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(model.id)
        .bind(&model.name)
        .bind(&model.code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Flip the default flag, clearing any previous default in the same
    /// transaction so at most one live row carries it.
    pub async fn set_default(&self, id: Uuid, default_model: bool) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if default_model {
            sqlx::query(
                "UPDATE models SET default_model = FALSE \
                 WHERE default_model IS TRUE AND deleted_at IS NULL",
            )
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE models SET default_model = $2, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(default_model)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE models SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
