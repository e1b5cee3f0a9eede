//! Chat session entity and store

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::message::ChatMessageDto;
use crate::pagination::PageRequest;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatSession {
    pub id: Uuid,
    pub token_consumed: i64,
    pub last_used_model: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionDto {
    pub id: Uuid,
    pub token_consumed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_model: Option<Uuid>,
    pub messages: Vec<ChatMessageDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn to_dto(&self, messages: Vec<ChatMessageDto>) -> ChatSessionDto {
        ChatSessionDto {
            id: self.id,
            token_consumed: self.token_consumed,
            last_used_model: self.last_used_model,
            messages,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    pool: PgPool,
}

impl SessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, last_used_model: Option<Uuid>) -> Result<ChatSession> {
        let session = sqlx::query_as::<_, ChatSession>(
            "INSERT INTO chat_sessions (id, last_used_model) VALUES ($1, $2) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(last_used_model)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<ChatSession>> {
        let session = sqlx::query_as::<_, ChatSession>(
            "SELECT * FROM chat_sessions WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn find_last(&self) -> Result<Option<ChatSession>> {
        let session = sqlx::query_as::<_, ChatSession>(
            "SELECT * FROM chat_sessions WHERE deleted_at IS NULL \
             ORDER BY updated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn list(&self, page: &PageRequest) -> Result<(Vec<ChatSession>, i64)> {
        let sessions = sqlx::query_as::<_, ChatSession>(
            "SELECT * FROM chat_sessions WHERE deleted_at IS NULL \
             ORDER BY updated_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chat_sessions WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok((sessions, total))
    }

    /// Persist a turn's accounting. Read-modify-write: the caller supplies
    /// the new counter value it computed; concurrent turns may lose
    /// increments, which is acceptable for a best-effort counter.
    pub async fn record_usage(
        &self,
        id: Uuid,
        token_consumed: i64,
        last_used_model: Uuid,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE chat_sessions \
             SET token_consumed = $2, last_used_model = $3, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(token_consumed)
        .bind(last_used_model)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
