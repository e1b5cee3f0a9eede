//! Chat message entity and store
//!
//! Tool calls, tool results, and provider-specific payloads are stored as
//! opaque JSONB so the exact strings the provider produced survive
//! persistence untouched.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::model::ModelDto;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: String,
    pub content: String,
    pub tool_calls: Option<Value>,
    pub tool_results: Option<Value>,
    pub provider_specifics: Option<Value>,
    pub model_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Opaque per-provider payload attached to a message (Kimi reasoning
/// content, Anthropic thinking blocks).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpecifics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kimi_reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning_blocks: Vec<Value>,
}

impl ProviderSpecifics {
    pub fn is_empty(&self) -> bool {
        self.kimi_reasoning_content.is_none() && self.reasoning_blocks.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageDto {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_specifics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelDto>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn to_dto(&self, model: Option<ModelDto>) -> ChatMessageDto {
        ChatMessageDto {
            id: self.id,
            role: self.role.clone(),
            content: self.content.clone(),
            tool_calls: self.tool_calls.clone(),
            tool_result: self.tool_results.clone(),
            provider_specifics: self.provider_specifics.clone(),
            model,
            created_at: self.created_at,
        }
    }
}

/// Insert payload for one message row.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub session_id: Uuid,
    pub role: String,
    pub content: String,
    pub tool_calls: Option<Value>,
    pub tool_results: Option<Value>,
    pub provider_specifics: Option<Value>,
    pub model_id: Uuid,
}

#[derive(Clone)]
pub struct MessageStore {
    pool: PgPool,
}

impl MessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, message: &NewChatMessage) -> Result<ChatMessage> {
        let row = sqlx::query_as::<_, ChatMessage>(
            "INSERT INTO chat_messages \
             (id, session_id, role, content, tool_calls, tool_results, provider_specifics, model_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(message.session_id)
        .bind(&message.role)
        .bind(&message.content)
        .bind(&message.tool_calls)
        .bind(&message.tool_results)
        .bind(&message.provider_specifics)
        .bind(message.model_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a turn's messages preserving their order. Ids are v7, so
    /// insertion order and id order agree.
    pub async fn insert_many(&self, messages: &[NewChatMessage]) -> Result<Vec<ChatMessage>> {
        let mut rows = Vec::with_capacity(messages.len());
        let mut tx = self.pool.begin().await?;
        for message in messages {
            let row = sqlx::query_as::<_, ChatMessage>(
                "INSERT INTO chat_messages \
                 (id, session_id, role, content, tool_calls, tool_results, provider_specifics, model_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
            )
            .bind(Uuid::now_v7())
            .bind(message.session_id)
            .bind(&message.role)
            .bind(&message.content)
            .bind(&message.tool_calls)
            .bind(&message.tool_results)
            .bind(&message.provider_specifics)
            .bind(message.model_id)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }
        tx.commit().await?;
        Ok(rows)
    }

    pub async fn list_by_session(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatMessage>(
            "SELECT * FROM chat_messages WHERE session_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_specifics_round_trip() {
        let specifics = ProviderSpecifics {
            kimi_reasoning_content: Some("step 1".to_string()),
            reasoning_blocks: vec![serde_json::json!({"signature": "S", "summary": "t"})],
        };

        let value = serde_json::to_value(&specifics).unwrap();
        assert_eq!(value["kimiReasoningContent"], "step 1");

        let back: ProviderSpecifics = serde_json::from_value(value).unwrap();
        assert_eq!(back.kimi_reasoning_content.as_deref(), Some("step 1"));
        assert_eq!(back.reasoning_blocks.len(), 1);
    }

    #[test]
    fn empty_specifics_is_detected() {
        assert!(ProviderSpecifics::default().is_empty());
        let nonempty = ProviderSpecifics {
            kimi_reasoning_content: Some("x".to_string()),
            reasoning_blocks: Vec::new(),
        };
        assert!(!nonempty.is_empty());
    }
}
