//! Pool construction and schema bootstrap

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

#[derive(Debug, Clone)]
pub struct DbOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl DbOptions {
    fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

pub async fn connect(options: &DbOptions) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&options.connection_url())
        .await
        .with_context(|| {
            format!(
                "failed to connect to postgres at {}:{}",
                options.host, options.port
            )
        })?;
    Ok(pool)
}

/// Create the vector extension, tables, and indexes if missing. The
/// embedding dimension is a deployment-wide constant; changing it requires
/// rebuilding the memories table.
pub async fn bootstrap_schema(pool: &PgPool, embedding_dimensions: usize) -> Result<()> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await
        .context("failed to create vector extension")?;

    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS model_providers (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            kind VARCHAR(50) NOT NULL,
            base_url VARCHAR(255) NOT NULL,
            api_key VARCHAR(255) NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            deleted_at TIMESTAMPTZ
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS models (
            id UUID PRIMARY KEY,
            provider_id UUID NOT NULL,
            name VARCHAR(255) NOT NULL,
            code VARCHAR(255) NOT NULL,
            default_model BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            deleted_at TIMESTAMPTZ
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id UUID PRIMARY KEY,
            token_consumed BIGINT NOT NULL DEFAULT 0,
            last_used_model UUID,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            deleted_at TIMESTAMPTZ
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id UUID PRIMARY KEY,
            session_id UUID NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
            role VARCHAR(50) NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            tool_calls JSONB,
            tool_results JSONB,
            provider_specifics JSONB,
            model_id UUID NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            deleted_at TIMESTAMPTZ
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS chat_messages_session_idx
            ON chat_messages (session_id, created_at)
        "#,
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to create table")?;
    }

    let memories = format!(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id UUID PRIMARY KEY,
            content TEXT NOT NULL,
            embedding vector({}) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            deleted_at TIMESTAMPTZ
        )
        "#,
        embedding_dimensions
    );
    sqlx::query(&memories)
        .execute(pool)
        .await
        .context("failed to create memories table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS memories_embedding_idx \
         ON memories USING hnsw (embedding vector_cosine_ops)",
    )
    .execute(pool)
    .await
    .context("failed to create embedding index")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS memories_content_fts_idx \
         ON memories USING gin (to_tsvector('simple', content))",
    )
    .execute(pool)
    .await
    .context("failed to create full-text index")?;

    info!("database schema ready");
    Ok(())
}
