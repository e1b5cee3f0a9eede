mod api;
mod middleware;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use agenty_ai::{
    ChatExecutor, EmbeddingClient, ListDirectoryTool, ReadFileTool, Registry, ReplaceInFileTool,
    RunShellCommandTool, SaveMemoryTool, SearchMemoryTool, WriteFileTool,
};
use agenty_core::{safe, AppConfig, ChatService, MemoryService, ModelService, ProviderService};
use agenty_storage::{
    bootstrap_schema, connect, seed, DbOptions, MemoryStore, MessageStore, ModelStore,
    ProviderStore, SessionStore,
};

use api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    let default_filter = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .init();

    tracing::info!("starting agenty server");

    let (shutdown_tx, shutdown_rx) = safe::shutdown_channel();
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    let embedding_dimensions = config
        .embedding
        .as_ref()
        .map(|e| e.dimensions)
        .unwrap_or(1536);

    tracing::info!("initializing database connection");
    let pool = connect(&DbOptions {
        host: config.db.host.clone(),
        port: config.db.port,
        username: config.db.username.clone(),
        password: config.db.password.clone(),
        database: config.db.database.clone(),
    })
    .await?;
    bootstrap_schema(&pool, embedding_dimensions).await?;
    seed::seed_presets(&pool).await?;

    let providers_store = ProviderStore::new(pool.clone());
    let models_store = ModelStore::new(pool.clone());
    let sessions_store = SessionStore::new(pool.clone());
    let messages_store = MessageStore::new(pool.clone());
    let memory_store = MemoryStore::new(pool.clone());

    let embedder = config
        .embedding
        .as_ref()
        .filter(|e| !e.api_key.is_empty())
        .map(|e| EmbeddingClient::new(&e.base_url, &e.api_key, &e.model, e.dimensions));
    let memory = Arc::new(MemoryService::new(memory_store, embedder));

    let allowed_roots = Arc::new(
        config
            .allowed_paths
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<_>>(),
    );
    let registry = Arc::new(Registry::new());
    registry.register(ReadFileTool::new(allowed_roots.clone()));
    registry.register(WriteFileTool::new(allowed_roots.clone()));
    registry.register(ReplaceInFileTool::new(allowed_roots.clone()));
    registry.register(ListDirectoryTool::new(allowed_roots.clone()));
    registry.register(RunShellCommandTool::new());
    if memory.is_enabled() {
        registry.register(SaveMemoryTool::new(memory.clone()));
        registry.register(SearchMemoryTool::new(memory.clone()));
    }

    let executor = Arc::new(ChatExecutor::new(registry));

    let state = AppState {
        chat: Arc::new(ChatService::new(
            executor,
            sessions_store,
            messages_store,
            models_store.clone(),
            providers_store.clone(),
            memory,
            shutdown_rx.clone(),
        )),
        providers: Arc::new(ProviderService::new(providers_store.clone())),
        models: Arc::new(ModelService::new(models_store, providers_store)),
    };

    let auth = Arc::new(config.auth.clone());

    let v1 = Router::new()
        .route("/chats/session", post(api::chats::create_session))
        .route("/chats/session/last", get(api::chats::get_last_session))
        .route("/chats/session/{id}", get(api::chats::get_session))
        .route("/chats/sessions", get(api::chats::list_sessions))
        .route("/chats/chat", post(api::chats::chat))
        .route(
            "/providers",
            get(api::providers::list_providers).post(api::providers::create_provider),
        )
        .route(
            "/providers/{id}",
            get(api::providers::get_provider)
                .put(api::providers::update_provider)
                .delete(api::providers::delete_provider),
        )
        .route(
            "/models",
            get(api::models::list_models).post(api::models::create_model),
        )
        .route("/models/default", get(api::models::get_default_model))
        .route(
            "/models/{id}",
            get(api::models::get_model)
                .put(api::models::update_model)
                .delete(api::models::delete_model),
        );

    let app = Router::new()
        .nest("/api/v1", v1)
        .layer(from_fn_with_state(auth, middleware::auth::basic_auth))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(port = config.port, "http server listening");

    let mut shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;

    tracing::info!("shutting down server");
    Ok(())
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(detail = %detail, "panic recovered in request handler");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"code": 500, "message": "internal server error"})),
    )
        .into_response()
}
