//! Provider CRUD handlers

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use agenty_core::{CreateProviderDto, UpdateProviderDto};
use agenty_storage::PageRequest;

use crate::api::response::{failed, respond};
use crate::api::{parse_uuid, state::AppState};

pub async fn list_providers(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> Response {
    respond(state.providers.list(page).await)
}

pub async fn create_provider(
    State(state): State<AppState>,
    Json(dto): Json<CreateProviderDto>,
) -> Response {
    respond(state.providers.create(dto).await)
}

pub async fn get_provider(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let provider_id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(err) => return failed(&err),
    };
    respond(state.providers.get(provider_id).await)
}

pub async fn update_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(dto): Json<UpdateProviderDto>,
) -> Response {
    let provider_id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(err) => return failed(&err),
    };
    respond(state.providers.update(provider_id, dto).await)
}

#[derive(Deserialize)]
pub struct DeleteProviderQuery {
    #[serde(default)]
    force: bool,
}

pub async fn delete_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteProviderQuery>,
) -> Response {
    let provider_id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(err) => return failed(&err),
    };
    respond(state.providers.delete(provider_id, query.force).await)
}
