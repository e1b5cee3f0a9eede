//! Model CRUD handlers

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use agenty_core::{CreateModelDto, UpdateModelDto};
use agenty_storage::PageRequest;

use crate::api::response::{failed, respond};
use crate::api::{parse_uuid, state::AppState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModelsQuery {
    #[serde(default)]
    provider_id: Option<String>,
    #[serde(default)]
    page: i64,
    #[serde(default)]
    page_size: i64,
}

pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ListModelsQuery>,
) -> Response {
    let page = PageRequest {
        page: query.page,
        page_size: query.page_size,
    };

    match query.provider_id {
        Some(raw) => {
            let provider_id = match parse_uuid(&raw) {
                Ok(id) => id,
                Err(err) => return failed(&err),
            };
            respond(state.models.list_by_provider(provider_id, page).await)
        }
        None => respond(state.models.list(page).await),
    }
}

pub async fn create_model(
    State(state): State<AppState>,
    Json(dto): Json<CreateModelDto>,
) -> Response {
    respond(state.models.create(dto).await)
}

pub async fn get_default_model(State(state): State<AppState>) -> Response {
    respond(state.models.get_default().await)
}

pub async fn get_model(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let model_id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(err) => return failed(&err),
    };
    respond(state.models.get(model_id).await)
}

pub async fn update_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(dto): Json<UpdateModelDto>,
) -> Response {
    let model_id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(err) => return failed(&err),
    };
    respond(state.models.update(model_id, dto).await)
}

pub async fn delete_model(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let model_id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(err) => return failed(&err),
    };
    respond(state.models.delete(model_id).await)
}
