//! Chat session and turn handlers

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use agenty_core::ChatDto;
use agenty_storage::PageRequest;

use crate::api::response::{failed, respond};
use crate::api::{parse_uuid, state::AppState};

pub async fn create_session(State(state): State<AppState>) -> Response {
    respond(state.chat.create_session().await)
}

pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let session_id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(err) => return failed(&err),
    };
    respond(state.chat.get_session(session_id).await)
}

pub async fn get_last_session(State(state): State<AppState>) -> Response {
    respond(state.chat.get_last_session().await)
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> Response {
    respond(state.chat.list_sessions(page).await)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatQuery {
    session_id: String,
}

pub async fn chat(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
    Json(dto): Json<ChatDto>,
) -> Response {
    let session_id = match parse_uuid(&query.session_id) {
        Ok(id) => id,
        Err(err) => return failed(&err),
    };
    respond(state.chat.chat(session_id, dto).await)
}
