//! Response envelope: `{code, message, data}`
//!
//! Business errors ride an HTTP 200 with their own code in the envelope;
//! unexpected failures render as a generic 500 message.

use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use agenty_core::ServiceError;

#[derive(Serialize)]
pub struct GenericResponse<T: Serialize> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    Json(GenericResponse {
        code: 200,
        message: "ok".to_string(),
        data: Some(data),
    })
    .into_response()
}

pub fn failed(err: &ServiceError) -> Response {
    match err.business() {
        Some(business) => Json(GenericResponse::<()> {
            code: business.code,
            message: business.message.clone(),
            data: None,
        })
        .into_response(),
        None => {
            tracing::error!(error = %err, "request failed");
            Json(GenericResponse::<()> {
                code: 500,
                message: "internal server error".to_string(),
                data: None,
            })
            .into_response()
        }
    }
}

pub fn respond<T: Serialize>(result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(data) => ok(data),
        Err(err) => failed(&err),
    }
}
