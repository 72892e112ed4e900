//! solace-server/src/api.rs
//!
//! JSON envelope for REST responses: `{"success": true, ...}` or
//! `{"success": false, "error": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use solace_core::Error;

/// Wraps the shared error so handlers can use `?`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_storage() {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        match &self.0 {
            Error::Validation(_) | Error::Parse(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_storage() {
            error!("Storage failure while handling request: {:?}", self.0);
        } else if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:?}", self.0);
        }
        let message = match &self.0 {
            Error::Json(e) => e.to_string(),
            other => other.client_message(),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

pub type ApiResult = Result<Json<Value>, ApiError>;

/// `{"success": true}` merged with the fields of `body`.
pub fn ok(body: Value) -> Json<Value> {
    let mut envelope = json!({ "success": true });
    if let (Some(target), Value::Object(fields)) = (envelope.as_object_mut(), body) {
        target.extend(fields);
    }
    Json(envelope)
}
