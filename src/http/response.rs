//! Client-facing error bodies.
//!
//! Every failure the gateway produces itself (as opposed to relaying an
//! upstream answer) is rendered as `{"detail": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// JSON error response with a single `detail` field.
pub fn detail_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}
