//! Terminal response shaping for upload postbacks.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::AppError;
use super::models::UploadPayload;

/// Converts a transaction outcome into the caller-visible JSON response.
/// The response is terminal: the dispatch host stops at the first widget
/// that produces one.
pub struct ResponseReporter;

impl ResponseReporter {
    /// Single-file uploads answer with one `{id, thumb, path}` object,
    /// batches with a list of them.
    pub fn success(payloads: Vec<UploadPayload>) -> Response {
        let body = match payloads.as_slice() {
            [single] => json!(single),
            many => json!(many),
        };

        (StatusCode::OK, Json(body)).into_response()
    }

    pub fn failure(error: &AppError) -> Response {
        let mut body = json!({
            "error": error.to_string(),
            "status": StatusCode::BAD_REQUEST.as_u16(),
        });

        if let AppError::ValidationFailed(violations) = error {
            body["violations"] = json!(violations);
        }

        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
