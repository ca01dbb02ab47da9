//! HTTP routes exposed by the upload service.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::AppState;
use super::uploads;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handle_root))
        .route("/backend/uploads", post(uploads::handle_upload_postback))
        .route("/backend/widgets", get(uploads::list_widgets))
        .route("/files/:id", get(uploads::serve_file))
}

async fn handle_root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "app": state.app_name,
        "version": state.version,
        "widgets": state.widget_descriptors.len(),
        "endpoints": {
            "uploads": "/backend/uploads",
            "widgets": "/backend/widgets",
            "file": "/files/{id}"
        }
    }))
}
