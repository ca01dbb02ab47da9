//! Upload postback dispatch and stored-file serving.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    upload::models::UploadedFile,
    upload::transaction::{UploadRequest, SESSION_KEY_FIELD},
    widgets::upload::WidgetDescriptor,
    AppState,
};

/// Parses the multipart body once, then offers the postback to each
/// registered widget; the first widget that claims it produces the response.
pub async fn handle_upload_postback(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response> {
    let request = read_multipart(multipart).await?;

    for widget in state.widgets.iter() {
        if let Some(response) = widget.check_upload_postback(&headers, &request).await {
            return Ok(response);
        }
    }

    Err(AppError::NotFound(
        "No widget claimed the upload postback".to_string(),
    ))
}

async fn read_multipart(mut multipart: Multipart) -> Result<UploadRequest> {
    let mut request = UploadRequest::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        if let Some(filename) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(str::to_string).unwrap_or_else(|| {
                mime_guess::from_path(&filename)
                    .first_or_octet_stream()
                    .to_string()
            });

            // An error while draining the part means the byte stream did not
            // complete; that is a structural failure, not a rule violation.
            let data = field.bytes().await.map_err(|_| AppError::InvalidFile)?;

            request.push(&name, UploadedFile::new(filename, content_type, data.to_vec()));
        } else if name == SESSION_KEY_FIELD {
            let value = field.text().await.map_err(|e| {
                AppError::BadRequest(format!("Failed to read session key: {}", e))
            })?;
            request.set_session_key(value);
        }
    }

    Ok(request)
}

pub async fn serve_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> Result<Response> {
    let (stored, data) = state
        .store
        .get(file_id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let mut headers = HeaderMap::new();

    headers.insert(
        header::CONTENT_TYPE,
        stored.content_type.parse().unwrap_or_else(|_| {
            mime::APPLICATION_OCTET_STREAM.as_ref().parse().unwrap()
        }),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        data.len().to_string().parse().unwrap(),
    );

    Ok((StatusCode::OK, headers, data).into_response())
}

pub async fn list_widgets(State(state): State<AppState>) -> Json<Vec<WidgetDescriptor>> {
    Json(state.widget_descriptors.as_ref().clone())
}
