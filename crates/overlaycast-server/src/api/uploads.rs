// ABOUTME: Upload API handler that accepts a multipart "file" field and stores it in the blob store.
// ABOUTME: Responds with the static URL the uploaded file is served from.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::multipart::{Multipart, MultipartRejection};
use overlaycast_store::BlobError;
use serde::Serialize;

use crate::app_state::SharedState;
use crate::error::{ApiError, ApiResult};

/// Name of the multipart field that carries the upload.
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// POST /api/upload - Save the `file` field under the file name the client sent.
pub async fn upload_file(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    // A request that is not multipart at all carries no file either.
    let Ok(mut multipart) = multipart else {
        return Err(BlobError::MissingPayload.into());
    };

    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        upload = Some((name, bytes));
        break;
    }

    let (name, bytes) = match upload {
        Some((name, bytes)) => (name, Some(bytes)),
        None => (String::new(), None),
    };
    let url = state.blobs.save(&name, bytes.as_deref())?;

    Ok(Json(UploadResponse { url }))
}
