// ABOUTME: Overlay CRUD API handlers backed by the JSON-file record store.
// ABOUTME: Create returns the stored record; update and delete always acknowledge with success.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use overlaycast_core::OverlayRecord;
use serde::Serialize;
use serde_json::Value;

use crate::app_state::SharedState;
use crate::error::{ApiError, ApiResult};

/// Acknowledgement returned by update and delete.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Unwrap a JSON body that must be an object.
fn object_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<OverlayRecord> {
    let Json(value) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    match value {
        Value::Object(fields) => Ok(fields),
        _ => Err(ApiError::bad_request("overlay body must be a JSON object")),
    }
}

/// GET /api/overlays - List every overlay in storage order.
pub async fn list_overlays(State(state): State<SharedState>) -> ApiResult<Json<Vec<OverlayRecord>>> {
    Ok(Json(state.records.list()?))
}

/// POST /api/overlays - Store a new overlay and return it with its `_id`.
pub async fn create_overlay(
    State(state): State<SharedState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<OverlayRecord>> {
    let fields = object_body(body)?;
    Ok(Json(state.records.create(fields)?))
}

/// PUT /api/overlays/{id} - Merge fields into the overlay with this id.
pub async fn update_overlay(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let fields = object_body(body)?;
    state.records.update(&id, &fields)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// DELETE /api/overlays/{id} - Remove the overlay with this id.
pub async fn delete_overlay(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    state.records.delete(&id)?;
    Ok(Json(SuccessResponse { success: true }))
}
