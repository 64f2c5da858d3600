// ABOUTME: Stream session API handlers: start a transcode, serve HLS output, inspect and stop jobs.
// ABOUTME: Playback URLs are rooted at the configured public base URL or the requesting client's host.

use axum::Json;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Uri, header};
use axum::response::IntoResponse;
use overlaycast_core::SourceKind;
use overlaycast_transcode::{JobSnapshot, PlaylistAsset};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use ulid::Ulid;

use crate::app_state::SharedState;
use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};

/// Request body for starting a stream. `rtsp_url` may be any network URL or a local path.
#[derive(Debug, Deserialize)]
pub struct StartStreamRequest {
    pub rtsp_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartStreamResponse {
    pub stream_url: String,
    pub session_id: String,
    pub kind: SourceKind,
}

/// Base URL clients should use to reach this server, without a trailing slash.
///
/// Prefers the configured public base URL, then the request's Host header
/// (or URI authority) with the scheme from X-Forwarded-Proto, and finally
/// the bind address.
pub fn request_base_url(config: &ServerConfig, headers: &HeaderMap, uri: &Uri) -> String {
    if let Some(url) = &config.public_base_url {
        return url.clone();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()));

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");

    match host {
        Some(host) => format!("{}://{}", scheme, host),
        None => format!("http://{}", config.bind),
    }
}

/// POST /api/start-stream - Launch a transcoder for the given source.
pub async fn start_stream(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    body: Result<Json<StartStreamRequest>, JsonRejection>,
) -> ApiResult<Json<StartStreamResponse>> {
    let Json(req) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let source = req.rtsp_url.unwrap_or_default();

    let base_url = request_base_url(&state.config, &headers, &uri);
    let session = state.streams.start(&source, &base_url).await?;

    Ok(Json(StartStreamResponse {
        stream_url: session.playback_url,
        session_id: session.id.to_string(),
        kind: session.kind,
    }))
}

/// GET /static/stream/{filename} - Serve a playlist or segment from the shared output directory.
pub async fn stream_asset(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let asset = state.streams.serve_asset(None, &filename).await?;
    Ok(asset_response(asset))
}

/// GET /static/stream/{session}/{filename} - Serve a file from one session's directory.
pub async fn session_stream_asset(
    State(state): State<SharedState>,
    Path((session, filename)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let asset = state.streams.serve_asset(Some(&session), &filename).await?;
    Ok(asset_response(asset))
}

/// Stream the file body instead of buffering whole segments.
fn asset_response(asset: PlaylistAsset) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, asset.content_type.to_string()),
            (header::CONTENT_LENGTH, asset.len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(asset.file)),
    )
}

fn parse_job_id(id: &str) -> ApiResult<Ulid> {
    id.parse::<Ulid>()
        .map_err(|_| ApiError::bad_request("invalid stream id"))
}

/// GET /api/streams - List every transcode job launched since startup.
pub async fn list_jobs(State(state): State<SharedState>) -> Json<Vec<JobSnapshot>> {
    Json(state.streams.jobs().await)
}

/// GET /api/streams/{id} - Current status of one job.
pub async fn job_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let id = parse_job_id(&id)?;
    Ok(Json(state.streams.status(id).await?))
}

/// DELETE /api/streams/{id} - Stop a job's transcoder if it is still running.
pub async fn stop_job(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let id = parse_job_id(&id)?;
    Ok(Json(state.streams.stop(id).await?))
}
