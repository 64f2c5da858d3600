// ABOUTME: Route definitions for the overlaycast HTTP API.
// ABOUTME: Assembles API routes, HLS output routes, and the static uploads directory into one Router.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/overlays",
            get(api::overlays::list_overlays).post(api::overlays::create_overlay),
        )
        .route(
            "/api/overlays/{id}",
            put(api::overlays::update_overlay).delete(api::overlays::delete_overlay),
        )
        .route(
            "/api/upload",
            post(api::uploads::upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/start-stream", post(api::stream::start_stream))
        .route("/api/streams", get(api::stream::list_jobs))
        .route(
            "/api/streams/{id}",
            get(api::stream::job_status).delete(api::stream::stop_job),
        )
        .route("/static/stream/{filename}", get(api::stream::stream_asset))
        .route(
            "/static/stream/{session}/{filename}",
            get(api::stream::session_stream_asset),
        )
        .nest_service("/static/uploads", uploads)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
