// ABOUTME: HTTP server for overlaycast, exposing overlay CRUD, uploads, and stream sessions.
// ABOUTME: Uses Axum with a shared state holding the stores and the stream session manager.

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use routes::create_router;
