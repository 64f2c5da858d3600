// ABOUTME: API module containing all HTTP handler functions for the overlaycast REST API.
// ABOUTME: Organized into sub-modules for overlay CRUD, uploads, and stream sessions.

pub mod overlays;
pub mod stream;
pub mod uploads;
