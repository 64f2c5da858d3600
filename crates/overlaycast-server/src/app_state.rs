// ABOUTME: Shared application state for the overlaycast HTTP server.
// ABOUTME: Holds the record store, blob store, stream session manager, and the loaded config.

use std::io;
use std::sync::Arc;

use overlaycast_store::{BlobStore, RecordStore};
use overlaycast_transcode::StreamSessionManager;

use crate::config::ServerConfig;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub records: RecordStore,
    pub blobs: BlobStore,
    pub streams: StreamSessionManager,
    pub config: ServerConfig,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build the stores and the session manager from the config's paths.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            records: RecordStore::new(config.overlay_file.clone()),
            blobs: BlobStore::new(config.upload_dir.clone()),
            streams: StreamSessionManager::new(config.stream_config()),
            config,
        }
    }

    /// Create the upload and stream directories if they do not exist.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.config.upload_dir)?;
        std::fs::create_dir_all(&self.config.stream_dir)?;
        Ok(())
    }
}
