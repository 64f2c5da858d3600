// ABOUTME: Upload sink that writes named byte payloads into a fixed directory.
// ABOUTME: Same-name uploads overwrite silently; content is never inspected.

use std::fs;
use std::io;
use std::path::PathBuf;

use overlaycast_core::is_plain_file_name;
use thiserror::Error;

/// URL path under which saved uploads are served.
pub const UPLOAD_URL_PREFIX: &str = "/static/uploads";

/// Errors that can occur while saving an upload.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("No file uploaded")]
    MissingPayload,

    #[error("invalid upload file name: {0:?}")]
    InvalidName(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Directory-backed store for uploaded files.
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `payload` verbatim as `<dir>/<name>` and return its retrieval
    /// path. Fails with [`BlobError::MissingPayload`] when no payload was
    /// supplied. Creates the directory if it does not exist.
    pub fn save(&self, name: &str, payload: Option<&[u8]>) -> Result<String, BlobError> {
        let bytes = payload.ok_or(BlobError::MissingPayload)?;
        if !is_plain_file_name(name) {
            return Err(BlobError::InvalidName(name.to_string()));
        }

        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(name), bytes)?;

        tracing::info!("saved upload {} ({} bytes)", name, bytes.len());
        Ok(format!("{UPLOAD_URL_PREFIX}/{name}"))
    }
}
