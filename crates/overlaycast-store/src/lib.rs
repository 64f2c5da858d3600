// ABOUTME: Persistence layer for overlaycast, backed entirely by the local filesystem.
// ABOUTME: Provides the JSON-file overlay record store and the upload blob store.

pub mod blobs;
pub mod records;

pub use blobs::{BlobError, BlobStore, UPLOAD_URL_PREFIX};
pub use records::{RecordStore, StoreError};
