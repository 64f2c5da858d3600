// ABOUTME: Overlay record store persisted as a single pretty-printed JSON array.
// ABOUTME: Reloads on every call and rewrites the whole file atomically on every mutation.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use overlaycast_core::overlay::{self, OverlayRecord};
use thiserror::Error;

/// Errors that can occur while reading or writing the overlay file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("overlay file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read overlay file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write overlay file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// File-backed store of overlay records.
///
/// The store holds no state besides its path: every operation loads the
/// full sequence from disk, and every mutation writes the full sequence
/// back. There is no locking, so two concurrent writers can lose each
/// other's changes.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the backing JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in file order. A missing or blank file means no records.
    pub fn list(&self) -> Result<Vec<OverlayRecord>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Append a new record. Its `_id` is one more than the number of records
    /// currently stored, so ids can repeat after deletions.
    pub fn create(&self, mut fields: OverlayRecord) -> Result<OverlayRecord, StoreError> {
        let mut records = self.list()?;
        overlay::assign_id(&mut fields, overlay::next_id(records.len()));
        records.push(fields.clone());
        self.persist(&records)?;

        tracing::debug!(
            "created overlay {} ({} total)",
            overlay::record_id(&fields).unwrap_or_default(),
            records.len()
        );
        Ok(fields)
    }

    /// Shallow-merge `fields` into every record with the given id.
    /// Returns how many records matched; zero is not an error.
    pub fn update(&self, id: &str, fields: &OverlayRecord) -> Result<usize, StoreError> {
        let mut records = self.list()?;
        let mut matched = 0;
        for record in records.iter_mut().filter(|r| overlay::has_id(r, id)) {
            overlay::merge_fields(record, fields);
            matched += 1;
        }
        self.persist(&records)?;

        tracing::debug!("updated overlay {} ({} matched)", id, matched);
        Ok(matched)
    }

    /// Remove every record with the given id. Returns how many were removed.
    pub fn delete(&self, id: &str) -> Result<usize, StoreError> {
        let mut records = self.list()?;
        let before = records.len();
        records.retain(|r| !overlay::has_id(r, id));
        let removed = before - records.len();
        self.persist(&records)?;

        tracing::debug!("deleted overlay {} ({} removed)", id, removed);
        Ok(removed)
    }

    /// Write the full sequence using atomic write (write to .tmp, fsync, rename).
    /// Creates the parent directory if it does not exist.
    fn persist(&self, records: &[OverlayRecord]) -> Result<(), StoreError> {
        let write_err = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(records).map_err(|e| write_err(io::Error::other(e)))?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp_path).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        // Best-effort: the rename already happened, so the data is consistent
        // even if the directory fsync fails.
        if let Some(parent) = self.path.parent()
            && let Ok(dir) = File::open(parent)
        {
            let _ = dir.sync_all();
        }

        Ok(())
    }
}
