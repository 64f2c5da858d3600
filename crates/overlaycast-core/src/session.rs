// ABOUTME: Session modes decide where a stream session writes its HLS output.
// ABOUTME: Single mode shares one directory and URL; isolated mode keys both by session id.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

use crate::invocation::PLAYLIST_FILENAME;

/// URL path under which stream output is served.
pub const STREAM_URL_PREFIX: &str = "/static/stream";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown session mode {0:?} (expected \"single\" or \"isolated\")")]
pub struct SessionModeError(pub String);

/// How stream sessions share the output directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Every session writes to the same directory, purged on each start.
    /// The playlist is always reachable at the same URL.
    #[default]
    Single,
    /// Each session gets `<stream_dir>/<session_id>/`, so concurrent
    /// sessions never touch each other's segments.
    Isolated,
}

impl SessionMode {
    /// Directory the transcoder writes into for the given session.
    pub fn output_dir(&self, stream_dir: &Path, session_id: Ulid) -> PathBuf {
        match self {
            SessionMode::Single => stream_dir.to_path_buf(),
            SessionMode::Isolated => stream_dir.join(session_id.to_string()),
        }
    }

    /// Fully-qualified playlist URL for the session, rooted at `base_url`.
    pub fn playlist_url(&self, base_url: &str, session_id: Ulid) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            SessionMode::Single => format!("{base}{STREAM_URL_PREFIX}/{PLAYLIST_FILENAME}"),
            SessionMode::Isolated => {
                format!("{base}{STREAM_URL_PREFIX}/{session_id}/{PLAYLIST_FILENAME}")
            }
        }
    }
}

impl FromStr for SessionMode {
    type Err = SessionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(SessionMode::Single),
            "isolated" => Ok(SessionMode::Isolated),
            _ => Err(SessionModeError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_mode_shares_directory_and_url() {
        let id = Ulid::new();
        let dir = Path::new("/data/static/stream");

        assert_eq!(SessionMode::Single.output_dir(dir, id), dir);
        assert_eq!(
            SessionMode::Single.playlist_url("http://localhost:5000/", id),
            "http://localhost:5000/static/stream/stream.m3u8"
        );
    }

    #[test]
    fn isolated_mode_keys_by_session() {
        let id = Ulid::new();
        let dir = Path::new("/data/static/stream");

        assert_eq!(
            SessionMode::Isolated.output_dir(dir, id),
            dir.join(id.to_string())
        );
        assert_eq!(
            SessionMode::Isolated.playlist_url("https://tv.example", id),
            format!("https://tv.example/static/stream/{id}/stream.m3u8")
        );
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("single".parse::<SessionMode>(), Ok(SessionMode::Single));
        assert_eq!(" Isolated ".parse::<SessionMode>(), Ok(SessionMode::Isolated));
        assert!("shared".parse::<SessionMode>().is_err());
        assert_eq!(SessionMode::default(), SessionMode::Single);
    }
}
