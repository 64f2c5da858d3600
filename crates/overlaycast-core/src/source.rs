// ABOUTME: Classifies a stream source descriptor as a live network feed or a local file.
// ABOUTME: Classification drives which transcoder profile is used for the session.

use serde::{Deserialize, Serialize};

/// Schemes that mark a source as a live network feed. Matched case-insensitively.
pub const NETWORK_SCHEMES: [&str; 4] = ["rtsp://", "rtmp://", "http://", "https://"];

/// What kind of input a stream session reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Live,
    File,
}

impl SourceKind {
    /// Classify a source descriptor by its scheme prefix.
    pub fn classify(source: &str) -> Self {
        let lowered = source.to_ascii_lowercase();
        if NETWORK_SCHEMES
            .iter()
            .any(|scheme| lowered.starts_with(scheme))
        {
            SourceKind::Live
        } else {
            SourceKind::File
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Live => "live",
            SourceKind::File => "file",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
