// ABOUTME: Configuration loading and validation for the overlaycast server.
// ABOUTME: Reads environment variables and derives the on-disk layout from the data directory.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use overlaycast_core::{SessionMode, SessionModeError};
use overlaycast_transcode::StreamConfig;
use thiserror::Error;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PORT is not a valid port number: {0}")]
    InvalidPort(String),

    #[error("OVERLAYCAST_HOST and PORT do not form a valid socket address: {0}")]
    InvalidBind(String),

    #[error("OVERLAYCAST_SESSION_MODE: {0}")]
    SessionMode(#[from] SessionModeError),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub overlay_file: PathBuf,
    pub upload_dir: PathBuf,
    pub stream_dir: PathBuf,
    pub ffmpeg_bin: String,
    pub session_mode: SessionMode,
    pub stop_previous: bool,
    pub public_base_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - PORT: listen port (default: 5000)
    /// - OVERLAYCAST_HOST: listen IP or host name, resolved once at load (default: 0.0.0.0)
    /// - OVERLAYCAST_DATA_DIR: root for overlays.json and static/ (default: .)
    /// - OVERLAYCAST_FFMPEG: transcoder binary (default: ffmpeg)
    /// - OVERLAYCAST_SESSION_MODE: single or isolated (default: single)
    /// - OVERLAYCAST_STOP_PREVIOUS: stop running jobs on each new start (default: false)
    /// - OVERLAYCAST_PUBLIC_BASE_URL: base for playback URLs (default: taken from the request)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] but reading values through `lookup`.
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port_str = get("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
        let port: u16 = port_str
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPort(port_str.clone()))?;

        let host = get("OVERLAYCAST_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let bind = resolve_bind(host.trim(), port)?;

        let data_dir = get("OVERLAYCAST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let ffmpeg_bin = get("OVERLAYCAST_FFMPEG").unwrap_or_else(|| DEFAULT_FFMPEG.to_string());

        let session_mode = match get("OVERLAYCAST_SESSION_MODE") {
            Some(mode) => mode.parse()?,
            None => SessionMode::default(),
        };

        let stop_previous = get("OVERLAYCAST_STOP_PREVIOUS")
            .map(|v| v == "true" || v == "1" || v == "yes")
            .unwrap_or(false);

        let public_base_url = get("OVERLAYCAST_PUBLIC_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string());

        let mut config = Self::with_data_dir(data_dir);
        config.bind = bind;
        config.ffmpeg_bin = ffmpeg_bin;
        config.session_mode = session_mode;
        config.stop_previous = stop_previous;
        config.public_base_url = public_base_url;
        Ok(config)
    }

    /// Defaults rooted at `data_dir`, without consulting the environment.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            data_dir: PathBuf::new(),
            overlay_file: PathBuf::new(),
            upload_dir: PathBuf::new(),
            stream_dir: PathBuf::new(),
            ffmpeg_bin: DEFAULT_FFMPEG.to_string(),
            session_mode: SessionMode::default(),
            stop_previous: false,
            public_base_url: None,
        };
        config.set_data_dir(data_dir.into());
        config
    }

    /// Point every derived path at `data_dir`.
    pub fn set_data_dir(&mut self, data_dir: PathBuf) {
        self.overlay_file = data_dir.join("overlays.json");
        self.upload_dir = data_dir.join("static").join("uploads");
        self.stream_dir = data_dir.join("static").join("stream");
        self.data_dir = data_dir;
    }

    pub fn set_port(&mut self, port: u16) {
        self.bind.set_port(port);
    }

    /// Settings handed to the stream session manager.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            stream_dir: self.stream_dir.clone(),
            ffmpeg_bin: self.ffmpeg_bin.clone(),
            mode: self.session_mode,
            stop_previous: self.stop_previous,
        }
    }
}

/// IP literals are used as-is; anything else goes through the system
/// resolver and the first address wins.
fn resolve_bind(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let invalid = || ConfigError::InvalidBind(format!("{}:{}", host, port));
    if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    (host, port)
        .to_socket_addrs()
        .map_err(|_| invalid())?
        .next()
        .ok_or_else(invalid)
}
