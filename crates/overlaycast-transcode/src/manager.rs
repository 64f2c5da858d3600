// ABOUTME: Stream session manager: prepares the HLS output directory and launches ffmpeg in the background.
// ABOUTME: Also serves playlist and segment files and exposes status/stop over the job registry.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use overlaycast_core::{
    Invocation, PLAYLIST_FILENAME, SessionMode, SourceKind, is_plain_file_name,
};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::registry::{JobRegistry, JobSnapshot, TranscodeJob};

/// Errors that can occur while starting or inspecting stream sessions.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("RTSP URL or video file path required")]
    MissingSource,

    #[error("stream asset not found: {0}")]
    AssetNotFound(String),

    #[error("transcode job not found: {0}")]
    JobNotFound(Ulid),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Settings for the session manager.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Root directory for HLS output.
    pub stream_dir: PathBuf,
    /// Transcoder executable, looked up on PATH when not absolute.
    pub ffmpeg_bin: String,
    pub mode: SessionMode,
    /// Stop every running job before launching a new one.
    pub stop_previous: bool,
}

impl StreamConfig {
    pub fn new(stream_dir: impl Into<PathBuf>) -> Self {
        Self {
            stream_dir: stream_dir.into(),
            ffmpeg_bin: "ffmpeg".to_string(),
            mode: SessionMode::default(),
            stop_previous: false,
        }
    }
}

/// Everything known about a session at the moment it was started.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub id: Ulid,
    pub source: String,
    pub kind: SourceKind,
    pub output_dir: PathBuf,
    pub playlist_path: PathBuf,
    pub playback_url: String,
    pub invocation: Invocation,
    /// Transcoder process id, if it launched.
    pub pid: Option<u32>,
}

/// An open playlist or segment file from the output directory.
#[derive(Debug)]
pub struct PlaylistAsset {
    pub file: tokio::fs::File,
    pub len: u64,
    pub content_type: &'static str,
}

/// Launches transcoder jobs and keeps track of them.
///
/// The registry lock is held for the whole of `start`, so concurrent starts
/// run one after another rather than purging each other's output mid-launch.
pub struct StreamSessionManager {
    config: StreamConfig,
    registry: Mutex<JobRegistry>,
}

impl StreamSessionManager {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            registry: Mutex::new(JobRegistry::new()),
        }
    }

    /// Start transcoding `source` into HLS and return the session, including
    /// a playback URL rooted at `base_url`.
    ///
    /// The process runs detached from the request and a supervisor task reaps
    /// it when it exits. If it cannot be spawned at all, the failure is logged
    /// and recorded on the job, and the session is still returned; callers
    /// find out by polling the playlist.
    pub async fn start(&self, source: &str, base_url: &str) -> Result<StreamSession, StreamError> {
        if source.trim().is_empty() {
            return Err(StreamError::MissingSource);
        }

        let mut registry = self.registry.lock().await;

        if self.config.stop_previous {
            let stopped = registry.stop_all().await;
            if stopped > 0 {
                tracing::info!("stopped {} previous transcode job(s)", stopped);
            }
        }

        let id = Ulid::new();
        let output_dir = self.config.mode.output_dir(&self.config.stream_dir, id);
        prepare_output_dir(&output_dir, self.config.mode).await?;

        let kind = SourceKind::classify(source);
        let playlist_path = output_dir.join(PLAYLIST_FILENAME);
        let playback_url = self.config.mode.playlist_url(base_url, id);
        let invocation = Invocation::session(&self.config.ffmpeg_bin, source, kind, &playlist_path);

        match kind {
            SourceKind::Live => tracing::info!("starting live stream {} from {}", id, source),
            SourceKind::File => tracing::info!("starting file stream {} from {}", id, source),
        }
        tracing::debug!("transcoder command: {}", invocation.command_line());

        let (job, pid) = match spawn_detached(&invocation) {
            Ok(child) => {
                let pid = child.id();
                let job = TranscodeJob::running(
                    id,
                    source.to_string(),
                    kind,
                    output_dir.clone(),
                    playback_url.clone(),
                    child,
                );
                (job, pid)
            }
            Err(e) => {
                tracing::error!("failed to launch {}: {}", invocation.program, e);
                let job = TranscodeJob::failed(
                    id,
                    source.to_string(),
                    kind,
                    output_dir.clone(),
                    playback_url.clone(),
                    e.to_string(),
                );
                (job, None)
            }
        };
        registry.insert(job);

        Ok(StreamSession {
            id,
            source: source.to_string(),
            kind,
            output_dir,
            playlist_path,
            playback_url,
            invocation,
            pid,
        })
    }

    /// Open a playlist or segment file. `session` selects a per-session
    /// subdirectory; `None` reads from the shared stream directory.
    pub async fn serve_asset(
        &self,
        session: Option<&str>,
        filename: &str,
    ) -> Result<PlaylistAsset, StreamError> {
        let mut path = self.config.stream_dir.clone();
        let mut display = String::new();
        if let Some(session) = session {
            if !is_plain_file_name(session) {
                return Err(StreamError::AssetNotFound(format!("{session}/{filename}")));
            }
            path.push(session);
            display.push_str(session);
            display.push('/');
        }
        display.push_str(filename);

        if !is_plain_file_name(filename) {
            return Err(StreamError::AssetNotFound(display));
        }
        path.push(filename);

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            // ffmpeg rotates segments away, so a listed one can vanish
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StreamError::AssetNotFound(display));
            }
            Err(e) => return Err(StreamError::Io(e)),
        };
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(StreamError::AssetNotFound(display));
        }

        Ok(PlaylistAsset {
            file,
            len: meta.len(),
            content_type: content_type_for(filename),
        })
    }

    /// All retained jobs, in launch order.
    pub async fn jobs(&self) -> Vec<JobSnapshot> {
        self.registry.lock().await.snapshots()
    }

    pub async fn status(&self, id: Ulid) -> Result<JobSnapshot, StreamError> {
        let registry = self.registry.lock().await;
        let job = registry.get(&id).ok_or(StreamError::JobNotFound(id))?;
        Ok(job.snapshot())
    }

    /// Kill the job's process if it is still running.
    pub async fn stop(&self, id: Ulid) -> Result<JobSnapshot, StreamError> {
        let registry = self.registry.lock().await;
        let job = registry.get(&id).ok_or(StreamError::JobNotFound(id))?;
        job.stop().await;
        Ok(job.snapshot())
    }
}

/// Make `dir` ready for a new session. In single mode every regular file in
/// the shared directory is removed; in isolated mode the fresh session
/// directory is simply created.
async fn prepare_output_dir(dir: &Path, mode: SessionMode) -> Result<(), StreamError> {
    tokio::fs::create_dir_all(dir).await?;
    if mode == SessionMode::Isolated {
        return Ok(());
    }

    let mut removed = 0usize;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    tracing::debug!("purged {} file(s) from {}", removed, dir.display());
    Ok(())
}

fn spawn_detached(invocation: &Invocation) -> io::Result<tokio::process::Child> {
    Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(false)
        .spawn()
}

/// MIME type for files the transcoder writes.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("m4s") => "video/iso.segment",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::JobStatus;
    use tempfile::TempDir;

    const BASE: &str = "http://localhost:5000";

    fn manager(dir: &TempDir, mode: SessionMode) -> StreamSessionManager {
        let mut config = StreamConfig::new(dir.path().join("stream"));
        // Guaranteed spawn failure so tests never depend on ffmpeg being installed.
        config.ffmpeg_bin = dir
            .path()
            .join("no-such-ffmpeg")
            .to_string_lossy()
            .into_owned();
        config.mode = mode;
        StreamSessionManager::new(config)
    }

    #[tokio::test]
    async fn empty_source_is_rejected_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, SessionMode::Single);
        let stream_dir = dir.path().join("stream");
        std::fs::create_dir_all(&stream_dir).unwrap();
        std::fs::write(stream_dir.join("stream.m3u8"), "#EXTM3U").unwrap();

        for source in ["", "   "] {
            assert!(matches!(
                mgr.start(source, BASE).await,
                Err(StreamError::MissingSource)
            ));
        }

        assert!(mgr.jobs().await.is_empty());
        assert!(stream_dir.join("stream.m3u8").exists());
    }

    #[tokio::test]
    async fn https_source_starts_live_session() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, SessionMode::Single);

        let session = mgr.start("https://cdn.example/feed", BASE).await.unwrap();

        assert_eq!(session.kind, SourceKind::Live);
        assert_eq!(session.invocation.arg_value("-hls_list_size"), Some("3"));
        assert_eq!(
            session.playback_url,
            "http://localhost:5000/static/stream/stream.m3u8"
        );
        assert_eq!(session.playlist_path, dir.path().join("stream").join("stream.m3u8"));
    }

    #[tokio::test]
    async fn bare_filename_starts_file_session() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, SessionMode::Single);

        let session = mgr.start("sample.mp4", BASE).await.unwrap();

        assert_eq!(session.kind, SourceKind::File);
        assert_eq!(session.invocation.arg_value("-hls_list_size"), Some("0"));
        assert!(session.invocation.has_flag("-re"));
    }

    #[tokio::test]
    async fn launch_failure_is_recorded_not_returned() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, SessionMode::Single);

        let session = mgr.start("rtsp://cam/1", BASE).await.unwrap();
        let job = mgr.status(session.id).await.unwrap();

        assert!(matches!(job.status, JobStatus::FailedToLaunch { .. }));
        assert_eq!(job.source, "rtsp://cam/1");
        assert_eq!(mgr.jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn single_mode_purges_files_but_keeps_directories() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, SessionMode::Single);
        let stream_dir = dir.path().join("stream");
        std::fs::create_dir_all(stream_dir.join("keep")).unwrap();
        std::fs::write(stream_dir.join("stream.m3u8"), "#EXTM3U").unwrap();
        std::fs::write(stream_dir.join("stream0.ts"), b"ts").unwrap();
        std::fs::write(stream_dir.join("notes.txt"), b"anything").unwrap();

        mgr.start("sample.mp4", BASE).await.unwrap();

        let remaining: Vec<_> = std::fs::read_dir(&stream_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(remaining, vec![std::ffi::OsString::from("keep")]);
    }

    #[tokio::test]
    async fn isolated_mode_gives_each_session_its_own_directory() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, SessionMode::Isolated);
        let stream_dir = dir.path().join("stream");

        let first = mgr.start("a.mp4", BASE).await.unwrap();
        std::fs::write(first.output_dir.join("stream.m3u8"), "#EXTM3U").unwrap();
        let second = mgr.start("b.mp4", BASE).await.unwrap();

        assert_ne!(first.output_dir, second.output_dir);
        assert_eq!(first.output_dir, stream_dir.join(first.id.to_string()));
        assert!(second.output_dir.is_dir());
        // Starting the second session leaves the first one's output alone
        assert!(first.output_dir.join("stream.m3u8").exists());
        assert_eq!(
            second.playback_url,
            format!("{BASE}/static/stream/{}/stream.m3u8", second.id)
        );
    }

    async fn read_all(mut file: tokio::fs::File) -> Vec<u8> {
        use tokio::io::AsyncReadExt;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn serve_asset_reads_playlist_and_segments() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, SessionMode::Single);
        let stream_dir = dir.path().join("stream");
        std::fs::create_dir_all(stream_dir.join("01SESSION")).unwrap();
        std::fs::write(stream_dir.join("stream.m3u8"), "#EXTM3U\n").unwrap();
        std::fs::write(stream_dir.join("01SESSION").join("stream3.ts"), b"seg").unwrap();

        let playlist = mgr.serve_asset(None, "stream.m3u8").await.unwrap();
        assert_eq!(playlist.len, 8);
        assert_eq!(read_all(playlist.file).await, b"#EXTM3U\n");
        assert_eq!(playlist.content_type, "application/vnd.apple.mpegurl");

        let segment = mgr.serve_asset(Some("01SESSION"), "stream3.ts").await.unwrap();
        assert_eq!(read_all(segment.file).await, b"seg");
        assert_eq!(segment.content_type, "video/mp2t");
    }

    #[tokio::test]
    async fn serve_asset_missing_or_unsafe_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, SessionMode::Single);
        std::fs::create_dir_all(dir.path().join("stream").join("sub")).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"x").unwrap();

        for (session, file) in [
            (None, "stream.m3u8"),
            (None, "sub"),
            (None, ".."),
            (Some(".."), "secret.txt"),
            (Some("sub"), "missing.ts"),
        ] {
            assert!(
                matches!(
                    mgr.serve_asset(session, file).await,
                    Err(StreamError::AssetNotFound(_))
                ),
                "{session:?} {file}"
            );
        }
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, SessionMode::Single);
        let id = Ulid::new();

        assert!(matches!(mgr.status(id).await, Err(StreamError::JobNotFound(_))));
        assert!(matches!(mgr.stop(id).await, Err(StreamError::JobNotFound(_))));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("stream.M3U8"), "application/vnd.apple.mpegurl");
        assert_eq!(content_type_for("stream12.ts"), "video/mp2t");
        assert_eq!(content_type_for("README"), "application/octet-stream");
    }

    /// Write an executable stand-in for ffmpeg that ignores its arguments.
    #[cfg(unix)]
    fn fake_transcoder(dir: &TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    async fn wait_for_status(mgr: &StreamSessionManager, id: Ulid, want: &JobStatus) -> JobStatus {
        for _ in 0..100 {
            let status = mgr.status(id).await.unwrap().status;
            if &status == want {
                return status;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        mgr.status(id).await.unwrap().status
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exited_process_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut config = StreamConfig::new(dir.path().join("stream"));
        config.ffmpeg_bin = fake_transcoder(&dir, "exit 3");
        let mgr = StreamSessionManager::new(config);

        let session = mgr.start("sample.mp4", BASE).await.unwrap();
        let want = JobStatus::Exited { code: Some(3) };

        assert_eq!(wait_for_status(&mgr, session.id, &want).await, want);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn running_process_can_be_stopped() {
        let dir = TempDir::new().unwrap();
        let mut config = StreamConfig::new(dir.path().join("stream"));
        config.ffmpeg_bin = fake_transcoder(&dir, "exec sleep 30");
        let mgr = StreamSessionManager::new(config);

        let session = mgr.start("rtsp://cam/1", BASE).await.unwrap();
        let running = mgr.status(session.id).await.unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert!(running.pid.is_some());

        let stopped = mgr.stop(session.id).await.unwrap();
        assert_eq!(stopped.status, JobStatus::Stopped);
        assert_eq!(stopped.pid, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_previous_stops_running_jobs_on_start() {
        let dir = TempDir::new().unwrap();
        let mut config = StreamConfig::new(dir.path().join("stream"));
        config.ffmpeg_bin = fake_transcoder(&dir, "exec sleep 30");
        config.stop_previous = true;
        let mgr = StreamSessionManager::new(config);

        let first = mgr.start("rtsp://cam/1", BASE).await.unwrap();
        let second = mgr.start("rtsp://cam/2", BASE).await.unwrap();

        assert_eq!(mgr.status(first.id).await.unwrap().status, JobStatus::Stopped);
        assert_eq!(mgr.status(second.id).await.unwrap().status, JobStatus::Running);
        mgr.stop(second.id).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn previous_jobs_keep_running_by_default() {
        let dir = TempDir::new().unwrap();
        let mut config = StreamConfig::new(dir.path().join("stream"));
        config.ffmpeg_bin = fake_transcoder(&dir, "exec sleep 30");
        let mgr = StreamSessionManager::new(config);

        let first = mgr.start("rtsp://cam/1", BASE).await.unwrap();
        let second = mgr.start("rtsp://cam/2", BASE).await.unwrap();

        assert_eq!(mgr.status(first.id).await.unwrap().status, JobStatus::Running);
        mgr.stop(first.id).await.unwrap();
        mgr.stop(second.id).await.unwrap();
    }

    #[cfg(target_os = "linux")]
    fn is_zombie(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/status")) {
            Ok(status) => status
                .lines()
                .any(|line| line.starts_with("State:") && line.contains('Z')),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn exited_processes_are_reaped_without_polling() {
        let dir = TempDir::new().unwrap();
        let mut config = StreamConfig::new(dir.path().join("stream"));
        config.ffmpeg_bin = fake_transcoder(&dir, "exit 0");
        let mgr = StreamSessionManager::new(config);

        let first = mgr.start("rtsp://cam/1", BASE).await.unwrap();
        let first_pid = first.pid.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        let second = mgr.start("rtsp://cam/2", BASE).await.unwrap();
        let second_pid = second.pid.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;

        // Neither child was polled through the manager, yet both are gone.
        assert!(!is_zombie(first_pid), "pid {first_pid} left as zombie");
        assert!(!is_zombie(second_pid), "pid {second_pid} left as zombie");

        let want = JobStatus::Exited { code: Some(0) };
        assert_eq!(mgr.status(first.id).await.unwrap().status, want);
        assert_eq!(wait_for_status(&mgr, second.id, &want).await, want);
        assert_eq!(mgr.status(first.id).await.unwrap().pid, None);
    }
}
