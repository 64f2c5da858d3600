// ABOUTME: Foreground stream generator that feeds a rolling HLS playlist from a looping file or live feed.
// ABOUTME: Clears stale playlist and segment files, then runs ffmpeg to completion with inherited stdio.

use std::path::Path;
use std::process::ExitStatus;

use overlaycast_core::{Invocation, PLAYLIST_FILENAME, is_local_file};
use tokio::process::Command;

use crate::manager::StreamError;

/// Remove `.ts` and `.m3u8` files from `dir`, leaving anything else alone.
/// Returns how many files were removed.
pub async fn clear_hls_files(dir: &Path) -> Result<usize, StreamError> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_hls = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("ts") | Some("m3u8")
        );
        if is_hls && entry.file_type().await?.is_file() {
            tokio::fs::remove_file(&path).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Run the generator profile against `source`, writing into `output_dir`,
/// and wait for the transcoder to exit.
pub async fn run_generator(
    ffmpeg_bin: &str,
    source: &str,
    output_dir: &Path,
) -> Result<ExitStatus, StreamError> {
    if source.trim().is_empty() {
        return Err(StreamError::MissingSource);
    }

    tokio::fs::create_dir_all(output_dir).await?;
    let removed = clear_hls_files(output_dir).await?;
    tracing::debug!("removed {} stale HLS file(s) from {}", removed, output_dir.display());

    let local = is_local_file(source);
    if local {
        tracing::info!("looping local file {} endlessly", source);
    } else {
        tracing::info!("streaming live source {}", source);
    }

    let invocation = Invocation::generator(
        ffmpeg_bin,
        source,
        local,
        &output_dir.join(PLAYLIST_FILENAME),
    );
    tracing::info!("output directory: {}", output_dir.display());
    tracing::info!("transcoder command: {}", invocation.command_line());

    let status = Command::new(&invocation.program)
        .args(&invocation.args)
        .status()
        .await?;

    tracing::info!("generator exited with {}", status);
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn clear_removes_only_hls_files() {
        let dir = TempDir::new().unwrap();
        for name in ["stream.m3u8", "stream0.ts", "stream1.ts", "poster.jpg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        assert_eq!(clear_hls_files(dir.path()).await.unwrap(), 3);
        assert!(dir.path().join("poster.jpg").exists());
        assert!(!dir.path().join("stream.m3u8").exists());
    }

    #[tokio::test]
    async fn empty_source_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = run_generator("ffmpeg", "", dir.path()).await;
        assert!(matches!(result, Err(StreamError::MissingSource)));
    }

    #[tokio::test]
    async fn missing_binary_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("no-such-ffmpeg");
        let out = dir.path().join("out");

        let result = run_generator(bin.to_str().unwrap(), "sample.mp4", &out).await;

        assert!(matches!(result, Err(StreamError::Io(_))));
        assert!(out.is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn waits_for_transcoder_exit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("fake-ffmpeg");
        std::fs::write(&bin, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let status = run_generator(bin.to_str().unwrap(), "rtsp://cam/1", &dir.path().join("out"))
            .await
            .unwrap();
        assert!(status.success());
    }
}
