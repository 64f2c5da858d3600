// ABOUTME: In-memory registry of launched transcoder processes keyed by session ULID.
// ABOUTME: Each child is owned by a supervisor task that reaps it on exit and kills it on request.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use overlaycast_core::SourceKind;
use serde::Serialize;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, watch};
use ulid::Ulid;

/// Finished jobs kept for status queries; older ones are evicted on insert.
pub const RETAINED_FINISHED_JOBS: usize = 32;

/// Lifecycle state of a transcode job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Exited { code: Option<i32> },
    Stopped,
    FailedToLaunch { reason: String },
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }
}

/// A stop request carries the channel the supervisor answers on.
type StopRequest = oneshot::Sender<JobStatus>;

/// A launched (or attempted) transcoder process and what it was started for.
#[derive(Debug)]
pub struct TranscodeJob {
    pub id: Ulid,
    pub source: String,
    pub kind: SourceKind,
    pub output_dir: PathBuf,
    pub playback_url: String,
    pub started_at: DateTime<Utc>,
    pid: Option<u32>,
    status: watch::Receiver<JobStatus>,
    stop_tx: Option<mpsc::Sender<StopRequest>>,
}

/// Serializable view of a job, without the process handle.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Ulid,
    pub source: String,
    pub kind: SourceKind,
    pub output_dir: PathBuf,
    pub playback_url: String,
    pub started_at: DateTime<Utc>,
    pub pid: Option<u32>,
    pub status: JobStatus,
}

impl TranscodeJob {
    /// Record a job whose process is running and hand the child to a
    /// supervisor task. Must be called inside a tokio runtime.
    pub fn running(
        id: Ulid,
        source: String,
        kind: SourceKind,
        output_dir: PathBuf,
        playback_url: String,
        child: Child,
    ) -> Self {
        let pid = child.id();
        let (status_tx, status) = watch::channel(JobStatus::Running);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        tokio::spawn(supervise(id, child, status_tx, stop_rx));
        Self {
            id,
            source,
            kind,
            output_dir,
            playback_url,
            started_at: Utc::now(),
            pid,
            status,
            stop_tx: Some(stop_tx),
        }
    }

    /// Record a job whose process never started.
    pub fn failed(
        id: Ulid,
        source: String,
        kind: SourceKind,
        output_dir: PathBuf,
        playback_url: String,
        reason: String,
    ) -> Self {
        let (_, status) = watch::channel(JobStatus::FailedToLaunch { reason });
        Self {
            id,
            source,
            kind,
            output_dir,
            playback_url,
            started_at: Utc::now(),
            pid: None,
            status,
            stop_tx: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status.borrow().is_running()
    }

    /// Ask the supervisor to kill the process and wait for its answer.
    /// Jobs that already finished keep their status.
    pub async fn stop(&self) -> JobStatus {
        let Some(stop_tx) = self.stop_tx.as_ref() else {
            return self.status();
        };
        if !self.is_running() {
            return self.status();
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        if stop_tx.send(reply_tx).await.is_err() {
            // supervisor already finished
            return self.status();
        }
        reply_rx.await.unwrap_or_else(|_| self.status())
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let status = self.status();
        JobSnapshot {
            id: self.id,
            source: self.source.clone(),
            kind: self.kind,
            output_dir: self.output_dir.clone(),
            playback_url: self.playback_url.clone(),
            started_at: self.started_at,
            pid: if status.is_running() { self.pid } else { None },
            status,
        }
    }
}

/// Own `child` until it exits or is killed, publishing every state change.
async fn supervise(
    id: Ulid,
    mut child: Child,
    status_tx: watch::Sender<JobStatus>,
    mut stop_rx: mpsc::Receiver<StopRequest>,
) {
    loop {
        tokio::select! {
            exit = child.wait() => {
                let status = match exit {
                    Ok(exit) => {
                        tracing::info!("transcode job {} exited with {}", id, exit);
                        JobStatus::Exited { code: exit.code() }
                    }
                    Err(e) => {
                        tracing::warn!("failed to wait on transcode job {}: {}", id, e);
                        JobStatus::Exited { code: None }
                    }
                };
                status_tx.send_replace(status);
                return;
            }
            Some(reply) = stop_rx.recv() => {
                let result = child.kill().await;
                let status = status_after_kill(id, result, &status_tx.borrow());
                status_tx.send_replace(status.clone());
                let _ = reply.send(status.clone());
                if !status.is_running() {
                    return;
                }
            }
        }
    }
}

/// A job only becomes `Stopped` when the kill went through.
fn status_after_kill(id: Ulid, result: io::Result<()>, current: &JobStatus) -> JobStatus {
    match result {
        Ok(()) => {
            tracing::info!("stopped transcode job {}", id);
            JobStatus::Stopped
        }
        Err(e) => {
            tracing::warn!("failed to kill transcode job {}: {}", id, e);
            current.clone()
        }
    }
}

/// Jobs ordered by id, which for ULIDs is launch order.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: BTreeMap<Ulid, TranscodeJob>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job, then evict the oldest finished jobs beyond
    /// [`RETAINED_FINISHED_JOBS`]. Running jobs are never evicted.
    pub fn insert(&mut self, job: TranscodeJob) {
        self.jobs.insert(job.id, job);

        let finished: Vec<Ulid> = self
            .jobs
            .values()
            .filter(|job| !job.is_running())
            .map(|job| job.id)
            .collect();
        let excess = finished.len().saturating_sub(RETAINED_FINISHED_JOBS);
        for id in &finished[..excess] {
            self.jobs.remove(id);
        }
        if excess > 0 {
            tracing::debug!("evicted {} finished transcode job(s)", excess);
        }
    }

    pub fn get(&self, id: &Ulid) -> Option<&TranscodeJob> {
        self.jobs.get(id)
    }

    /// Snapshots of every job in launch order.
    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        self.jobs.values().map(TranscodeJob::snapshot).collect()
    }

    /// Stop every job that is still running. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for job in self.jobs.values() {
            if job.is_running() && job.stop().await == JobStatus::Stopped {
                stopped += 1;
            }
        }
        stopped
    }
}
