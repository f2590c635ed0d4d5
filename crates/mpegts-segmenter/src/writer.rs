use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::CaptureError;
use crate::segment::CompletedSegment;

struct WriteJob {
    bytes: Bytes,
    timestamp: u64,
}

/// Accepts completed segments and writes, rewraps, and chowns them off the
/// calling task, one detached worker per segment bounded by a fixed-size
/// queue.
///
/// Mirrors the bounded hand-off queue from the concurrency model: the
/// segmenter never blocks on disk or process I/O, and a slow or stuck write
/// applies backpressure to the channel rather than the UDP receive loop.
pub struct Writer {
    sender: mpsc::Sender<WriteJob>,
}

impl Writer {
    pub fn spawn(config: Config) -> Self {
        let (sender, receiver) = mpsc::channel(config.writer_queue_capacity);
        tokio::spawn(run(receiver, config));
        Writer { sender }
    }

    /// Hand off a completed segment for writing. Blocks if the writer queue
    /// is full, which is the intended backpressure mechanism; callers that
    /// must never block should check [`Writer::try_submit`] instead.
    pub async fn submit(&self, segment: CompletedSegment) -> Result<(), CaptureError> {
        let job = WriteJob { bytes: segment.bytes, timestamp: segment.timestamp };
        self.sender.send(job).await.map_err(|_| CaptureError::SegmentWrite {
            path: format!("{}.raw", segment.timestamp),
            source: std::io::Error::other("writer task has shut down"),
        })
    }
}

async fn run(mut receiver: mpsc::Receiver<WriteJob>, config: Config) {
    while let Some(job) = receiver.recv().await {
        let timestamp = job.timestamp;
        tokio::spawn(process_job(job, config.clone()));
        tracing::debug!(timestamp, "dispatched segment to writer task");
    }
}

async fn process_job(job: WriteJob, config: Config) {
    if let Err(err) = write_segment(&job, &config).await {
        tracing::error!(timestamp = job.timestamp, error = %err, "failed to finalize segment");
    }
}

async fn write_segment(job: &WriteJob, config: &Config) -> Result<(), CaptureError> {
    let raw_path = config.output_folder.join(format!("{}.raw", job.timestamp));
    tokio::fs::write(&raw_path, &job.bytes)
        .await
        .map_err(|source| CaptureError::SegmentWrite { path: raw_path.display().to_string(), source })?;

    let final_path = if let Some(convert_raw_ts) = &config.convert_raw_ts {
        rewrap(&raw_path, convert_raw_ts, config).await?
    } else {
        raw_path
    };

    if let Some(owner) = &config.owner_user {
        chown(&final_path, owner, config.owner_group.as_deref()).await?;
    }

    Ok(())
}

/// Invoke the external rewrap executable as
/// `<exec_dir>/<convert_raw_ts> <output_folder>/<timestamp> <output_folder>`,
/// which is expected to consume `<timestamp>.raw` and produce `<timestamp>.ts`
/// in the same folder (see the Writer's external-interface contract).
async fn rewrap(raw_path: &Path, convert_raw_ts: &str, config: &Config) -> Result<PathBuf, CaptureError> {
    let ts_path = raw_path.with_extension("ts");
    let stem_path = raw_path.with_extension("");

    let command_path = match &config.exec_dir {
        Some(dir) => dir.join(convert_raw_ts),
        None => PathBuf::from(convert_raw_ts),
    };

    let mut cmd = process_utils::tokio_command(&command_path);
    cmd.arg(&stem_path).arg(&config.output_folder);

    let output = cmd.output().await.map_err(|source| CaptureError::RewrapFailed {
        command: command_path.display().to_string(),
        path: raw_path.display().to_string(),
        reason: source.to_string(),
    })?;

    if !output.status.success() {
        return Err(CaptureError::RewrapFailed {
            command: command_path.display().to_string(),
            path: raw_path.display().to_string(),
            reason: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(ts_path)
}

async fn chown(path: &Path, user: &str, group: Option<&str>) -> Result<(), CaptureError> {
    let owner = match group {
        Some(group) => format!("{user}:{group}"),
        None => user.to_string(),
    };

    let mut cmd = process_utils::tokio_command("chown");
    cmd.arg(&owner).arg(path);

    let output = cmd.output().await.map_err(|source| CaptureError::ChownFailed {
        path: path.display().to_string(),
        owner: owner.clone(),
        source,
    })?;

    if !output.status.success() {
        return Err(CaptureError::ChownFailed {
            path: path.display().to_string(),
            owner,
            source: std::io::Error::other(String::from_utf8_lossy(&output.stderr).into_owned()),
        });
    }

    Ok(())
}
