//! Durable record of an in-progress run.
//!
//! A checkpoint is written before each top-level set is harvested and
//! removed once the run has persisted its counts. A process that dies in
//! between restarts at the recorded set with the buckets gathered so far.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::Buckets;
use crate::error::AppError;
use crate::sync::{RunType, SyncRequest, SyncWindow};
use crate::traits::CheckpointStore;

/// Current on-disk format.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Progress of a run, as persisted between sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub run_type: RunType,
    /// Index into the top-level set list of the next set to harvest.
    pub next_set_index: usize,
    /// Set being harvested when the checkpoint was written.
    pub current_set: Option<String>,
    pub window: SyncWindow,
    /// Counts of every set before `next_set_index`.
    pub buckets: Buckets,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        run_type: RunType,
        window: SyncWindow,
        next_set_index: usize,
        current_set: Option<&str>,
        buckets: Buckets,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            run_type,
            next_set_index,
            current_set: current_set.map(str::to_string),
            window,
            buckets,
            saved_at: Utc::now(),
        }
    }

    /// Whether `request` can continue this checkpoint.
    ///
    /// The run type and window start must agree. The request may end later
    /// than the checkpoint (a run resumed after a month boundary); the run
    /// then finishes over the checkpoint's own window and the newer months
    /// are picked up by the next sync.
    pub fn matches(&self, request: &SyncRequest) -> bool {
        self.run_type == request.run_type
            && self.window.start() == request.window.start()
            && self.window.end() <= request.window.end()
    }
}

/// Checkpoint stored as a JSON file.
///
/// Writes go to a sibling temp file that is fsynced and then renamed over
/// the target, so a crash leaves either the old or the new checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::CheckpointError(format!("Failed to {} '{}': {}", action, path.display(), err))
}

fn join_error(err: tokio::task::JoinError) -> AppError {
    AppError::CheckpointError(format!("Checkpoint task failed: {}", err))
}

fn write_atomic(path: &Path, temp_path: &Path, contents: &[u8]) -> Result<(), AppError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| io_error("create directory", parent, e))?;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(temp_path)
        .map_err(|e| io_error("open", temp_path, e))?;
    file.write_all(contents)
        .map_err(|e| io_error("write", temp_path, e))?;
    file.sync_all()
        .map_err(|e| io_error("sync", temp_path, e))?;
    fs::rename(temp_path, path).map_err(|e| io_error("replace", path, e))?;

    // the rename lives in the directory entry
    #[cfg(unix)]
    fs::File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| io_error("sync directory", parent, e))?;

    Ok(())
}

fn read_checkpoint(path: &Path) -> Result<Option<Checkpoint>, AppError> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error("read", path, e)),
    };

    let checkpoint: Checkpoint = serde_json::from_slice(&contents).map_err(|e| {
        AppError::CheckpointError(format!("Corrupt checkpoint '{}': {}", path.display(), e))
    })?;

    if checkpoint.version != CHECKPOINT_VERSION {
        return Err(AppError::CheckpointError(format!(
            "Unsupported checkpoint version {} in '{}'",
            checkpoint.version,
            path.display()
        )));
    }

    Ok(Some(checkpoint))
}

fn remove_checkpoint(path: &Path) -> Result<(), AppError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error("remove", path, e)),
    }
}

// File I/O runs on the blocking pool; `sync_all` can stall for a while.
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), AppError> {
        let contents = serde_json::to_vec_pretty(checkpoint)?;
        let path = self.path.clone();
        let temp_path = self.temp_path();
        tokio::task::spawn_blocking(move || write_atomic(&path, &temp_path, &contents))
            .await
            .map_err(join_error)??;

        tracing::debug!(
            path = %self.path.display(),
            next_set_index = checkpoint.next_set_index,
            "Checkpoint saved"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<Checkpoint>, AppError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_checkpoint(&path))
            .await
            .map_err(join_error)?
    }

    async fn clear(&self) -> Result<(), AppError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || remove_checkpoint(&path))
            .await
            .map_err(join_error)?
    }
}
