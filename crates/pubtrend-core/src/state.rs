//! Live progress of the current sync run.
//!
//! One [`SyncStateHandle`] is shared by everything in a process that needs to
//! start runs or show progress. Starting a run means acquiring a
//! [`SyncGuard`]; only one guard can exist at a time, and dropping it resets
//! the state whatever way the run ended.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::sync::RunType;

/// Point-in-time view of the sync progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub running: bool,
    pub run_type: Option<RunType>,
    /// Last human-readable status line. Survives the end of a run.
    pub message: String,
    /// Units of work done (top-level sets).
    pub current: usize,
    pub total: usize,
    pub error_count: usize,
    pub success_count: usize,
    pub started_at: Option<DateTime<Utc>>,
}

/// Shared handle to the process-wide sync state.
#[derive(Debug, Clone, Default)]
pub struct SyncStateHandle {
    inner: Arc<Mutex<SyncState>>,
}

impl SyncStateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    // plain counters: a poisoned lock still holds usable data
    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SyncState {
        self.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Claims the sync slot.
    ///
    /// Resets every counter, marks the state running and returns the guard
    /// that owns the run.
    ///
    /// # Errors
    ///
    /// [`AppError::SyncAlreadyRunning`] if another guard is alive.
    pub fn try_begin(&self, run_type: RunType, message: &str) -> Result<SyncGuard, AppError> {
        let mut state = self.lock();
        if state.running {
            return Err(AppError::SyncAlreadyRunning);
        }
        *state = SyncState {
            running: true,
            run_type: Some(run_type),
            message: message.to_string(),
            started_at: Some(Utc::now()),
            ..SyncState::default()
        };
        drop(state);

        Ok(SyncGuard {
            handle: self.clone(),
        })
    }
}

/// Exclusive right to run a sync. Resets the shared state when dropped.
#[derive(Debug)]
pub struct SyncGuard {
    handle: SyncStateHandle,
}

impl SyncGuard {
    pub fn run_type(&self) -> Option<RunType> {
        self.handle.lock().run_type
    }

    pub fn set_total(&self, total: usize) {
        self.handle.lock().total = total;
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.handle.lock().message = message.into();
    }

    /// Records the set about to be processed.
    pub fn start_unit(&self, current: usize, message: impl Into<String>) {
        let mut state = self.handle.lock();
        state.current = current;
        state.message = message.into();
    }

    pub fn record_success(&self) {
        self.handle.lock().success_count += 1;
    }

    pub fn record_error(&self) {
        self.handle.lock().error_count += 1;
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        let mut state = self.handle.lock();
        let message = std::mem::take(&mut state.message);
        *state = SyncState {
            message,
            ..SyncState::default()
        };
    }
}
