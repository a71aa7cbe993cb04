//! Progress reporting for sync runs.
//!
//! The orchestrator emits [`SyncEvent`]s; frontends decide what to do with
//! them. The CLI and the server both use [`TracingReporter`], tests use
//! [`SilentReporter`] or a recording implementation.

use tracing::{info, warn};

use crate::AppError;
use crate::sync::{RunType, SyncReport, SyncWindow};

/// Events emitted during a sync run.
#[derive(Debug)]
pub enum SyncEvent<'a> {
    /// A run started.
    RunStarted {
        run_type: RunType,
        window: &'a SyncWindow,
        total_sets: usize,
    },
    /// A checkpoint was accepted; sets before `next_set_index` are skipped.
    Resumed {
        next_set_index: usize,
        total_sets: usize,
    },
    /// Harvesting of one top-level set began.
    SetStarted {
        index: usize,
        total_sets: usize,
        set: &'a str,
    },
    /// One page of a set was fetched.
    PageFetched {
        set: &'a str,
        page: usize,
        records: usize,
        has_more: bool,
    },
    /// A set was walked to the end.
    SetCompleted {
        set: &'a str,
        records: usize,
        counted: u64,
    },
    /// A set stopped early; counts gathered so far are kept.
    SetIncomplete {
        set: &'a str,
        records: usize,
        error: &'a AppError,
    },
    /// The run finished and counts were persisted.
    RunCompleted { report: &'a SyncReport },
    /// The run stopped because of cancellation.
    RunCancelled { report: &'a SyncReport },
}

/// Trait for reporting sync progress.
///
/// All methods have default no-op implementations so reporters only handle
/// what they care about.
pub trait ProgressReporter: Send + Sync {
    /// Called when a sync event occurs.
    fn report(&self, event: SyncEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Reporter that logs events with `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: SyncEvent<'_>) {
        match event {
            SyncEvent::RunStarted {
                run_type,
                window,
                total_sets,
            } => {
                info!(
                    run_type = run_type.as_str(),
                    window = %window,
                    total_sets,
                    "Sync started"
                );
            }
            SyncEvent::Resumed {
                next_set_index,
                total_sets,
            } => {
                info!(next_set_index, total_sets, "Resuming from checkpoint");
            }
            SyncEvent::SetStarted {
                index,
                total_sets,
                set,
            } => {
                info!("[{}/{}] Harvesting set {}", index + 1, total_sets, set);
            }
            SyncEvent::PageFetched {
                set,
                page,
                records,
                has_more,
            } => {
                tracing::debug!(set, page, records, has_more, "Page fetched");
            }
            SyncEvent::SetCompleted {
                set,
                records,
                counted,
            } => {
                info!(set, records, counted, "Set complete");
            }
            SyncEvent::SetIncomplete {
                set,
                records,
                error,
            } => {
                warn!(set, records, error = %error, "Set incomplete, keeping partial counts");
            }
            SyncEvent::RunCompleted { report } => {
                info!(
                    status = report.status.as_str(),
                    sets_completed = report.sets_completed,
                    sets_total = report.sets_total,
                    rows_written = report.rows_written,
                    "Sync finished"
                );
            }
            SyncEvent::RunCancelled { report } => {
                info!(
                    next_set_index = report.resume_index,
                    sets_total = report.sets_total,
                    "Sync cancelled, checkpoint kept"
                );
            }
        }
    }
}
