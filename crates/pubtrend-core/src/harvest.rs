//! Harvest service: full and quick sync runs.
//!
//! # Architecture
//!
//! The [`HarvestService`] is generic over three traits:
//! - [`OaiTransport`] - one HTTP round trip per page
//! - [`CountsStore`] - where finished counts go
//! - [`CheckpointStore`] - durable progress between sets
//!
//! # Run shape
//!
//! A run walks every top-level set of the [`SetMapping`] in order, one at a
//! time. Before each set a checkpoint is written; after each set its counts
//! are merged into the run's buckets. Nothing reaches the counts store until
//! every set has been visited, and then everything goes in one batch.
//!
//! A set that fails part way (retries exhausted, repository error) keeps the
//! counts it gathered and the run moves on; the report lists it as
//! incomplete.
//!
//! # Cancellation Support
//!
//! Runs take a `CancellationToken`. Network calls and every sleep race
//! against it. On cancellation the run:
//! - Stops before the next request
//! - Leaves the checkpoint in place so `--resume` can pick up
//! - Writes nothing to the counts store
//! - Returns a [`SyncReport`] with status `cancelled`

use chrono::{NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregate::{Buckets, aggregate_records};
use crate::categories::SetMapping;
use crate::checkpoint::Checkpoint;
use crate::config::{HarvestConfig, RetryPolicy};
use crate::error::AppError;
use crate::models::ListRequest;
use crate::page::{PageFetcher, sleep_or_cancel};
use crate::progress::{ProgressReporter, SyncEvent};
use crate::state::{SyncGuard, SyncStateHandle};
use crate::sync::{RunType, SyncMetadataKey, SyncReport, SyncRequest, SyncStatus, SyncWindow};
use crate::traits::{CheckpointStore, CountsStore, OaiTransport};
use crate::walker::walk_listing;

/// Service for harvesting monthly publication counts.
///
/// # Type Parameters
///
/// * `T` - OAI-PMH transport (e.g., `OaiPmhClient`)
/// * `S` - Counts store (e.g., `CountsRepository`)
/// * `C` - Checkpoint store (e.g., `FileCheckpointStore`)
///
/// # Example
///
/// ```ignore
/// use pubtrend_core::{HarvestService, SyncStateHandle, TracingReporter};
///
/// let service = HarvestService::new(client, repo, checkpoints);
/// let state = SyncStateHandle::new();
/// let report = service
///     .quick_sync(&state, &TracingReporter, CancellationToken::new())
///     .await?;
/// println!("{} rows written", report.rows_written);
/// ```
pub struct HarvestService<T, S, C>
where
    T: OaiTransport,
    S: CountsStore,
    C: CheckpointStore,
{
    fetcher: PageFetcher<T>,
    store: S,
    checkpoints: C,
    mapping: SetMapping,
    config: HarvestConfig,
}

impl<T, S, C> Clone for HarvestService<T, S, C>
where
    T: OaiTransport,
    S: CountsStore,
    C: CheckpointStore + Clone,
{
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            checkpoints: self.checkpoints.clone(),
            mapping: self.mapping.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T, S, C> HarvestService<T, S, C>
where
    T: OaiTransport,
    S: CountsStore,
    C: CheckpointStore,
{
    /// Creates a service with default configuration and the arXiv mapping.
    pub fn new(transport: T, store: S, checkpoints: C) -> Self {
        Self::with_config(transport, store, checkpoints, HarvestConfig::default())
    }

    /// Creates a service with custom harvest configuration.
    pub fn with_config(transport: T, store: S, checkpoints: C, config: HarvestConfig) -> Self {
        Self {
            fetcher: PageFetcher::new(transport, RetryPolicy::default()),
            store,
            checkpoints,
            mapping: SetMapping::arxiv(),
            config,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.fetcher = PageFetcher::new(self.fetcher.transport().clone(), policy);
        self
    }

    pub fn with_mapping(mut self, mapping: SetMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn checkpoints(&self) -> &C {
        &self.checkpoints
    }

    pub fn mapping(&self) -> &SetMapping {
        &self.mapping
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Writes the mapping's groups and categories to the counts store.
    pub async fn seed_categories(&self) -> Result<(), AppError> {
        self.store
            .seed_categories(&self.mapping.category_infos())
            .await
    }

    /// Builds a run request for `today`.
    ///
    /// `start_year` overrides the configured one for full runs and is
    /// ignored for quick runs.
    pub fn build_request(
        &self,
        run_type: RunType,
        start_year: Option<i32>,
        resume: bool,
        today: NaiveDate,
    ) -> Result<SyncRequest, AppError> {
        match run_type {
            RunType::Full => SyncRequest::full(
                start_year.unwrap_or(self.config.start_year),
                today,
                resume,
            ),
            RunType::Quick => Ok(SyncRequest::quick(self.config.quick_months, today)),
        }
    }

    /// Full sync from `start_year` (or the configured year) to now.
    ///
    /// # Errors
    ///
    /// [`AppError::SyncAlreadyRunning`] if `state` already has a run, plus
    /// anything [`HarvestService::run`] can return.
    pub async fn full_sync<R: ProgressReporter>(
        &self,
        state: &SyncStateHandle,
        start_year: Option<i32>,
        resume: bool,
        reporter: &R,
        cancel: CancellationToken,
    ) -> Result<SyncReport, AppError> {
        let request = self.build_request(
            RunType::Full,
            start_year,
            resume,
            Utc::now().date_naive(),
        )?;
        let guard = state.try_begin(RunType::Full, "Starting full sync")?;
        self.run(guard, request, reporter, cancel).await
    }

    /// Quick sync over the trailing `quick_months` months.
    pub async fn quick_sync<R: ProgressReporter>(
        &self,
        state: &SyncStateHandle,
        reporter: &R,
        cancel: CancellationToken,
    ) -> Result<SyncReport, AppError> {
        let request = self.build_request(RunType::Quick, None, false, Utc::now().date_naive())?;
        let guard = state.try_begin(RunType::Quick, "Starting quick sync")?;
        self.run(guard, request, reporter, cancel).await
    }

    /// Executes a run while holding `guard`.
    ///
    /// The guard is dropped when this returns, which resets the shared
    /// state whether the run completed, was cancelled or failed.
    ///
    /// # Errors
    ///
    /// Counts store failures during the final write. Page failures do not
    /// surface here; they mark the set incomplete.
    pub async fn run<R: ProgressReporter>(
        &self,
        guard: SyncGuard,
        request: SyncRequest,
        reporter: &R,
        cancel: CancellationToken,
    ) -> Result<SyncReport, AppError> {
        let result = self.run_inner(&guard, &request, reporter, &cancel).await;
        if let Err(e) = &result {
            warn!(error = %e, run_type = request.run_type.as_str(), "Sync failed");
            guard.set_message(format!("Sync failed: {}", e));
        }
        result
    }

    async fn run_inner<R: ProgressReporter>(
        &self,
        guard: &SyncGuard,
        request: &SyncRequest,
        reporter: &R,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, AppError> {
        let sets = self.mapping.top_level_sets();
        let total = sets.len();
        // quick runs leave a pending full-run checkpoint alone
        let checkpointed = request.run_type == RunType::Full;

        guard.set_total(total);
        let (mut buckets, start_index, window) = if checkpointed {
            self.resume_point(request, total).await
        } else {
            (Buckets::new(), 0, request.window)
        };

        let mut report = SyncReport::new(request.run_type, window, total);
        reporter.report(SyncEvent::RunStarted {
            run_type: request.run_type,
            window: &window,
            total_sets: total,
        });
        if start_index > 0 {
            report.resumed_from = Some(start_index);
            reporter.report(SyncEvent::Resumed {
                next_set_index: start_index,
                total_sets: total,
            });
        }
        report.resume_index = start_index;

        let rate_limit = self.config.rate_limit;
        let mut requested = false;

        for (index, set) in sets.iter().enumerate().skip(start_index) {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(guard, report, reporter));
            }

            if checkpointed {
                let checkpoint = Checkpoint::new(
                    request.run_type,
                    window,
                    index,
                    Some(set.as_str()),
                    buckets.clone(),
                );
                if let Err(e) = self.checkpoints.save(&checkpoint).await {
                    warn!(error = %e, set = %set, "Failed to save checkpoint, continuing");
                }
            }

            guard.start_unit(
                index,
                format!("Harvesting {} ({}/{})", set, index + 1, total),
            );
            reporter.report(SyncEvent::SetStarted {
                index,
                total_sets: total,
                set,
            });

            if requested && sleep_or_cancel(rate_limit, cancel).await.is_err() {
                return Ok(self.cancelled(guard, report, reporter));
            }
            requested = true;

            let first = ListRequest::list_identifiers(&self.config.metadata_prefix, Some(set.as_str()))
                .with_from(window.from_date());
            let outcome = match walk_listing(&self.fetcher, first, rate_limit, reporter, cancel)
                .await
            {
                Ok(outcome) => outcome,
                Err(AppError::Cancelled) => return Ok(self.cancelled(guard, report, reporter)),
                Err(e) => return Err(e),
            };

            let (set_buckets, stats) =
                aggregate_records(&outcome.records, set, &self.mapping, &window);
            report.records_seen += outcome.records.len();
            report.records_counted += stats.counted;
            report.records_skipped += stats.skipped();
            report.records_deleted += outcome.deleted;
            buckets.merge_overwrite(set_buckets);

            match &outcome.failure {
                None => {
                    guard.record_success();
                    report.sets_completed += 1;
                    reporter.report(SyncEvent::SetCompleted {
                        set,
                        records: outcome.records.len(),
                        counted: stats.counted,
                    });
                }
                Some(err) => {
                    guard.record_error();
                    report.incomplete_sets.push(set.clone());
                    reporter.report(SyncEvent::SetIncomplete {
                        set,
                        records: outcome.records.len(),
                        error: err,
                    });
                }
            }
            report.resume_index = index + 1;
        }

        guard.start_unit(total, "Saving counts");
        let rows = buckets.to_rows();
        report.rows_written = self.store.upsert_counts(&rows).await?;

        let now = Utc::now();
        self.store
            .record_sync_time(SyncMetadataKey::LastSync, now)
            .await?;
        self.store
            .record_sync_time(SyncMetadataKey::for_run(request.run_type), now)
            .await?;

        if checkpointed {
            if let Err(e) = self.checkpoints.clear().await {
                warn!(error = %e, "Failed to clear checkpoint");
            }
        }

        report.status = if report.incomplete_sets.is_empty() {
            SyncStatus::Completed
        } else {
            SyncStatus::CompletedWithErrors
        };

        guard.set_message(format!(
            "Sync complete: {} rows written, {}/{} sets complete",
            report.rows_written,
            total - report.incomplete_sets.len(),
            total
        ));
        info!(
            run_type = request.run_type.as_str(),
            rows = report.rows_written,
            incomplete = report.incomplete_sets.len(),
            "Counts persisted"
        );
        reporter.report(SyncEvent::RunCompleted { report: &report });

        Ok(report)
    }

    /// Loads the checkpoint for `request`, falling back to a fresh start on
    /// any mismatch or read error.
    ///
    /// Returns the buckets, the first set index and the window to run over.
    /// A resumed run keeps the checkpoint's window so that buckets from
    /// finished sets and the remaining sets cover the same months.
    async fn resume_point(
        &self,
        request: &SyncRequest,
        total: usize,
    ) -> (Buckets, usize, SyncWindow) {
        let fresh = (Buckets::new(), 0, request.window);
        if !request.resume {
            return fresh;
        }

        match self.checkpoints.load().await {
            Ok(Some(checkpoint))
                if checkpoint.matches(request) && checkpoint.next_set_index <= total =>
            {
                info!(
                    next_set_index = checkpoint.next_set_index,
                    checkpoint_window = %checkpoint.window,
                    saved_at = %checkpoint.saved_at,
                    "Found matching checkpoint"
                );
                (
                    checkpoint.buckets,
                    checkpoint.next_set_index,
                    checkpoint.window,
                )
            }
            Ok(Some(checkpoint)) => {
                info!(
                    checkpoint_run = checkpoint.run_type.as_str(),
                    checkpoint_window = %checkpoint.window,
                    window = %request.window,
                    "Ignoring checkpoint from a different run"
                );
                fresh
            }
            Ok(None) => fresh,
            Err(e) => {
                warn!(error = %e, "Could not read checkpoint, starting fresh");
                fresh
            }
        }
    }

    fn cancelled<R: ProgressReporter>(
        &self,
        guard: &SyncGuard,
        mut report: SyncReport,
        reporter: &R,
    ) -> SyncReport {
        report.status = SyncStatus::Cancelled;
        guard.set_message(format!(
            "Sync cancelled at set {}/{}",
            report.resume_index + 1,
            report.sets_total
        ));
        reporter.report(SyncEvent::RunCancelled { report: &report });
        report
    }
}
