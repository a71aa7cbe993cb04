//! Daily quick sync.
//!
//! One background task sleeps until the configured UTC hour, runs a quick
//! sync through the shared [`AppState`], and goes back to sleep. A tick
//! that finds a run in progress (for example a full sync started over the
//! API) is skipped rather than queued.

use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use tracing::{error, info, warn};

use pubtrend_core::{AppError, TracingReporter};

use crate::state::AppState;

/// First `hour:00` UTC strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let today = now
        .date_naive()
        .and_hms_opt(hour.min(23), 0, 0)
        .map(|t| t.and_utc());

    match today {
        Some(t) if t > now => t,
        Some(t) => t.checked_add_days(Days::new(1)).unwrap_or(t),
        None => now,
    }
}

/// Runs until the shutdown token is cancelled.
pub async fn run_daily_quick_sync(state: AppState, hour: u32) {
    info!(hour, "Scheduler started");

    loop {
        let now = Utc::now();
        let next = next_run_after(now, hour);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(next_run = %next, "Next scheduled quick sync");

        tokio::select! {
            biased;
            _ = state.shutdown_token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        info!("Running scheduled quick sync...");
        let result = state
            .harvest_service
            .quick_sync(
                &state.sync_state,
                &TracingReporter,
                state.shutdown_token.child_token(),
            )
            .await;

        match result {
            Ok(report) => info!(
                status = report.status.as_str(),
                rows = report.rows_written,
                "Scheduled quick sync finished"
            ),
            Err(AppError::SyncAlreadyRunning) => {
                warn!("A sync is already running, skipping scheduled quick sync")
            }
            Err(e) => error!(error = %e, "Scheduled quick sync failed"),
        }
    }

    info!("Scheduler stopped");
}
