//! Sync management endpoints.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use tracing::{error, info};

use pubtrend_core::{AppError, SyncMetadataKey, TracingReporter};

use crate::dto::{SyncStartedResponse, SyncStatusResponse, TriggerSyncRequest};
use crate::error::ApiError;
use crate::state::AppState;

/// Start a full or quick sync in the background.
///
/// Returns 202 as soon as the run holds the sync slot, 409 if another run
/// does. Progress is visible at GET /api/v1/sync/status.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Json(request): Json<TriggerSyncRequest>,
) -> Result<(StatusCode, Json<SyncStartedResponse>), ApiError> {
    let run_type = request.mode;

    let sync_request = state
        .harvest_service
        .build_request(
            run_type,
            request.start_year,
            request.resume,
            Utc::now().date_naive(),
        )
        .map_err(|e| match e {
            AppError::ConfigError(msg) => ApiError::BadRequest(msg),
            other => ApiError::from(other),
        })?;

    let guard = state
        .sync_state
        .try_begin(run_type, &format!("Starting {} sync", run_type))?;

    let response =
        SyncStartedResponse::new(run_type, &sync_request.window, sync_request.resume);

    let service = state.harvest_service.clone();
    let cancel = state.shutdown_token.child_token();
    state.sync_tasks.spawn(async move {
        match service
            .run(guard, sync_request, &TracingReporter, cancel)
            .await
        {
            Ok(report) => info!(
                run_type = %report.run_type,
                status = report.status.as_str(),
                rows = report.rows_written,
                "Background sync finished"
            ),
            Err(e) => error!(run_type = %run_type, error = %e, "Background sync failed"),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Current sync progress and when each kind of sync last finished.
pub async fn get_sync_status(
    State(state): State<AppState>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    let snapshot = state.sync_state.snapshot();
    let last_sync = state.repo.last_sync_time(SyncMetadataKey::LastSync).await?;
    let last_full = state
        .repo
        .last_sync_time(SyncMetadataKey::LastFullSync)
        .await?;
    let last_quick = state
        .repo
        .last_sync_time(SyncMetadataKey::LastQuickSync)
        .await?;

    Ok(Json(SyncStatusResponse::new(
        snapshot, last_sync, last_full, last_quick,
    )))
}
