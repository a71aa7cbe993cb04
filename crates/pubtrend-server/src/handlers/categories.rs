//! Category endpoints.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::dto::{CategoryGroupResponse, MonthlyCountResponse};
use crate::error::ApiError;
use crate::state::AppState;
use pubtrend_core::TrendStats;

/// All seeded categories, nested under their top-level groups.
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryGroupResponse>>, ApiError> {
    let categories = state.repo.list_categories().await?;
    Ok(Json(CategoryGroupResponse::group(categories)))
}

/// Monthly counts of one category, oldest first, incomplete months dropped.
pub async fn get_category_counts(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
) -> Result<Json<Vec<MonthlyCountResponse>>, ApiError> {
    let rows = state.trend_service.monthly_counts(&category_id).await?;
    Ok(Json(
        rows.into_iter().map(MonthlyCountResponse::from).collect(),
    ))
}

pub async fn get_category_stats(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
) -> Result<Json<TrendStats>, ApiError> {
    let stats = state.trend_service.stats(&category_id).await?;
    Ok(Json(stats))
}
