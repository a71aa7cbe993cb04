//! Trend ranking endpoint.

use axum::{
    Json,
    extract::{Query, State},
};

use pubtrend_core::TrendStats;

use crate::dto::TrendsQuery;
use crate::error::ApiError;
use crate::state::AppState;

/// Categories ranked by hype score.
///
/// `order=rising` (default) puts the fastest growing first,
/// `order=declining` the fastest shrinking. `group` restricts the ranking
/// to one top-level group and answers 404 for an unknown one.
pub async fn get_trends(
    State(state): State<AppState>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<Vec<TrendStats>>, ApiError> {
    let ranked = state
        .trend_service
        .ranked(
            query.group.as_deref(),
            query.order.into(),
            query.effective_limit(),
        )
        .await?;
    Ok(Json(ranked))
}
