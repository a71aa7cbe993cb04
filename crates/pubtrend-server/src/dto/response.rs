//! Response DTOs for API endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pubtrend_core::{CategoryInfo, CountRow, RunType, SyncState, SyncWindow};

// =============================================================================
// Health
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// Server version
    pub version: String,
    /// Database connectivity status
    pub database: ServiceStatus,
}

/// Status of an individual service component.
#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Sync
// =============================================================================

/// Live sync progress plus the persisted sync history.
#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub is_syncing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_type: Option<RunType>,
    /// Last status line; kept after a run ends
    pub progress: String,
    pub current: usize,
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_full_sync: Option<DateTime<Utc>>,
    pub last_quick_sync: Option<DateTime<Utc>>,
}

impl SyncStatusResponse {
    pub fn new(
        state: SyncState,
        last_sync: Option<DateTime<Utc>>,
        last_full_sync: Option<DateTime<Utc>>,
        last_quick_sync: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            is_syncing: state.running,
            run_type: state.run_type,
            progress: state.message,
            current: state.current,
            total: state.total,
            success_count: state.success_count,
            error_count: state.error_count,
            started_at: state.started_at,
            last_sync,
            last_full_sync,
            last_quick_sync,
        }
    }
}

/// Returned when a sync was accepted.
#[derive(Debug, Serialize)]
pub struct SyncStartedResponse {
    pub message: String,
    #[serde(rename = "type")]
    pub run_type: RunType,
    /// First and last month the run covers, as `YYYY-MM`
    pub window_start: String,
    pub window_end: String,
    pub resume: bool,
}

impl SyncStartedResponse {
    pub fn new(run_type: RunType, window: &SyncWindow, resume: bool) -> Self {
        Self {
            message: "Sync started".to_string(),
            run_type,
            window_start: window.start().to_string(),
            window_end: window.end().to_string(),
            resume,
        }
    }
}

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: String,
    pub name: String,
    pub parent_category: Option<String>,
}

impl From<CategoryInfo> for CategoryResponse {
    fn from(c: CategoryInfo) -> Self {
        Self {
            id: c.id,
            name: c.name,
            parent_category: c.parent_category,
        }
    }
}

/// A top-level group with its subcategories.
#[derive(Debug, Serialize)]
pub struct CategoryGroupResponse {
    pub id: String,
    pub name: String,
    pub subcategories: Vec<CategoryResponse>,
}

impl CategoryGroupResponse {
    /// Nests flat category rows under their groups, keeping row order.
    /// Subcategories whose group is missing are dropped.
    pub fn group(categories: Vec<CategoryInfo>) -> Vec<Self> {
        let (groups, members): (Vec<_>, Vec<_>) = categories
            .into_iter()
            .partition(|c| c.parent_category.is_none());

        let mut result: Vec<Self> = groups
            .into_iter()
            .map(|g| Self {
                id: g.id,
                name: g.name,
                subcategories: Vec::new(),
            })
            .collect();

        for member in members {
            if let Some(group) = result
                .iter_mut()
                .find(|g| member.parent_category.as_deref() == Some(g.id.as_str()))
            {
                group.subcategories.push(CategoryResponse::from(member));
            }
        }

        result
    }
}

#[derive(Debug, Serialize)]
pub struct MonthlyCountResponse {
    pub year: i32,
    pub month: u32,
    pub count: u64,
}

impl From<CountRow> for MonthlyCountResponse {
    fn from(row: CountRow) -> Self {
        Self {
            year: row.year,
            month: row.month,
            count: row.count,
        }
    }
}
