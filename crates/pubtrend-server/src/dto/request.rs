//! Request DTOs for API endpoints.

use serde::Deserialize;

use pubtrend_core::{Ranking, RunType};

/// Default number of categories in a trend ranking.
pub const DEFAULT_TRENDS_LIMIT: usize = 10;

/// Upper bound on a trend ranking; the mapping has fewer categories anyway.
pub const MAX_TRENDS_LIMIT: usize = 100;

/// Request body for starting a sync.
#[derive(Debug, Deserialize)]
pub struct TriggerSyncRequest {
    /// `full` or `quick` (default: quick)
    #[serde(default = "default_mode")]
    pub mode: RunType,

    /// Resume a matching checkpoint (full runs only, default: true)
    #[serde(default = "default_resume")]
    pub resume: bool,

    /// First year of a full run (default: configured start year)
    #[serde(default)]
    pub start_year: Option<i32>,
}

fn default_mode() -> RunType {
    RunType::Quick
}

fn default_resume() -> bool {
    true
}

/// Ranking direction in the trends query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendOrder {
    #[default]
    Rising,
    Declining,
}

impl From<TrendOrder> for Ranking {
    fn from(order: TrendOrder) -> Self {
        match order {
            TrendOrder::Rising => Ranking::Rising,
            TrendOrder::Declining => Ranking::Declining,
        }
    }
}

/// Query parameters for trend rankings.
#[derive(Debug, Default, Deserialize)]
pub struct TrendsQuery {
    /// Restrict to one top-level group (e.g. `cs`)
    pub group: Option<String>,

    /// Maximum number of categories (default: 10, max: 100)
    pub limit: Option<usize>,

    /// `rising` or `declining` (default: rising)
    #[serde(default)]
    pub order: TrendOrder,
}

impl TrendsQuery {
    /// Requested limit clamped to `1..=MAX_TRENDS_LIMIT`.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_TRENDS_LIMIT)
            .clamp(1, MAX_TRENDS_LIMIT)
    }
}
