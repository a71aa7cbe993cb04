//! Trend statistics over stored monthly counts.
//!
//! This module provides the [`TrendService`] for reading counts back out of
//! a [`CountsStore`] and summarising them per category: totals, monthly
//! average, the long-term "hype score" and the short-term growth.
//!
//! Months whose count is far below the category's median are treated as
//! incomplete data (a month still being harvested, or a failed set) and are
//! left out of every calculation.
//!
//! # Example
//!
//! ```ignore
//! use pubtrend_core::{SetMapping, TrendService, Ranking};
//!
//! let trends = TrendService::new(repo, SetMapping::arxiv());
//! for stats in trends.ranked(None, Ranking::Rising, 10).await? {
//!     println!("{} {:+.1}%", stats.category_id, stats.hype_score);
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::categories::SetMapping;
use crate::error::AppError;
use crate::models::CountRow;
use crate::traits::CountsStore;

/// Months needed before a hype score is computed.
const HYPE_MIN_MONTHS: usize = 24;

/// Minimum count for a month to be considered complete.
const MIN_VALID_COUNT: f64 = 5.0;

/// Fraction of the median below which a month is considered incomplete.
const MEDIAN_FRACTION: f64 = 0.05;

/// Long-term trend label derived from the hype score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Surging,
    Rising,
    Growing,
    Stable,
    Cooling,
    Declining,
    /// No stored data.
    Unknown,
}

impl TrendDirection {
    /// Label for a hype score (percentage growth).
    pub fn from_score(score: f64) -> Self {
        if score > 50.0 {
            TrendDirection::Surging
        } else if score > 20.0 {
            TrendDirection::Rising
        } else if score > 5.0 {
            TrendDirection::Growing
        } else if score < -20.0 {
            TrendDirection::Declining
        } else if score < -5.0 {
            TrendDirection::Cooling
        } else {
            TrendDirection::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Surging => "surging",
            TrendDirection::Rising => "rising",
            TrendDirection::Growing => "growing",
            TrendDirection::Stable => "stable",
            TrendDirection::Cooling => "cooling",
            TrendDirection::Declining => "declining",
            TrendDirection::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary of one category's stored counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    pub category_id: String,
    pub category_name: String,
    /// Sum over complete months.
    pub total_papers: u64,
    pub average_monthly: f64,
    /// Growth of the last twelve complete months over the first twelve, in
    /// percent. Zero with fewer than 24 complete months.
    pub hype_score: f64,
    pub trend_direction: TrendDirection,
    /// Last three complete months over the three before, in percent.
    pub recent_growth_percent: f64,
}

impl TrendStats {
    /// Computes the statistics from rows ordered oldest first.
    pub fn compute(category_id: &str, category_name: &str, rows: &[CountRow]) -> Self {
        let counts: Vec<u64> = rows.iter().map(|r| r.count).collect();
        if counts.is_empty() {
            return Self {
                category_id: category_id.to_string(),
                category_name: category_name.to_string(),
                total_papers: 0,
                average_monthly: 0.0,
                hype_score: 0.0,
                trend_direction: TrendDirection::Unknown,
                recent_growth_percent: 0.0,
            };
        }

        let valid = filter_valid_counts(&counts);
        let total: u64 = valid.iter().sum();
        let average = if valid.is_empty() {
            0.0
        } else {
            total as f64 / valid.len() as f64
        };
        let hype = hype_score(&counts);

        Self {
            category_id: category_id.to_string(),
            category_name: category_name.to_string(),
            total_papers: total,
            average_monthly: round1(average),
            hype_score: hype,
            trend_direction: TrendDirection::from_score(hype),
            recent_growth_percent: round1(recent_growth(&valid)),
        }
    }
}

/// Sort order for [`TrendService::ranked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    /// Highest hype score first.
    Rising,
    /// Lowest hype score first.
    Declining,
}

/// Counts below this are treated as incomplete months.
///
/// `max(5, 5% of the median of the non-zero counts)`.
pub fn validity_threshold(counts: &[u64]) -> f64 {
    let mut nonzero: Vec<u64> = counts.iter().copied().filter(|&c| c > 0).collect();
    if nonzero.is_empty() {
        return MIN_VALID_COUNT;
    }
    nonzero.sort_unstable();
    let median = nonzero[nonzero.len() / 2] as f64;
    MIN_VALID_COUNT.max(median * MEDIAN_FRACTION)
}

/// Counts of complete months, in their original order.
pub fn filter_valid_counts(counts: &[u64]) -> Vec<u64> {
    let threshold = validity_threshold(counts);
    counts
        .iter()
        .copied()
        .filter(|&c| c as f64 >= threshold)
        .collect()
}

/// Long-term growth in percent, rounded to one decimal.
///
/// Compares the mean of the first twelve complete months with the mean of
/// the last twelve.
pub fn hype_score(counts: &[u64]) -> f64 {
    let valid = filter_valid_counts(counts);
    if valid.len() < HYPE_MIN_MONTHS {
        return 0.0;
    }

    let first = mean(&valid[..12]);
    let last = mean(&valid[valid.len() - 12..]);
    if first == 0.0 {
        return 0.0;
    }

    round1((last - first) / first * 100.0)
}

fn recent_growth(valid: &[u64]) -> f64 {
    if valid.len() < 6 {
        return 0.0;
    }
    let n = valid.len();
    let recent: u64 = valid[n - 3..].iter().sum();
    let previous: u64 = valid[n - 6..n - 3].iter().sum();
    if previous == 0 {
        return 0.0;
    }
    (recent as f64 - previous as f64) / previous as f64 * 100.0
}

fn mean(values: &[u64]) -> f64 {
    values.iter().sum::<u64>() as f64 / values.len() as f64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Service for trend statistics.
pub struct TrendService<S>
where
    S: CountsStore,
{
    store: S,
    mapping: SetMapping,
}

impl<S> Clone for TrendService<S>
where
    S: CountsStore,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            mapping: self.mapping.clone(),
        }
    }
}

impl<S> TrendService<S>
where
    S: CountsStore,
{
    pub fn new(store: S, mapping: SetMapping) -> Self {
        Self { store, mapping }
    }

    pub fn mapping(&self) -> &SetMapping {
        &self.mapping
    }

    /// Stored months of `category_id` with incomplete months removed.
    ///
    /// # Errors
    ///
    /// [`AppError::UnknownCategory`] if the id is not in the mapping.
    pub async fn monthly_counts(&self, category_id: &str) -> Result<Vec<CountRow>, AppError> {
        self.require(category_id)?;
        let rows = self.store.monthly_counts(category_id).await?;
        let counts: Vec<u64> = rows.iter().map(|r| r.count).collect();
        let threshold = validity_threshold(&counts);

        Ok(rows
            .into_iter()
            .filter(|r| r.count as f64 >= threshold)
            .collect())
    }

    /// Statistics for one category.
    ///
    /// # Errors
    ///
    /// [`AppError::UnknownCategory`] if the id is not in the mapping.
    pub async fn stats(&self, category_id: &str) -> Result<TrendStats, AppError> {
        let name = self.require(category_id)?;
        let rows = self.store.monthly_counts(category_id).await?;
        Ok(TrendStats::compute(category_id, name, &rows))
    }

    /// Statistics for every category with data, ordered by hype score.
    ///
    /// `group` restricts the ranking to one top-level set. `limit` caps the
    /// result length.
    ///
    /// # Errors
    ///
    /// [`AppError::UnknownCategory`] if `group` is not a top-level set.
    pub async fn ranked(
        &self,
        group: Option<&str>,
        ranking: Ranking,
        limit: usize,
    ) -> Result<Vec<TrendStats>, AppError> {
        if let Some(group) = group {
            if !self.mapping.top_level_sets().iter().any(|s| s == group) {
                return Err(AppError::UnknownCategory(group.to_string()));
            }
        }

        let mut all = Vec::new();
        for entry in self.mapping.entries() {
            if group.is_some_and(|g| self.mapping.parent_set(&entry.category_id) != Some(g)) {
                continue;
            }
            let rows = self.store.monthly_counts(&entry.category_id).await?;
            let stats = TrendStats::compute(&entry.category_id, &entry.name, &rows);
            if stats.total_papers > 0 {
                all.push(stats);
            }
        }

        match ranking {
            Ranking::Rising => all.sort_by(|a, b| b.hype_score.total_cmp(&a.hype_score)),
            Ranking::Declining => all.sort_by(|a, b| a.hype_score.total_cmp(&b.hype_score)),
        }
        all.truncate(limit);
        Ok(all)
    }

    fn require(&self, category_id: &str) -> Result<&str, AppError> {
        self.mapping
            .entry(category_id)
            .map(|e| e.name.as_str())
            .ok_or_else(|| AppError::UnknownCategory(category_id.to_string()))
    }
}
