//! Sync run types: run kinds, month windows, outcomes and metadata keys.
//!
//! Pure data and small helpers; the orchestration lives in
//! [`crate::harvest`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::YearMonth;

// =============================================================================
// Run type
// =============================================================================

/// Kind of sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    /// Every month from the configured start year to now.
    Full,
    /// The last few months only.
    Quick,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Full => "full",
            RunType::Quick => "quick",
        }
    }
}

impl std::fmt::Display for RunType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RunType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(RunType::Full),
            "quick" => Ok(RunType::Quick),
            _ => Err(AppError::ConfigError(format!(
                "Unknown sync mode: '{}'. Valid options: full, quick",
                s
            ))),
        }
    }
}

// =============================================================================
// Window
// =============================================================================

/// Inclusive range of months a run aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    start: YearMonth,
    end: YearMonth,
}

impl SyncWindow {
    /// `None` when `start` is after `end`.
    pub fn new(start: YearMonth, end: YearMonth) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// January of `start_year` through the month of `today`.
    ///
    /// # Errors
    ///
    /// [`AppError::ConfigError`] if `start_year` is in the future or not a
    /// valid year.
    pub fn full(start_year: i32, today: NaiveDate) -> Result<Self, AppError> {
        let end = YearMonth::from_date(today);
        YearMonth::new(start_year, 1)
            .and_then(|start| Self::new(start, end))
            .ok_or_else(|| {
                AppError::ConfigError(format!(
                    "Start year {} is after the current month {}",
                    start_year, end
                ))
            })
    }

    /// The `months` months ending with the month of `today`, inclusive.
    ///
    /// `months = 0` is treated as 1.
    pub fn trailing(months: u32, today: NaiveDate) -> Self {
        let end = YearMonth::from_date(today);
        let mut start = end;
        for _ in 1..months.max(1) {
            start = start.prev();
        }
        Self { start, end }
    }

    pub fn start(&self) -> YearMonth {
        self.start
    }

    pub fn end(&self) -> YearMonth {
        self.end
    }

    pub fn contains(&self, month: YearMonth) -> bool {
        self.start <= month && month <= self.end
    }

    /// Value for the listing's `from` argument.
    ///
    /// Repository datestamps are never earlier than the submission date, so
    /// filtering on the window start only trims records that cannot be in
    /// the window. No `until` is sent for the same reason.
    pub fn from_date(&self) -> NaiveDate {
        self.start.first_day()
    }

    /// Number of months covered.
    pub fn month_count(&self) -> u32 {
        let years = (self.end.year() - self.start.year()) as u32;
        years * 12 + self.end.month() + 1 - self.start.month()
    }
}

impl std::fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// =============================================================================
// Request / result
// =============================================================================

/// What a run should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub run_type: RunType,
    pub window: SyncWindow,
    /// Continue from a matching checkpoint if one exists.
    pub resume: bool,
}

impl SyncRequest {
    pub fn full(start_year: i32, today: NaiveDate, resume: bool) -> Result<Self, AppError> {
        Ok(Self {
            run_type: RunType::Full,
            window: SyncWindow::full(start_year, today)?,
            resume,
        })
    }

    /// Quick runs always start over: they are short and their window moves.
    pub fn quick(months: u32, today: NaiveDate) -> Self {
        Self {
            run_type: RunType::Quick,
            window: SyncWindow::trailing(months, today),
            resume: false,
        }
    }
}

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every set was walked to the end.
    Completed,
    /// Counts were persisted but at least one set stopped early.
    CompletedWithErrors,
    /// Stopped by cancellation; nothing was persisted.
    Cancelled,
}

impl SyncStatus {
    /// Returns the string representation for storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Completed => "completed",
            SyncStatus::CompletedWithErrors => "completed_with_errors",
            SyncStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncStatus::Cancelled)
    }
}

/// Summary returned by every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_type: RunType,
    pub window: SyncWindow,
    pub status: SyncStatus,
    pub sets_total: usize,
    /// Sets walked to the end in this process, resumed ones excluded.
    pub sets_completed: usize,
    /// Sets that stopped early and whose counts may be partial.
    pub incomplete_sets: Vec<String>,
    /// Live records received.
    pub records_seen: usize,
    /// Category increments made.
    pub records_counted: u64,
    /// Records that contributed nothing (unparseable, out of window, untracked).
    pub records_skipped: usize,
    /// Deleted headers dropped.
    pub records_deleted: usize,
    /// Rows written to the counts store.
    pub rows_written: u64,
    /// Index of the first set this process did not finish.
    pub resume_index: usize,
    /// Set index the run resumed from, if it resumed.
    pub resumed_from: Option<usize>,
}

impl SyncReport {
    pub fn new(run_type: RunType, window: SyncWindow, sets_total: usize) -> Self {
        Self {
            run_type,
            window,
            status: SyncStatus::Completed,
            sets_total,
            sets_completed: 0,
            incomplete_sets: Vec::new(),
            records_seen: 0,
            records_counted: 0,
            records_skipped: 0,
            records_deleted: 0,
            rows_written: 0,
            resume_index: 0,
            resumed_from: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.is_cancelled()
    }
}

// =============================================================================
// Metadata keys
// =============================================================================

/// Keys of the `sync_metadata` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMetadataKey {
    /// Any successful run.
    LastSync,
    LastFullSync,
    LastQuickSync,
}

impl SyncMetadataKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMetadataKey::LastSync => "last_sync",
            SyncMetadataKey::LastFullSync => "last_full_sync",
            SyncMetadataKey::LastQuickSync => "last_quick_sync",
        }
    }

    /// The run-specific key for `run_type`.
    pub fn for_run(run_type: RunType) -> Self {
        match run_type {
            RunType::Full => SyncMetadataKey::LastFullSync,
            RunType::Quick => SyncMetadataKey::LastQuickSync,
        }
    }
}
