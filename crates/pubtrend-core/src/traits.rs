//! Trait definitions for external dependencies.
//!
//! The harvesting core never talks to HTTP, SQL or the filesystem directly.
//! It goes through these traits so that:
//!
//! - **Testability**: scripted transports and in-memory stores drive the
//!   orchestrator in tests
//! - **Decoupling**: the core does not depend on reqwest or sqlx drivers
//!
//! # Example
//!
//! ```ignore
//! use pubtrend_core::traits::{CountsStore, OaiTransport};
//!
//! async fn first_page<T: OaiTransport>(transport: &T) -> Result<usize, AppError> {
//!     let request = ListRequest::list_identifiers("oai_dc", Some("cs"));
//!     Ok(transport.fetch_page(&request).await?.records.len())
//! }
//! ```

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::AppError;
use crate::checkpoint::Checkpoint;
use crate::models::{CategoryInfo, CountRow, ListRequest, PageResult};
use crate::sync::SyncMetadataKey;

/// Single-attempt access to an OAI-PMH repository.
///
/// Implementations perform exactly one network round trip per call and
/// never retry; [`crate::page::PageFetcher`] owns the retry policy.
pub trait OaiTransport: Send + Sync + Clone {
    /// Fetches and parses one page of a listing.
    ///
    /// # Returns
    ///
    /// - `Ok(page)` for a normal page, or an empty page when the repository
    ///   answered `noRecordsMatch`
    /// - `Err(AppError::Protocol { .. })` for any other embedded OAI-PMH error
    /// - a retryable error (see [`AppError::is_retryable`]) for timeouts,
    ///   connection failures, non-2xx statuses and unparseable bodies
    fn fetch_page(
        &self,
        request: &ListRequest,
    ) -> impl Future<Output = Result<PageResult, AppError>> + Send;
}

/// Persistent store of monthly publication counts.
pub trait CountsStore: Send + Sync + Clone {
    /// Writes all rows in one batch, replacing any existing
    /// `(category, year, month)` value.
    ///
    /// # Returns
    ///
    /// The number of rows written.
    fn upsert_counts(&self, rows: &[CountRow])
    -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Records when a sync of the given kind finished.
    fn record_sync_time(
        &self,
        key: SyncMetadataKey,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Last recorded time for `key`, if any sync of that kind ever finished.
    fn last_sync_time(
        &self,
        key: SyncMetadataKey,
    ) -> impl Future<Output = Result<Option<DateTime<Utc>>, AppError>> + Send;

    /// Monthly series for one category, oldest first.
    fn monthly_counts(
        &self,
        category_id: &str,
    ) -> impl Future<Output = Result<Vec<CountRow>, AppError>> + Send;

    /// Inserts categories that are not stored yet. Existing rows and counts are untouched.
    fn seed_categories(
        &self,
        categories: &[CategoryInfo],
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Lists seeded categories.
    fn list_categories(&self) -> impl Future<Output = Result<Vec<CategoryInfo>, AppError>> + Send;

    /// Cheap connectivity probe.
    fn health_check(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Durable, overwrite-in-place storage of a single [`Checkpoint`].
pub trait CheckpointStore: Send + Sync {
    /// Atomically replaces the stored checkpoint.
    fn save(&self, checkpoint: &Checkpoint) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Reads the stored checkpoint.
    ///
    /// `Ok(None)` when nothing is stored; `Err(AppError::CheckpointError)`
    /// when something is stored but unreadable.
    fn load(&self) -> impl Future<Output = Result<Option<Checkpoint>, AppError>> + Send;

    /// Removes the stored checkpoint. Clearing an empty store is not an error.
    fn clear(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}
