//! pubtrend Core - Domain types, harvesting logic, and services.
//!
//! This crate provides the core functionality for pubtrend, including:
//!
//! - **Domain models**: [`YearMonth`], [`HeaderRecord`], [`PageResult`], [`CountRow`]
//! - **Pure logic**: identifier → month parsing, category ↔ set mapping, bucketing
//! - **Protocol plumbing**: [`PageFetcher`] (retry/backoff) and [`walk_listing`] (resumption tokens, rate limiting)
//! - **Services**: [`HarvestService`] for full and quick sync runs, [`TrendService`] for reading counts back
//! - **Traits**: [`OaiTransport`], [`CountsStore`], [`CheckpointStore`] for dependency injection
//! - **Progress reporting**: [`ProgressReporter`] trait and the shared [`SyncStateHandle`]
//!
//! # Architecture
//!
//! This crate is reused by the CLI and the REST server. Network and storage
//! live behind traits:
//!
//! - [`OaiTransport`] - one OAI-PMH request (e.g., `pubtrend_client::OaiPmhClient`)
//! - [`CountsStore`] - counts persistence (e.g., `pubtrend_db::CountsRepository`)
//! - [`CheckpointStore`] - run progress (e.g., [`FileCheckpointStore`])
//!
//! # Example
//!
//! ```ignore
//! use pubtrend_core::{FileCheckpointStore, HarvestService, SyncStateHandle, TracingReporter};
//! use tokio_util::sync::CancellationToken;
//!
//! let service = HarvestService::new(client, repo, FileCheckpointStore::new(path));
//! let state = SyncStateHandle::new();
//! let report = service
//!     .full_sync(&state, Some(2022), true, &TracingReporter, CancellationToken::new())
//!     .await?;
//! ```

pub mod aggregate;
pub mod categories;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod harvest;
pub mod identifier;
pub mod models;
pub mod page;
pub mod progress;
pub mod state;
pub mod sync;
pub mod traits;
pub mod trends;
pub mod walker;

// Configuration
pub use config::{
    HarvestConfig, HttpConfig, RetryPolicy, Settings, default_checkpoint_path,
    default_config_path, load_settings,
};

// Error handling
pub use error::AppError;

// Domain models
pub use models::{
    CategoryInfo, CountRow, HeaderRecord, ListRequest, OaiErrorCode, PageResult, YearMonth,
};

// Pure logic
pub use aggregate::{AggregateStats, Buckets, aggregate_records};
pub use categories::{MappingEntry, SetMapping};
pub use identifier::parse_year_month;

// Checkpointing and run state
pub use checkpoint::{Checkpoint, FileCheckpointStore};
pub use state::{SyncGuard, SyncState, SyncStateHandle};

// Sync types
pub use sync::{RunType, SyncMetadataKey, SyncReport, SyncRequest, SyncStatus, SyncWindow};

// Progress reporting
pub use progress::{ProgressReporter, SilentReporter, SyncEvent, TracingReporter};

// Traits for dependency injection
pub use traits::{CheckpointStore, CountsStore, OaiTransport};

// Services (generic over trait implementations)
pub use harvest::HarvestService;
pub use trends::{Ranking, TrendDirection, TrendService, TrendStats};
pub use page::PageFetcher;
pub use walker::{WalkOutcome, walk_listing};
