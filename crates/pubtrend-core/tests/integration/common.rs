//! Test utilities and mock implementations for integration tests.
//!
//! Provides in-memory implementations of the core traits for testing
//! `HarvestService` in isolation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use pubtrend_core::traits::{CheckpointStore, CountsStore, OaiTransport};
use pubtrend_core::{
    AppError, CategoryInfo, Checkpoint, CountRow, HarvestConfig, HarvestService, HeaderRecord,
    ListRequest, MappingEntry, PageResult, RetryPolicy, SetMapping, SyncMetadataKey,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Fixed "today" used by every test run.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

/// Three-set mapping, small enough to reason about.
pub fn test_mapping() -> SetMapping {
    SetMapping::from_entries(vec![
        MappingEntry::new("cs.AI", "cs:cs:AI", "Artificial Intelligence"),
        MappingEntry::new("cs.LG", "cs:cs:LG", "Machine Learning"),
        MappingEntry::new("stat.ML", "stat:stat:ML", "Machine Learning"),
        MappingEntry::new("math.OC", "math:math:OC", "Optimization and Control"),
    ])
    .unwrap()
}

pub fn test_config() -> HarvestConfig {
    HarvestConfig {
        rate_limit: Duration::from_secs(3),
        start_year: 2024,
        ..Default::default()
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 1,
        base_delay: Duration::from_secs(1),
    }
}

pub fn header(id: &str, specs: &[&str]) -> HeaderRecord {
    HeaderRecord {
        identifier: id.to_string(),
        datestamp: Some("2024-03-01".to_string()),
        deleted: false,
        set_specs: specs.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn deleted_header(id: &str, specs: &[&str]) -> HeaderRecord {
    HeaderRecord {
        deleted: true,
        ..header(id, specs)
    }
}

pub fn page(records: Vec<HeaderRecord>, token: Option<&str>) -> PageResult {
    PageResult {
        records,
        resumption_token: token.map(str::to_string),
    }
}

pub type TestService = HarvestService<MockTransport, MemoryCountsStore, MemoryCheckpointStore>;

pub fn service(
    transport: MockTransport,
    store: MemoryCountsStore,
    checkpoints: MemoryCheckpointStore,
) -> TestService {
    HarvestService::with_config(transport, store, checkpoints, test_config())
        .with_mapping(test_mapping())
        .with_retry_policy(fast_retry())
}

// =============================================================================
// MockTransport
// =============================================================================

/// A request as seen by the transport.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub at: Instant,
    pub request: ListRequest,
}

/// Transport serving a scripted sequence of replies per top-level set.
///
/// Sets without a script answer with an empty page.
#[derive(Clone, Default)]
pub struct MockTransport {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Result<PageResult, AppError>>>>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    cancel_on: Arc<Mutex<Option<(String, CancellationToken)>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends replies for `set`, served in order.
    pub fn script(self, set: &str, replies: Vec<Result<PageResult, AppError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(set.to_string())
            .or_default()
            .extend(replies);
        self
    }

    /// Cancels `token` as soon as the first request for `set` arrives.
    pub fn cancel_on(self, set: &str, token: CancellationToken) -> Self {
        *self.cancel_on.lock().unwrap() = Some((set.to_string(), token));
        self
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn requested_sets(&self) -> Vec<String> {
        self.seen()
            .into_iter()
            .map(|s| s.request.set_label().to_string())
            .collect()
    }

    pub fn request_count(&self, set: &str) -> usize {
        self.requested_sets().iter().filter(|s| *s == set).count()
    }
}

impl OaiTransport for MockTransport {
    async fn fetch_page(&self, request: &ListRequest) -> Result<PageResult, AppError> {
        self.seen.lock().unwrap().push(SeenRequest {
            at: Instant::now(),
            request: request.clone(),
        });

        let set = request.set_label().to_string();
        if let Some((target, token)) = self.cancel_on.lock().unwrap().as_ref() {
            if *target == set {
                token.cancel();
            }
        }

        self.scripts
            .lock()
            .unwrap()
            .get_mut(&set)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(PageResult::empty()))
    }
}

// =============================================================================
// MemoryCountsStore
// =============================================================================

/// In-memory counts store with the same upsert semantics as the SQL one.
#[derive(Clone, Default)]
pub struct MemoryCountsStore {
    pub counts: Arc<Mutex<HashMap<(String, i32, u32), u64>>>,
    pub sync_times: Arc<Mutex<HashMap<&'static str, DateTime<Utc>>>>,
    pub categories: Arc<Mutex<Vec<CategoryInfo>>>,
    pub upsert_calls: Arc<Mutex<usize>>,
    fail_upsert: bool,
}

impl MemoryCountsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `upsert_counts` always fails.
    pub fn failing() -> Self {
        Self {
            fail_upsert: true,
            ..Self::default()
        }
    }

    pub fn get(&self, category: &str, year: i32, month: u32) -> u64 {
        self.counts
            .lock()
            .unwrap()
            .get(&(category.to_string(), year, month))
            .copied()
            .unwrap_or(0)
    }

    pub fn rows(&self) -> Vec<(String, i32, u32, u64)> {
        let mut rows: Vec<_> = self
            .counts
            .lock()
            .unwrap()
            .iter()
            .map(|((c, y, m), n)| (c.clone(), *y, *m, *n))
            .collect();
        rows.sort();
        rows
    }

    pub fn sync_time(&self, key: SyncMetadataKey) -> Option<DateTime<Utc>> {
        self.sync_times.lock().unwrap().get(key.as_str()).copied()
    }

    pub fn upsert_call_count(&self) -> usize {
        *self.upsert_calls.lock().unwrap()
    }
}

impl CountsStore for MemoryCountsStore {
    async fn upsert_counts(&self, rows: &[CountRow]) -> Result<u64, AppError> {
        *self.upsert_calls.lock().unwrap() += 1;
        if self.fail_upsert {
            return Err(AppError::Generic("disk full".to_string()));
        }
        let mut counts = self.counts.lock().unwrap();
        for row in rows {
            counts.insert((row.category_id.clone(), row.year, row.month), row.count);
        }
        Ok(rows.len() as u64)
    }

    async fn record_sync_time(
        &self,
        key: SyncMetadataKey,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.sync_times.lock().unwrap().insert(key.as_str(), at);
        Ok(())
    }

    async fn last_sync_time(
        &self,
        key: SyncMetadataKey,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        Ok(self.sync_time(key))
    }

    async fn monthly_counts(&self, category_id: &str) -> Result<Vec<CountRow>, AppError> {
        Ok(self
            .rows()
            .into_iter()
            .filter(|(c, _, _, _)| c == category_id)
            .map(|(category_id, year, month, count)| CountRow {
                category_id,
                year,
                month,
                count,
            })
            .collect())
    }

    async fn seed_categories(&self, categories: &[CategoryInfo]) -> Result<(), AppError> {
        *self.categories.lock().unwrap() = categories.to_vec();
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<CategoryInfo>, AppError> {
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

// =============================================================================
// MemoryCheckpointStore
// =============================================================================

/// Checkpoint store kept in memory, recording every save.
#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    pub current: Arc<Mutex<Option<Checkpoint>>>,
    pub saved_indices: Arc<Mutex<Vec<usize>>>,
    fail_saves: bool,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(checkpoint: Checkpoint) -> Self {
        let store = Self::default();
        *store.current.lock().unwrap() = Some(checkpoint);
        store
    }

    /// A store whose `save` always fails.
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Option<Checkpoint> {
        self.current.lock().unwrap().clone()
    }

    pub fn saved_indices(&self) -> Vec<usize> {
        self.saved_indices.lock().unwrap().clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), AppError> {
        if self.fail_saves {
            return Err(AppError::CheckpointError("read-only filesystem".to_string()));
        }
        self.saved_indices
            .lock()
            .unwrap()
            .push(checkpoint.next_set_index);
        *self.current.lock().unwrap() = Some(checkpoint.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Checkpoint>, AppError> {
        Ok(self.stored())
    }

    async fn clear(&self) -> Result<(), AppError> {
        *self.current.lock().unwrap() = None;
        Ok(())
    }
}
