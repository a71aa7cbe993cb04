use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use pubtrend_client::OaiPmhClient;
use pubtrend_core::{
    FileCheckpointStore, HarvestService, Settings, SyncStateHandle, TrendService,
};
use pubtrend_db::CountsRepository;

/// Harvest service with the production transport and stores.
pub type ServerHarvestService =
    HarvestService<OaiPmhClient, CountsRepository, FileCheckpointStore>;

/// Shared application state for all handlers.
///
/// Axum clones this per request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Runs full and quick syncs
    pub harvest_service: ServerHarvestService,

    /// Read side: filtered counts, statistics and rankings
    pub trend_service: TrendService<CountsRepository>,

    /// Counts repository for direct queries (sync times, categories)
    pub repo: CountsRepository,

    /// Progress of the sync run, shared with the scheduler
    pub sync_state: SyncStateHandle,

    /// Cancelled on shutdown; runs use child tokens
    pub shutdown_token: CancellationToken,

    /// Background syncs started over the API, awaited on shutdown
    pub sync_tasks: TaskTracker,
}

impl AppState {
    /// Creates the application state with all services wired to `repo`.
    pub fn new(
        repo: CountsRepository,
        client: OaiPmhClient,
        settings: &Settings,
        shutdown_token: CancellationToken,
    ) -> Self {
        let checkpoints = FileCheckpointStore::new(settings.harvest.checkpoint_path.clone());
        let harvest_service = HarvestService::with_config(
            client,
            repo.clone(),
            checkpoints,
            settings.harvest.clone(),
        )
        .with_retry_policy(settings.retry.clone());
        let trend_service = TrendService::new(repo.clone(), harvest_service.mapping().clone());

        Self {
            harvest_service,
            trend_service,
            repo,
            sync_state: SyncStateHandle::new(),
            shutdown_token,
            sync_tasks: TaskTracker::new(),
        }
    }
}
