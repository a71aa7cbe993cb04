//! Integration tests for HarvestService using mock implementations.

use std::time::Duration;

use chrono::NaiveDate;
use pubtrend_core::{
    AppError, Buckets, Checkpoint, OaiErrorCode, RunType, SilentReporter, SyncMetadataKey,
    SyncRequest, SyncStateHandle, SyncStatus, SyncWindow, YearMonth,
};
use tokio_util::sync::CancellationToken;

use crate::integration::common::{
    MemoryCheckpointStore, MemoryCountsStore, MockTransport, deleted_header, header, page,
    service, today,
};

fn full_request(resume: bool) -> SyncRequest {
    SyncRequest::full(2024, today(), resume).unwrap()
}

fn ym(year: i32, month: u32) -> YearMonth {
    YearMonth::new(year, month).unwrap()
}

/// The scripted repository used by most tests.
fn standard_transport() -> MockTransport {
    MockTransport::new()
        .script(
            "cs",
            vec![
                Ok(page(
                    vec![
                        header("oai:arXiv.org:2401.12345", &["cs:cs:AI"]),
                        header("oai:arXiv.org:2401.12346", &["cs:cs:AI", "cs:cs:LG"]),
                    ],
                    Some("cs-1"),
                )),
                Ok(page(
                    vec![header("oai:arXiv.org:2402.00001", &["cs:cs:LG", "stat:stat:ML"])],
                    None,
                )),
            ],
        )
        .script(
            "stat",
            vec![Ok(page(
                vec![
                    header("oai:arXiv.org:2402.00001", &["cs:cs:LG", "stat:stat:ML"]),
                    header("oai:arXiv.org:2403.00002", &["stat:stat:ML"]),
                ],
                None,
            ))],
        )
        .script(
            "math",
            vec![Ok(page(
                vec![header("oai:arXiv.org:2401.99999", &["math:math:OC"])],
                None,
            ))],
        )
}

async fn run_full(
    transport: MockTransport,
    store: MemoryCountsStore,
    checkpoints: MemoryCheckpointStore,
    resume: bool,
) -> Result<pubtrend_core::SyncReport, AppError> {
    let service = service(transport, store, checkpoints);
    let state = SyncStateHandle::new();
    let guard = state.try_begin(RunType::Full, "test").unwrap();
    service
        .run(
            guard,
            full_request(resume),
            &SilentReporter,
            CancellationToken::new(),
        )
        .await
}

#[tokio::test(start_paused = true)]
async fn test_single_record_counted_in_identifier_month() {
    // Arrange
    let transport = MockTransport::new().script(
        "cs",
        vec![Ok(page(
            vec![header("oai:arXiv.org:2401.12345", &["cs:cs:AI"])],
            None,
        ))],
    );
    let store = MemoryCountsStore::new();

    // Act
    let report = run_full(transport, store.clone(), MemoryCheckpointStore::new(), false)
        .await
        .unwrap();

    // Assert
    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(store.get("cs.AI", 2024, 1), 1);
    assert_eq!(store.rows().len(), 1);
    assert_eq!(report.rows_written, 1);
    assert_eq!(report.records_counted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_full_run_aggregates_all_sets() {
    let store = MemoryCountsStore::new();
    let checkpoints = MemoryCheckpointStore::new();

    let report = run_full(standard_transport(), store.clone(), checkpoints.clone(), false)
        .await
        .unwrap();

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.sets_total, 3);
    assert_eq!(report.sets_completed, 3);
    assert!(report.incomplete_sets.is_empty());

    assert_eq!(store.get("cs.AI", 2024, 1), 2);
    assert_eq!(store.get("cs.LG", 2024, 1), 1);
    assert_eq!(store.get("cs.LG", 2024, 2), 1);
    assert_eq!(store.get("stat.ML", 2024, 2), 1);
    assert_eq!(store.get("stat.ML", 2024, 3), 1);
    assert_eq!(store.get("math.OC", 2024, 1), 1);

    // written in a single batch, then metadata, then checkpoint removed
    assert_eq!(store.upsert_call_count(), 1);
    assert!(store.sync_time(SyncMetadataKey::LastSync).is_some());
    assert!(store.sync_time(SyncMetadataKey::LastFullSync).is_some());
    assert!(store.sync_time(SyncMetadataKey::LastQuickSync).is_none());
    assert!(checkpoints.stored().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cross_listed_record_counted_once_per_category() {
    let store = MemoryCountsStore::new();
    run_full(standard_transport(), store.clone(), MemoryCheckpointStore::new(), false)
        .await
        .unwrap();

    // 2402.00001 is seen by both the cs and the stat walk
    assert_eq!(store.get("cs.LG", 2024, 2), 1);
    assert_eq!(store.get("stat.ML", 2024, 2), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deleted_unparseable_and_out_of_window_excluded() {
    let transport = MockTransport::new().script(
        "cs",
        vec![Ok(page(
            vec![
                header("oai:arXiv.org:2401.00001", &["cs:cs:AI"]),
                deleted_header("oai:arXiv.org:2401.00002", &["cs:cs:AI"]),
                header("oai:arXiv.org:cs/0101001", &["cs:cs:AI"]),
                header("oai:arXiv.org:2312.00001", &["cs:cs:AI"]),
                header("oai:arXiv.org:2401.00003", &["cs:cs:GT"]),
            ],
            None,
        ))],
    );
    let store = MemoryCountsStore::new();

    let report = run_full(transport, store.clone(), MemoryCheckpointStore::new(), false)
        .await
        .unwrap();

    assert_eq!(store.get("cs.AI", 2024, 1), 1);
    assert_eq!(store.rows().len(), 1);
    assert_eq!(report.records_deleted, 1);
    assert_eq!(report.records_seen, 4);
    assert_eq!(report.records_skipped, 3);
}

#[tokio::test(start_paused = true)]
async fn test_no_records_match_is_a_complete_empty_set() {
    let transport = MockTransport::new().script(
        "math",
        vec![Err(AppError::Protocol {
            code: OaiErrorCode::NoRecordsMatch,
            message: "No records match".to_string(),
        })],
    );

    let report = run_full(
        transport.clone(),
        MemoryCountsStore::new(),
        MemoryCheckpointStore::new(),
        false,
    )
    .await
    .unwrap();

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.sets_completed, 3);
    assert_eq!(transport.request_count("math"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_page_failure_marks_set_incomplete_and_keeps_partial_counts() {
    // cs page 2 times out on every attempt (1 retry allowed)
    let transport = MockTransport::new()
        .script(
            "cs",
            vec![
                Ok(page(
                    vec![header("oai:arXiv.org:2401.12345", &["cs:cs:AI"])],
                    Some("cs-1"),
                )),
                Err(AppError::Timeout(120)),
                Err(AppError::Timeout(120)),
            ],
        )
        .script(
            "stat",
            vec![Ok(page(
                vec![header("oai:arXiv.org:2403.00002", &["stat:stat:ML"])],
                None,
            ))],
        );
    let store = MemoryCountsStore::new();
    let checkpoints = MemoryCheckpointStore::new();

    let report = run_full(transport.clone(), store.clone(), checkpoints.clone(), false)
        .await
        .unwrap();

    assert_eq!(report.status, SyncStatus::CompletedWithErrors);
    assert_eq!(report.incomplete_sets, vec!["cs".to_string()]);
    assert_eq!(report.sets_completed, 2);
    assert_eq!(transport.request_count("cs"), 3);

    // partial cs counts and the following sets are still persisted
    assert_eq!(store.get("cs.AI", 2024, 1), 1);
    assert_eq!(store.get("stat.ML", 2024, 3), 1);
    assert!(checkpoints.stored().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_protocol_error_not_retried_and_run_continues() {
    let transport = MockTransport::new()
        .script(
            "cs",
            vec![Err(AppError::Protocol {
                code: OaiErrorCode::BadArgument,
                message: "Illegal set".to_string(),
            })],
        )
        .script(
            "stat",
            vec![Ok(page(
                vec![header("oai:arXiv.org:2402.00009", &["stat:stat:ML"])],
                None,
            ))],
        );
    let store = MemoryCountsStore::new();

    let report = run_full(transport.clone(), store.clone(), MemoryCheckpointStore::new(), false)
        .await
        .unwrap();

    assert_eq!(transport.request_count("cs"), 1);
    assert_eq!(report.incomplete_sets, vec!["cs".to_string()]);
    assert_eq!(store.get("stat.ML", 2024, 2), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_request_carries_window_start() {
    let transport = standard_transport();
    run_full(
        transport.clone(),
        MemoryCountsStore::new(),
        MemoryCheckpointStore::new(),
        false,
    )
    .await
    .unwrap();

    let seen = transport.seen();
    let first = &seen[0].request;
    assert_eq!(first.set.as_deref(), Some("cs"));
    assert_eq!(first.metadata_prefix, "oai_dc");
    assert_eq!(first.from, NaiveDate::from_ymd_opt(2024, 1, 1));
    assert_eq!(first.until, None);

    let second = &seen[1].request;
    assert_eq!(second.resumption_token.as_deref(), Some("cs-1"));
    assert_eq!(
        transport.requested_sets(),
        vec!["cs", "cs", "stat", "math"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_between_every_request() {
    let transport = standard_transport();
    run_full(
        transport.clone(),
        MemoryCountsStore::new(),
        MemoryCheckpointStore::new(),
        false,
    )
    .await
    .unwrap();

    let seen = transport.seen();
    assert_eq!(seen.len(), 4);
    for pair in seen.windows(2) {
        assert_eq!(pair[1].at - pair[0].at, Duration::from_secs(3));
    }
}

#[tokio::test(start_paused = true)]
async fn test_checkpoint_written_before_each_set() {
    let checkpoints = MemoryCheckpointStore::new();
    run_full(
        standard_transport(),
        MemoryCountsStore::new(),
        checkpoints.clone(),
        false,
    )
    .await
    .unwrap();

    assert_eq!(checkpoints.saved_indices(), vec![0, 1, 2]);
    assert!(checkpoints.stored().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_checkpoint_save_failure_is_not_fatal() {
    let store = MemoryCountsStore::new();
    let report = run_full(
        standard_transport(),
        store.clone(),
        MemoryCheckpointStore::failing(),
        false,
    )
    .await
    .unwrap();

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(store.get("cs.AI", 2024, 1), 2);
}

#[tokio::test(start_paused = true)]
async fn test_two_identical_runs_produce_same_counts() {
    let first = MemoryCountsStore::new();
    let second = MemoryCountsStore::new();

    run_full(standard_transport(), first.clone(), MemoryCheckpointStore::new(), false)
        .await
        .unwrap();
    run_full(standard_transport(), second.clone(), MemoryCheckpointStore::new(), false)
        .await
        .unwrap();

    assert_eq!(first.rows(), second.rows());

    // running again into the same store overwrites instead of adding
    run_full(standard_transport(), first.clone(), MemoryCheckpointStore::new(), false)
        .await
        .unwrap();
    assert_eq!(first.rows(), second.rows());
}

#[tokio::test(start_paused = true)]
async fn test_resume_matches_uninterrupted_run() {
    // Arrange: an uninterrupted reference run
    let reference = MemoryCountsStore::new();
    run_full(standard_transport(), reference.clone(), MemoryCheckpointStore::new(), false)
        .await
        .unwrap();

    // Interrupt a second run when it reaches "stat"
    let checkpoints = MemoryCheckpointStore::new();
    let interrupted_store = MemoryCountsStore::new();
    let cancel = CancellationToken::new();
    let transport = standard_transport().cancel_on("stat", cancel.clone());
    let service = crate::integration::common::service(
        transport,
        interrupted_store.clone(),
        checkpoints.clone(),
    );
    let state = SyncStateHandle::new();
    let guard = state.try_begin(RunType::Full, "test").unwrap();
    let report = service
        .run(guard, full_request(true), &SilentReporter, cancel)
        .await
        .unwrap();
    assert_eq!(report.status, SyncStatus::Cancelled);
    assert!(interrupted_store.rows().is_empty());
    let saved = checkpoints.stored().unwrap();
    assert_eq!(saved.next_set_index, 1);
    assert_eq!(saved.current_set.as_deref(), Some("stat"));

    // Act: resume with a fresh process
    let resumed_store = MemoryCountsStore::new();
    let transport = standard_transport();
    let report = run_full(transport.clone(), resumed_store.clone(), checkpoints.clone(), true)
        .await
        .unwrap();

    // Assert
    assert_eq!(report.resumed_from, Some(1));
    assert_eq!(transport.request_count("cs"), 0);
    assert_eq!(resumed_store.rows(), reference.rows());
    assert!(checkpoints.stored().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_resumed_set_replaces_checkpointed_counts() {
    // A checkpoint that already holds a stale stat.ML value for a set that
    // is about to be re-harvested.
    let window = SyncWindow::full(2024, today()).unwrap();
    let mut buckets = Buckets::new();
    buckets.increment(ym(2024, 1), "cs.AI", 2);
    buckets.increment(ym(2024, 3), "stat.ML", 99);
    let checkpoint = Checkpoint::new(RunType::Full, window, 1, Some("stat"), buckets);

    let store = MemoryCountsStore::new();
    run_full(
        standard_transport(),
        store.clone(),
        MemoryCheckpointStore::with(checkpoint),
        true,
    )
    .await
    .unwrap();

    assert_eq!(store.get("stat.ML", 2024, 3), 1);
    assert_eq!(store.get("cs.AI", 2024, 1), 2);
}

#[tokio::test(start_paused = true)]
async fn test_resume_after_month_boundary_keeps_checkpoint_window() {
    // Interrupted on the last day of March, resumed on the first of April.
    let march = SyncWindow::full(2024, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()).unwrap();
    let mut buckets = Buckets::new();
    buckets.increment(ym(2024, 1), "cs.AI", 2);
    buckets.increment(ym(2024, 2), "cs.LG", 1);
    let checkpoint = Checkpoint::new(RunType::Full, march, 1, Some("stat"), buckets);
    let checkpoints = MemoryCheckpointStore::with(checkpoint);

    let transport = standard_transport();
    let store = MemoryCountsStore::new();
    let service = crate::integration::common::service(
        transport.clone(),
        store.clone(),
        checkpoints.clone(),
    );
    let state = SyncStateHandle::new();
    let guard = state.try_begin(RunType::Full, "test").unwrap();
    let april = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
    let report = service
        .run(
            guard,
            SyncRequest::full(2024, april, true).unwrap(),
            &SilentReporter,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.resumed_from, Some(1));
    assert_eq!(report.window, march);
    assert_eq!(transport.request_count("cs"), 0);
    assert_eq!(store.get("cs.AI", 2024, 1), 2);
    assert_eq!(store.get("stat.ML", 2024, 3), 1);
    assert!(checkpoints.stored().is_none());
    assert!(checkpoints.saved_indices().iter().all(|&i| i >= 1));
}

#[tokio::test(start_paused = true)]
async fn test_mismatched_checkpoint_ignored() {
    let other_window = SyncWindow::full(2022, today()).unwrap();
    let mut buckets = Buckets::new();
    buckets.increment(ym(2022, 6), "cs.AI", 500);
    let checkpoint = Checkpoint::new(RunType::Full, other_window, 2, Some("math"), buckets);

    let transport = standard_transport();
    let store = MemoryCountsStore::new();
    let report = run_full(
        transport.clone(),
        store.clone(),
        MemoryCheckpointStore::with(checkpoint),
        true,
    )
    .await
    .unwrap();

    assert_eq!(report.resumed_from, None);
    assert_eq!(transport.request_count("cs"), 2);
    assert_eq!(store.get("cs.AI", 2022, 6), 0);
}

#[tokio::test(start_paused = true)]
async fn test_resume_false_ignores_checkpoint() {
    let window = SyncWindow::full(2024, today()).unwrap();
    let checkpoint = Checkpoint::new(RunType::Full, window, 2, Some("math"), Buckets::new());

    let transport = standard_transport();
    let report = run_full(
        transport.clone(),
        MemoryCountsStore::new(),
        MemoryCheckpointStore::with(checkpoint),
        false,
    )
    .await
    .unwrap();

    assert_eq!(report.resumed_from, None);
    assert_eq!(transport.request_count("cs"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_rejected_while_running() {
    let service = crate::integration::common::service(
        standard_transport(),
        MemoryCountsStore::new(),
        MemoryCheckpointStore::new(),
    );
    let state = SyncStateHandle::new();
    let _guard = state.try_begin(RunType::Full, "already running").unwrap();

    let result = service
        .quick_sync(&state, &SilentReporter, CancellationToken::new())
        .await;

    assert!(matches!(result, Err(AppError::SyncAlreadyRunning)));
    assert!(state.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_state_reset_after_run() {
    let service = crate::integration::common::service(
        standard_transport(),
        MemoryCountsStore::new(),
        MemoryCheckpointStore::new(),
    );
    let state = SyncStateHandle::new();

    service
        .full_sync(&state, Some(2024), false, &SilentReporter, CancellationToken::new())
        .await
        .unwrap();

    let snapshot = state.snapshot();
    assert!(!snapshot.running);
    assert_eq!(snapshot.current, 0);
    assert_eq!(snapshot.total, 0);
    assert_eq!(snapshot.success_count, 0);
    assert!(snapshot.message.starts_with("Sync complete"));
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_propagates_and_resets_state() {
    let checkpoints = MemoryCheckpointStore::new();
    let service = crate::integration::common::service(
        standard_transport(),
        MemoryCountsStore::failing(),
        checkpoints.clone(),
    );
    let state = SyncStateHandle::new();

    let result = service
        .full_sync(&state, Some(2024), false, &SilentReporter, CancellationToken::new())
        .await;

    assert!(matches!(result, Err(AppError::Generic(_))));
    let snapshot = state.snapshot();
    assert!(!snapshot.running);
    assert!(snapshot.message.starts_with("Sync failed"));
    // progress is kept for a later --resume
    assert!(checkpoints.stored().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_quick_sync_leaves_checkpoint_alone() {
    let window = SyncWindow::full(2022, today()).unwrap();
    let pending = Checkpoint::new(RunType::Full, window, 1, Some("stat"), Buckets::new());
    let checkpoints = MemoryCheckpointStore::with(pending.clone());
    let store = MemoryCountsStore::new();
    let service =
        crate::integration::common::service(standard_transport(), store.clone(), checkpoints.clone());
    let state = SyncStateHandle::new();

    let request = service
        .build_request(RunType::Quick, None, false, today())
        .unwrap();
    let guard = state.try_begin(RunType::Quick, "quick").unwrap();
    let report = service
        .run(guard, request, &SilentReporter, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.run_type, RunType::Quick);
    assert_eq!(checkpoints.stored(), Some(pending));
    assert!(checkpoints.saved_indices().is_empty());
    assert!(store.sync_time(SyncMetadataKey::LastQuickSync).is_some());
    assert!(store.sync_time(SyncMetadataKey::LastFullSync).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_seed_categories_uses_mapping() {
    let store = MemoryCountsStore::new();
    let service = crate::integration::common::service(
        MockTransport::new(),
        store.clone(),
        MemoryCheckpointStore::new(),
    );

    service.seed_categories().await.unwrap();

    let categories = store.categories.lock().unwrap().clone();
    let ids: Vec<_> = categories.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["cs", "stat", "math", "cs.AI", "cs.LG", "stat.ML", "math.OC"]
    );
}
