//! Integration tests for cancelling sync runs.

use std::time::Duration;

use pubtrend_core::{
    RunType, SilentReporter, SyncMetadataKey, SyncRequest, SyncStateHandle, SyncStatus,
};
use tokio_util::sync::CancellationToken;

use crate::integration::common::{
    MemoryCheckpointStore, MemoryCountsStore, MockTransport, header, page, service, today,
};

fn transport() -> MockTransport {
    MockTransport::new()
        .script(
            "cs",
            vec![Ok(page(
                vec![header("oai:arXiv.org:2401.12345", &["cs:cs:AI"])],
                None,
            ))],
        )
        .script(
            "stat",
            vec![
                Ok(page(
                    vec![header("oai:arXiv.org:2402.00001", &["stat:stat:ML"])],
                    Some("stat-1"),
                )),
                Ok(page(
                    vec![header("oai:arXiv.org:2402.00002", &["stat:stat:ML"])],
                    None,
                )),
            ],
        )
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start_makes_no_requests() {
    // Arrange
    let transport = transport();
    let store = MemoryCountsStore::new();
    let service = service(transport.clone(), store.clone(), MemoryCheckpointStore::new());
    let state = SyncStateHandle::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    // Act
    let guard = state.try_begin(RunType::Full, "test").unwrap();
    let report = service
        .run(
            guard,
            SyncRequest::full(2024, today(), false).unwrap(),
            &SilentReporter,
            cancel,
        )
        .await
        .unwrap();

    // Assert
    assert_eq!(report.status, SyncStatus::Cancelled);
    assert!(report.is_cancelled());
    assert_eq!(report.sets_completed, 0);
    assert!(transport.seen().is_empty());
    assert_eq!(store.upsert_call_count(), 0);
    assert!(!state.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_listing_keeps_checkpoint_and_writes_nothing() {
    // cancelled by the first stat page, so the rate-limit wait before
    // the second stat page is interrupted
    let cancel = CancellationToken::new();
    let transport = transport().cancel_on("stat", cancel.clone());
    let store = MemoryCountsStore::new();
    let checkpoints = MemoryCheckpointStore::new();
    let service = service(transport.clone(), store.clone(), checkpoints.clone());
    let state = SyncStateHandle::new();

    let guard = state.try_begin(RunType::Full, "test").unwrap();
    let report = service
        .run(
            guard,
            SyncRequest::full(2024, today(), false).unwrap(),
            &SilentReporter,
            cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.status, SyncStatus::Cancelled);
    assert_eq!(report.resume_index, 1);
    assert_eq!(report.sets_completed, 1);
    assert_eq!(transport.request_count("stat"), 1);

    let saved = checkpoints.stored().unwrap();
    assert_eq!(saved.next_set_index, 1);
    assert_eq!(saved.current_set.as_deref(), Some("stat"));

    assert!(store.rows().is_empty());
    assert_eq!(store.upsert_call_count(), 0);
    assert!(store.sync_time(SyncMetadataKey::LastSync).is_none());

    let snapshot = state.snapshot();
    assert!(!snapshot.running);
    assert!(snapshot.message.starts_with("Sync cancelled"));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_returns_promptly() {
    let cancel = CancellationToken::new();
    let transport = MockTransport::new().script(
        "cs",
        vec![Err(pubtrend_core::AppError::Timeout(120))],
    );
    let service = service(
        transport.clone(),
        MemoryCountsStore::new(),
        MemoryCheckpointStore::new(),
    );
    let state = SyncStateHandle::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let started = tokio::time::Instant::now();
    let guard = state.try_begin(RunType::Full, "test").unwrap();
    let report = service
        .run(
            guard,
            SyncRequest::full(2024, today(), false).unwrap(),
            &SilentReporter,
            cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.status, SyncStatus::Cancelled);
    assert_eq!(transport.request_count("cs"), 1);
    // the 1s backoff was cut short
    assert!(started.elapsed() < Duration::from_secs(1));
}
