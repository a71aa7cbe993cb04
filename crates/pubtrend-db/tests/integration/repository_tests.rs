//! Integration tests for CountsRepository.
//!
//! These tests verify the repository layer against a real SQLite database.
//! Each test gets its own in-memory database.

use chrono::{TimeZone, Utc};
use pubtrend_core::SetMapping;
use pubtrend_core::sync::SyncMetadataKey;

use crate::integration::common::{category, row, setup_test_db};

/// Test 1: Rows are inserted and read back in month order
#[tokio::test]
async fn test_upsert_and_read_counts() {
    let repo = setup_test_db().await;

    let written = repo
        .upsert_counts(&[
            row("cs.AI", 2024, 2, 7),
            row("cs.AI", 2024, 1, 3),
            row("cs.LG", 2024, 1, 11),
        ])
        .await
        .expect("upsert should succeed");
    assert_eq!(written, 3);

    let counts = repo.monthly_counts("cs.AI").await.unwrap();
    assert_eq!(counts, vec![row("cs.AI", 2024, 1, 3), row("cs.AI", 2024, 2, 7)]);
}

/// Test 2: Writing the same key again replaces the count
#[tokio::test]
async fn test_upsert_replaces_existing_count() {
    let repo = setup_test_db().await;

    repo.upsert_counts(&[row("cs.AI", 2024, 1, 3)]).await.unwrap();
    repo.upsert_counts(&[row("cs.AI", 2024, 1, 5)]).await.unwrap();

    let counts = repo.monthly_counts("cs.AI").await.unwrap();
    assert_eq!(counts, vec![row("cs.AI", 2024, 1, 5)]);
    assert_eq!(repo.count_rows().await.unwrap(), 1);
}

/// Test 3: Running the same batch twice leaves the same table
#[tokio::test]
async fn test_upsert_is_idempotent() {
    let repo = setup_test_db().await;
    let batch = vec![row("stat.ML", 2023, 12, 40), row("stat.ML", 2024, 1, 41)];

    repo.upsert_counts(&batch).await.unwrap();
    let first = repo.monthly_counts("stat.ML").await.unwrap();
    repo.upsert_counts(&batch).await.unwrap();
    let second = repo.monthly_counts("stat.ML").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(repo.count_rows().await.unwrap(), 2);
}

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let repo = setup_test_db().await;
    assert_eq!(repo.upsert_counts(&[]).await.unwrap(), 0);
    assert_eq!(repo.count_rows().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_category_has_no_counts() {
    let repo = setup_test_db().await;
    repo.upsert_counts(&[row("cs.AI", 2024, 1, 3)]).await.unwrap();
    assert!(repo.monthly_counts("q-fin.ST").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_time_roundtrip_per_key() {
    let repo = setup_test_db().await;
    let at = Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap();

    assert_eq!(
        repo.last_sync_time(SyncMetadataKey::LastSync).await.unwrap(),
        None
    );

    repo.record_sync_time(SyncMetadataKey::LastSync, at)
        .await
        .unwrap();
    repo.record_sync_time(SyncMetadataKey::LastQuickSync, at)
        .await
        .unwrap();

    assert_eq!(
        repo.last_sync_time(SyncMetadataKey::LastSync).await.unwrap(),
        Some(at)
    );
    assert_eq!(
        repo.last_sync_time(SyncMetadataKey::LastFullSync)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_sync_time_overwritten() {
    let repo = setup_test_db().await;
    let first = Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2024, 3, 16, 6, 0, 0).unwrap();

    repo.record_sync_time(SyncMetadataKey::LastSync, first)
        .await
        .unwrap();
    repo.record_sync_time(SyncMetadataKey::LastSync, second)
        .await
        .unwrap();

    assert_eq!(
        repo.last_sync_time(SyncMetadataKey::LastSync).await.unwrap(),
        Some(second)
    );
}

#[tokio::test]
async fn test_seed_categories_lists_groups_first() {
    let repo = setup_test_db().await;

    repo.seed_categories(&[
        category("stat", "Statistics", None),
        category("cs", "Computer Science", None),
        category("stat.ML", "Machine Learning", Some("stat")),
        category("cs.AI", "Artificial Intelligence", Some("cs")),
    ])
    .await
    .unwrap();

    let listed = repo.list_categories().await.unwrap();
    let ids: Vec<_> = listed.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["cs", "stat", "cs.AI", "stat.ML"]);
    assert_eq!(listed[2].parent_category.as_deref(), Some("cs"));
}

#[tokio::test]
async fn test_seed_categories_is_idempotent() {
    let repo = setup_test_db().await;
    let infos = SetMapping::arxiv().category_infos();

    repo.seed_categories(&infos).await.unwrap();
    repo.seed_categories(&infos).await.unwrap();

    let listed = repo.list_categories().await.unwrap();
    assert_eq!(listed.len(), infos.len());
    assert_eq!(listed.len(), 45);
}

#[tokio::test]
async fn test_migrate_twice_keeps_data() {
    let repo = setup_test_db().await;
    repo.upsert_counts(&[row("cs.AI", 2024, 1, 3)]).await.unwrap();

    repo.migrate().await.expect("second migrate should succeed");

    assert_eq!(repo.count_rows().await.unwrap(), 1);
}

#[tokio::test]
async fn test_health_check() {
    let repo = setup_test_db().await;
    assert!(repo.health_check().await.is_ok());
}
