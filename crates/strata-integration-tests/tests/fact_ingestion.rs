//! Watermark-incremental ingestion against the storage-backed warehouse.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use strata_dims::{CardType, DimensionStore};
use strata_ingest::{
    FactStore, IngestError, IngestionEngine, LinkMode, WatermarkStart, WatermarkStore,
};
use strata_integration_tests::{customer, day, initialized_warehouse, staged_fact};

#[tokio::test]
async fn link_modes_pick_different_versions_across_a_change() {
    let storage = initialized_warehouse().await;
    let dims = DimensionStore::new(storage.clone());

    let opened = day(2021, 1, 4);
    dims.run_batch(vec![customer("CUST00000001", 1, opened)])
        .await
        .unwrap();
    let mut upgraded = customer("CUST00000001", 2, opened);
    upgraded.card_type = CardType::Premium;
    upgraded.effective_date = day(2024, 6, 15);
    dims.run_batch(vec![upgraded]).await.unwrap();

    let engine = IngestionEngine::new(storage.clone());

    // Point-in-time: an event before the change links to the closed
    // version, an event after it to the open one.
    let summary = engine
        .run(
            vec![
                staged_fact("t1", "CUST00000001", day(2024, 6, 1), 50.0, "groceries"),
                staged_fact("t2", "CUST00000001", day(2024, 6, 20), 60.0, "groceries"),
            ],
            LinkMode::PointInTime,
            WatermarkStart::Beginning,
        )
        .await
        .unwrap();
    assert_eq!(summary.appended, 2);

    let (table, _) = dims.load_customers().await.unwrap();
    let old_key = table
        .version_at("CUST00000001", day(2024, 6, 1))
        .unwrap()
        .customer_key;
    let current_key = table.current_of("CUST00000001").unwrap().customer_key;
    assert_ne!(old_key, current_key);

    let rows = FactStore::new(storage.clone()).scan_all().await.unwrap();
    let before = rows.iter().find(|r| r.transaction_id == "t1").unwrap();
    let after = rows.iter().find(|r| r.transaction_id == "t2").unwrap();
    assert_eq!(before.customer_key, old_key);
    assert_eq!(after.customer_key, current_key);

    // Current-state: the same historical event links to the open version.
    let mut replay = staged_fact("t3", "CUST00000001", day(2024, 6, 1), 70.0, "groceries");
    replay.ingested_at = "2024-07-02T06:00:00Z".parse().unwrap();
    engine
        .run(vec![replay], LinkMode::CurrentState, WatermarkStart::Beginning)
        .await
        .unwrap();

    let rows = FactStore::new(storage).scan_all().await.unwrap();
    let latest = rows.iter().find(|r| r.transaction_id == "t3").unwrap();
    assert_eq!(latest.customer_key, current_key);
}

#[tokio::test]
async fn unchanged_watermark_makes_the_rerun_a_noop() {
    let storage = initialized_warehouse().await;
    DimensionStore::new(storage.clone())
        .run_batch(vec![customer("CUST00000001", 1, day(2022, 1, 1))])
        .await
        .unwrap();

    let engine = IngestionEngine::new(storage.clone());
    let source = vec![
        staged_fact("t1", "CUST00000001", day(2024, 6, 10), 42.5, "groceries"),
        staged_fact("t2", "CUST00000001", day(2024, 6, 11), 18.0, "gas"),
    ];

    let first = engine
        .run(source.clone(), LinkMode::PointInTime, WatermarkStart::Beginning)
        .await
        .unwrap();
    assert_eq!(first.appended, 2);

    let second = engine
        .run(source, LinkMode::PointInTime, WatermarkStart::Beginning)
        .await
        .unwrap();
    assert_eq!(second.selected, 0);
    assert_eq!(second.appended, 0);
    assert_eq!(second.watermark, first.watermark);

    assert_eq!(FactStore::new(storage).count().await.unwrap(), 2);
}

#[tokio::test]
async fn deliberate_replay_after_reset_duplicates_rows() {
    let storage = initialized_warehouse().await;
    DimensionStore::new(storage.clone())
        .run_batch(vec![customer("CUST00000001", 1, day(2022, 1, 1))])
        .await
        .unwrap();

    let engine = IngestionEngine::new(storage.clone());
    let source = vec![staged_fact(
        "t1",
        "CUST00000001",
        day(2024, 6, 10),
        42.5,
        "groceries",
    )];

    engine
        .run(source.clone(), LinkMode::PointInTime, WatermarkStart::Beginning)
        .await
        .unwrap();

    // Rolling the watermark back and replaying the same source inserts
    // duplicates; the engine is stateless about prior runs and the caller
    // owns deduplication by transaction ID.
    WatermarkStore::new(storage.clone())
        .reset(WatermarkStart::Beginning)
        .await
        .unwrap();
    engine
        .run(source, LinkMode::PointInTime, WatermarkStart::Beginning)
        .await
        .unwrap();

    let rows = FactStore::new(storage).scan_all().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.transaction_id == "t1"));
}

#[tokio::test]
async fn failed_run_leaves_watermark_and_facts_untouched() {
    let storage = initialized_warehouse().await;
    DimensionStore::new(storage.clone())
        .run_batch(vec![customer("CUST00000001", 1, day(2022, 1, 1))])
        .await
        .unwrap();

    let engine = IngestionEngine::new(storage.clone());
    engine
        .run(
            vec![staged_fact("t1", "CUST00000001", day(2024, 6, 10), 42.5, "groceries")],
            LinkMode::PointInTime,
            WatermarkStart::Beginning,
        )
        .await
        .unwrap();
    let (before, _) = WatermarkStore::new(storage.clone()).load().await.unwrap().unwrap();

    // Half the batch references an absent customer: far above the default
    // 5% threshold, so the run must fail without committing anything.
    let mut good = staged_fact("t2", "CUST00000001", day(2024, 6, 12), 10.0, "groceries");
    good.ingested_at = "2024-07-02T06:00:00Z".parse().unwrap();
    let mut bad = staged_fact("x1", "CUST09999999", day(2024, 6, 12), 10.0, "groceries");
    bad.ingested_at = "2024-07-02T06:00:00Z".parse().unwrap();

    let err = engine
        .run(vec![good, bad], LinkMode::PointInTime, WatermarkStart::Beginning)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::RejectionRateExceeded { .. }));

    let (after, _) = WatermarkStore::new(storage.clone()).load().await.unwrap().unwrap();
    assert_eq!(after.high_water, before.high_water);
    assert_eq!(FactStore::new(storage).count().await.unwrap(), 1);
}
