//! The full pipeline: versioning, ingestion, then segmentation.
//!
//! One seeded history, anchored at as-of 2024-07-01 with the default
//! 90-day window: trailing [2024-04-02, 2024-07-01), prior
//! [2024-01-03, 2024-04-02).

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use strata_core::{canonical_json_bytes, MemoryBackend, StorageBackend};
use strata_dims::DimensionStore;
use strata_ingest::{IngestionEngine, LinkMode, StagedFact, WatermarkStart};
use strata_integration_tests::{customer, day, initialized_warehouse, staged_fact};
use strata_segment::{SegmentLabel, SegmentationEngine};

/// Seeds one customer per segment rule, a zero-baseline customer, and a
/// customer with no facts at all.
async fn seeded_pipeline() -> Arc<MemoryBackend> {
    let storage = initialized_warehouse().await;

    DimensionStore::new(storage.clone())
        .run_full_refresh(vec![
            customer("CUST00000001", 1, day(2022, 1, 10)), // high-value traveler
            customer("CUST00000002", 2, day(2022, 1, 10)), // declining
            customer("CUST00000003", 3, day(2024, 2, 1)),  // new & growing
            customer("CUST00000004", 4, day(2021, 6, 1)),  // budget-conscious
            customer("CUST00000005", 5, day(2021, 6, 1)),  // stable
            customer("CUST00000006", 6, day(2021, 6, 1)),  // no prior baseline
            customer("CUST00000007", 7, day(2021, 6, 1)),  // no facts
        ])
        .await
        .unwrap();

    let source: Vec<StagedFact> = vec![
        // High magnitude, half of it travel.
        staged_fact("t01", "CUST00000001", day(2024, 5, 15), 9_000.0, "airlines"),
        staged_fact("t02", "CUST00000001", day(2024, 6, 10), 9_000.0, "retail"),
        // 10k prior shrinking to 6k trailing: a -40% trend.
        staged_fact("t03", "CUST00000002", day(2024, 2, 10), 10_000.0, "groceries"),
        staged_fact("t04", "CUST00000002", day(2024, 5, 10), 6_000.0, "groceries"),
        // Five months of tenure, spend doubling.
        staged_fact("t05", "CUST00000003", day(2024, 3, 1), 1_000.0, "restaurants"),
        staged_fact("t06", "CUST00000003", day(2024, 6, 1), 2_000.0, "restaurants"),
        // Small, necessity-concentrated.
        staged_fact("t07", "CUST00000004", day(2024, 3, 5), 1_000.0, "groceries"),
        staged_fact("t08", "CUST00000004", day(2024, 5, 3), 800.0, "groceries"),
        staged_fact("t09", "CUST00000004", day(2024, 6, 20), 400.0, "utilities"),
        // Flat retail spend.
        staged_fact("t10", "CUST00000005", day(2024, 2, 20), 2_900.0, "retail"),
        staged_fact("t11", "CUST00000005", day(2024, 5, 20), 3_000.0, "retail"),
        // Trailing only: no baseline to trend against.
        staged_fact("t12", "CUST00000006", day(2024, 6, 15), 9_000.0, "retail"),
    ];
    IngestionEngine::new(storage.clone())
        .run(source, LinkMode::PointInTime, WatermarkStart::Beginning)
        .await
        .unwrap();

    storage
}

fn label_of(snapshot: &strata_segment::SegmentSnapshot, customer_id: &str) -> SegmentLabel {
    snapshot
        .assignments
        .iter()
        .find(|a| a.activity.customer_id == customer_id)
        .unwrap_or_else(|| panic!("no assignment for {customer_id}"))
        .segment
}

#[tokio::test]
async fn every_rule_fires_for_its_customer() {
    let storage = seeded_pipeline().await;
    let engine = SegmentationEngine::new(storage);

    let summary = engine.run(day(2024, 7, 1)).await.unwrap();
    assert_eq!(summary.customers_scored, 6);
    assert_eq!(summary.facts_scanned, 12);

    let snapshot = engine.load_current().await.unwrap().unwrap();
    assert_eq!(label_of(&snapshot, "CUST00000001"), SegmentLabel::HighValueTravelers);
    assert_eq!(label_of(&snapshot, "CUST00000002"), SegmentLabel::Declining);
    assert_eq!(label_of(&snapshot, "CUST00000003"), SegmentLabel::NewAndGrowing);
    assert_eq!(label_of(&snapshot, "CUST00000004"), SegmentLabel::BudgetConscious);
    assert_eq!(label_of(&snapshot, "CUST00000005"), SegmentLabel::StableMidSpenders);

    assert_eq!(summary.distribution[&SegmentLabel::StableMidSpenders], 2);
    assert_eq!(summary.distribution.values().sum::<usize>(), 6);
}

#[tokio::test]
async fn missing_baseline_routes_past_trend_rules() {
    let storage = seeded_pipeline().await;
    let engine = SegmentationEngine::new(storage);
    engine.run(day(2024, 7, 1)).await.unwrap();

    let snapshot = engine.load_current().await.unwrap().unwrap();
    let boundary = snapshot
        .assignments
        .iter()
        .find(|a| a.activity.customer_id == "CUST00000006")
        .unwrap();

    assert!((boundary.activity.prior_spend).abs() < f64::EPSILON);
    assert_eq!(boundary.activity.trend_pct, None);
    // A 100%-drop-shaped profile without a baseline is not "declining".
    assert_eq!(boundary.segment, SegmentLabel::StableMidSpenders);
}

#[tokio::test]
async fn customer_without_facts_is_absent_not_defaulted() {
    let storage = seeded_pipeline().await;
    let engine = SegmentationEngine::new(storage);
    engine.run(day(2024, 7, 1)).await.unwrap();

    let snapshot = engine.load_current().await.unwrap().unwrap();
    assert!(snapshot
        .assignments
        .iter()
        .all(|a| a.activity.customer_id != "CUST00000007"));
}

#[tokio::test]
async fn republish_with_same_as_of_is_byte_identical() {
    let storage = seeded_pipeline().await;
    let engine = SegmentationEngine::new(storage);

    engine.run(day(2024, 7, 1)).await.unwrap();
    let first = engine.load_current().await.unwrap().unwrap();
    engine.run(day(2024, 7, 1)).await.unwrap();
    let second = engine.load_current().await.unwrap().unwrap();

    assert_eq!(
        canonical_json_bytes(&first.assignments).unwrap(),
        canonical_json_bytes(&second.assignments).unwrap()
    );
}

#[tokio::test]
async fn pointer_always_resolves_to_a_complete_relation() {
    let storage = seeded_pipeline().await;
    let engine = SegmentationEngine::new(storage.clone());

    let july = engine.run(day(2024, 7, 1)).await.unwrap();
    let august = engine.run(day(2024, 8, 1)).await.unwrap();

    // The pointer follows the newest run; superseded snapshots stay on
    // disk unchanged.
    let (pointer, _) = engine.load_pointer().await.unwrap().unwrap();
    assert_eq!(pointer.run_id, august.run_id);

    let current = engine.load_current().await.unwrap().unwrap();
    assert_eq!(current.as_of, day(2024, 8, 1));
    assert_eq!(current.assignments.len(), august.customers_scored);

    let runs = storage.list("segments/runs/").await.unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs
        .iter()
        .any(|m| m.path == format!("segments/runs/{}.json", july.run_id)));
}
