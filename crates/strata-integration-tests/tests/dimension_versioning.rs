//! SCD2 versioning behavior through the storage-backed dimension store.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use strata_dims::{CardType, DimensionStore, EmploymentStatus};
use strata_integration_tests::{customer, day, initialized_warehouse};

#[tokio::test]
async fn tracked_change_closes_and_reopens_the_version() {
    let storage = initialized_warehouse().await;
    let store = DimensionStore::new(storage);

    let opened = day(2021, 1, 4);
    store
        .run_batch(vec![customer("CUST00000001", 1, opened)])
        .await
        .unwrap();

    // Card tier changes effective 2024-06-15.
    let mut upgraded = customer("CUST00000001", 2, opened);
    upgraded.card_type = CardType::Premium;
    upgraded.effective_date = day(2024, 6, 15);
    let summary = store.run_batch(vec![upgraded]).await.unwrap();
    assert_eq!(summary.new_versions, 1);

    let (table, _) = store.load_customers().await.unwrap();
    let history = table.history("CUST00000001");
    assert_eq!(history.len(), 2);

    let closed = history[0];
    assert_eq!(closed.card_type, CardType::Standard);
    assert_eq!(closed.valid_from, opened);
    assert_eq!(closed.valid_to, Some(day(2024, 6, 14)));
    assert!(!closed.is_current);

    let open = history[1];
    assert_eq!(open.card_type, CardType::Premium);
    assert_eq!(open.valid_from, day(2024, 6, 15));
    assert_eq!(open.valid_to, None);
    assert!(open.is_current);

    table.check_invariants().unwrap();
}

#[tokio::test]
async fn passthrough_churn_never_versions() {
    let storage = initialized_warehouse().await;
    let store = DimensionStore::new(storage);

    let opened = day(2022, 3, 1);
    store
        .run_batch(vec![customer("CUST00000001", 1, opened)])
        .await
        .unwrap();

    let mut moved = customer("CUST00000001", 2, opened);
    moved.state = "AZ".into();
    moved.email = "ruth.okafor@newmail.example.com".into();
    moved.employment_status = EmploymentStatus::SelfEmployed;
    moved.effective_date = day(2024, 6, 15);
    let summary = store.run_batch(vec![moved]).await.unwrap();
    assert_eq!(summary.new_versions, 0);
    assert_eq!(summary.passthrough_updates, 1);

    let (table, _) = store.load_customers().await.unwrap();
    assert_eq!(table.len(), 1);
    let current = table.current_of("CUST00000001").unwrap();
    assert_eq!(current.state, "AZ");
    assert_eq!(current.valid_from, opened);
}

#[tokio::test]
async fn duplicate_key_in_batch_resolves_by_sequence() {
    let storage = initialized_warehouse().await;
    let store = DimensionStore::new(storage);

    let opened = day(2022, 3, 1);
    store
        .run_batch(vec![customer("CUST00000001", 1, opened)])
        .await
        .unwrap();

    // Same customer twice, deliberately out of arrival order: the higher
    // sequence must win regardless.
    let mut second = customer("CUST00000001", 12, opened);
    second.credit_limit = 40_000;
    second.effective_date = day(2024, 6, 20);
    let mut first = customer("CUST00000001", 11, opened);
    first.credit_limit = 25_000;
    first.effective_date = day(2024, 6, 15);

    let summary = store.run_batch(vec![second, first]).await.unwrap();
    assert_eq!(summary.new_versions, 2);

    let (table, _) = store.load_customers().await.unwrap();
    let current = table.current_of("CUST00000001").unwrap();
    assert_eq!(current.credit_limit, 40_000);
    assert_eq!(current.valid_from, day(2024, 6, 20));
    table.check_invariants().unwrap();
}

#[tokio::test]
async fn per_record_rejects_do_not_abort_the_batch() {
    let storage = initialized_warehouse().await;
    let store = DimensionStore::new(storage);

    store
        .run_batch(vec![customer("CUST00000001", 1, day(2023, 2, 1))])
        .await
        .unwrap();

    // One malformed key, one out-of-order update, one valid bootstrap.
    let malformed = customer("CUST-BADKEY", 2, day(2023, 2, 1));
    let mut stale = customer("CUST00000001", 3, day(2023, 2, 1));
    stale.card_type = CardType::Premium;
    stale.effective_date = day(2022, 12, 1);
    let fresh = customer("CUST00000002", 4, day(2023, 5, 1));

    let summary = store.run_batch(vec![malformed, stale, fresh]).await.unwrap();
    assert_eq!(summary.rows_processed, 3);
    assert_eq!(summary.bootstraps, 1);
    assert_eq!(summary.rejected_invalid_key, 1);
    assert_eq!(summary.rejected_out_of_order, 1);

    let (table, _) = store.load_customers().await.unwrap();
    assert_eq!(table.customer_count(), 2);
    // The rejected update left the existing chain untouched.
    assert_eq!(
        table.current_of("CUST00000001").unwrap().card_type,
        CardType::Standard
    );
    table.check_invariants().unwrap();
}

#[tokio::test]
async fn full_refresh_bootstraps_everything_once() {
    let storage = initialized_warehouse().await;
    let store = DimensionStore::new(storage);

    let summary = store
        .run_full_refresh(vec![
            customer("CUST00000001", 1, day(2021, 1, 4)),
            customer("CUST00000002", 2, day(2022, 9, 12)),
            customer("CUST00000003", 3, day(2023, 4, 30)),
        ])
        .await
        .unwrap();
    assert_eq!(summary.bootstraps, 3);

    let (table, _) = store.load_customers().await.unwrap();
    assert_eq!(table.len(), 3);
    for version in table.versions() {
        assert!(version.is_current);
        assert_eq!(version.valid_from, version.account_open_date);
        assert_eq!(version.valid_to, None);
    }

    // Full refresh is bootstrap-only; a second one must refuse.
    let err = store
        .run_full_refresh(vec![customer("CUST00000004", 1, day(2024, 1, 1))])
        .await
        .unwrap_err();
    assert!(matches!(err, strata_dims::DimensionError::NotEmpty { .. }));
}
