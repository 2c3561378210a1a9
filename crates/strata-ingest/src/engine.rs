//! The fact ingestion engine.
//!
//! One run: select source records past the watermark, resolve foreign
//! keys, apply the quality gate, append event-date partitions, advance
//! the watermark. The whole sequence executes under the ingest lock, and
//! the watermark advance is CAS-guarded; on any failure after objects
//! were written the run deletes them again, so readers only ever see the
//! output of committed runs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};

use strata_core::lock::{StoreLock, DEFAULT_LOCK_TTL, DEFAULT_MAX_RETRIES};
use strata_core::storage::StorageBackend;
use strata_core::{observability, RunId};
use strata_dims::DimensionStore;

use crate::error::{IngestError, Result};
use crate::fact::{FactRow, StagedFact};
use crate::metrics::{record_appended, record_rejected, record_run};
use crate::resolver::{FactResolver, LinkMode, RejectReason};
use crate::store::FactStore;
use crate::watermark::{Watermark, WatermarkStart, WatermarkStore};

/// Tunable ingestion policy.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Maximum tolerated `rejected / selected` before the run fails.
    ///
    /// Upstream staging should already guarantee FK validity, so the
    /// default tolerates only a small residue; a nonzero rate below the
    /// threshold is a warning, not a failure.
    pub max_rejection_rate: f64,
    /// Lock TTL for the run's critical section.
    pub lock_ttl: Duration,
    /// Lock acquisition retries before giving up.
    pub lock_max_retries: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_rejection_rate: 0.05,
            lock_ttl: DEFAULT_LOCK_TTL,
            lock_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Machine-readable outcome of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    /// The run that produced this summary.
    pub run_id: RunId,
    /// Link mode the run resolved against.
    pub link_mode: LinkMode,
    /// Source records selected by the watermark.
    pub selected: usize,
    /// Fact rows appended.
    pub appended: usize,
    /// Excluded records by reason.
    pub rejected: BTreeMap<RejectReason, usize>,
    /// `rejected / selected`, 0 for an empty selection.
    pub rejection_rate: f64,
    /// True when rows were rejected but the run still succeeded.
    pub warning: bool,
    /// Event-date partitions written.
    pub partitions_written: usize,
    /// Watermark after the run (unchanged for an empty selection).
    pub watermark: Option<DateTime<Utc>>,
}

impl IngestionSummary {
    /// Total excluded records.
    #[must_use]
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// The fact ingestion engine.
pub struct IngestionEngine {
    storage: Arc<dyn StorageBackend>,
    lock: StoreLock<dyn StorageBackend>,
    config: IngestionConfig,
}

impl IngestionEngine {
    /// Creates an engine over the given backend with default policy.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        let paths = strata_core::WarehousePaths::new();
        let lock = StoreLock::new(storage.clone(), paths.ingest_lock());
        Self {
            storage,
            lock,
            config: IngestionConfig::default(),
        }
    }

    /// Overrides the ingestion policy.
    #[must_use]
    pub fn with_config(mut self, config: IngestionConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs one ingestion batch.
    ///
    /// `start` states where ingestion begins when the destination has no
    /// stored watermark; once a watermark exists it always wins. Passing
    /// [`WatermarkStart::Beginning`] on first load is the explicit
    /// "ingest everything" choice.
    ///
    /// # Errors
    ///
    /// Per-record problems are tallied, not errors. The run itself fails
    /// on lock contention, storage failure, a rejection rate above the
    /// configured threshold, a watermark regression, or a lost watermark
    /// CAS - and in every failure case the fact store is left as if the
    /// run never happened.
    pub async fn run(
        &self,
        source: Vec<StagedFact>,
        mode: LinkMode,
        start: WatermarkStart,
    ) -> Result<IngestionSummary> {
        let run_id = RunId::generate();
        let span = observability::ingest_span("run", &run_id.to_string());

        async {
            let guard = self
                .lock
                .acquire(
                    self.config.lock_ttl,
                    self.config.lock_max_retries,
                    Some("FactIngestion".into()),
                )
                .await
                .map_err(IngestError::from)?;

            let outcome = self.run_inner(run_id, source, mode, start).await;

            guard.release().await.map_err(IngestError::from)?;

            match &outcome {
                Ok(summary) => {
                    record_run(if summary.warning { "warning" } else { "success" });
                    info!(
                        selected = summary.selected,
                        appended = summary.appended,
                        rejected = summary.rejected_total(),
                        partitions = summary.partitions_written,
                        "ingestion run committed"
                    );
                }
                Err(e) => {
                    record_run("failed");
                    warn!(error = %e, "ingestion run failed");
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_inner(
        &self,
        run_id: RunId,
        source: Vec<StagedFact>,
        mode: LinkMode,
        start: WatermarkStart,
    ) -> Result<IngestionSummary> {
        let dims = DimensionStore::new(self.storage.clone());
        let (customers, _) = dims.load_customers().await?;
        let categories = dims.load_categories().await?;
        let calendar = dims.load_calendar().await?;

        let watermarks = WatermarkStore::new(self.storage.clone());
        let stored = watermarks.load().await?;
        let cutoff = stored
            .as_ref()
            .map_or_else(|| start.cutoff(), |(wm, _)| wm.high_water);

        let selected: Vec<StagedFact> = source
            .into_iter()
            .filter(|f| f.ingested_at > cutoff)
            .collect();

        if selected.is_empty() {
            // Unchanged watermark, unchanged store: the no-op re-run.
            return Ok(IngestionSummary {
                run_id,
                link_mode: mode,
                selected: 0,
                appended: 0,
                rejected: BTreeMap::new(),
                rejection_rate: 0.0,
                warning: false,
                partitions_written: 0,
                watermark: stored.map(|(wm, _)| wm.high_water),
            });
        }

        let resolver = FactResolver::new(&customers, &categories, &calendar);
        let mut partitions: BTreeMap<chrono::NaiveDate, Vec<FactRow>> = BTreeMap::new();
        let mut rejected: BTreeMap<RejectReason, usize> = BTreeMap::new();
        let mut new_high = cutoff;

        for staged in &selected {
            if staged.ingested_at > new_high {
                new_high = staged.ingested_at;
            }
            match resolver.resolve(staged, mode) {
                Ok(row) => partitions.entry(row.event_date).or_default().push(row),
                Err(reason) => {
                    warn!(
                        transaction_id = %staged.transaction_id,
                        customer_id = %staged.customer_id,
                        reason = reason.as_str(),
                        "excluding fact"
                    );
                    record_rejected(reason);
                    *rejected.entry(reason).or_default() += 1;
                }
            }
        }

        let rejected_total: usize = rejected.values().sum();
        #[allow(clippy::cast_precision_loss)]
        let rejection_rate = rejected_total as f64 / selected.len() as f64;
        if rejection_rate > self.config.max_rejection_rate {
            return Err(IngestError::RejectionRateExceeded {
                rejected: rejected_total,
                selected: selected.len(),
                rate: rejection_rate,
                max_rate: self.config.max_rejection_rate,
            });
        }

        if let Some((wm, _)) = &stored {
            if new_high <= wm.high_water {
                return Err(IngestError::WatermarkRegression {
                    stored: wm.high_water,
                    computed: new_high,
                });
            }
        }

        // Append partitions; on any later failure the written objects are
        // deleted so no uncommitted output survives.
        let facts = FactStore::new(self.storage.clone());
        let mut written = Vec::new();
        let mut appended = 0usize;
        for (event_date, rows) in &partitions {
            match facts.append_partition(*event_date, run_id, rows).await {
                Ok(path) => {
                    written.push(path);
                    appended += rows.len();
                }
                Err(e) => {
                    let _ = facts.delete_objects(&written).await;
                    return Err(e);
                }
            }
        }

        let watermark = Watermark {
            high_water: new_high,
            advanced_at: Utc::now(),
            run_id,
        };
        let token = stored.map(|(_, token)| token);
        if let Err(e) = watermarks.commit(&watermark, token).await {
            let _ = facts.delete_objects(&written).await;
            return Err(e);
        }

        record_appended(appended as u64);

        Ok(IngestionSummary {
            run_id,
            link_mode: mode,
            selected: selected.len(),
            appended,
            rejected,
            rejection_rate,
            warning: rejected_total > 0,
            partitions_written: written.len(),
            watermark: Some(new_high),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::{Channel, TransactionStatus};
    use chrono::NaiveDate;
    use strata_core::MemoryBackend;
    use strata_dims::{
        CalendarDimension, CardType, CategoryDimension, CustomerRecord, EmploymentStatus,
    };

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn customer(customer_id: &str, seq: u64) -> CustomerRecord {
        CustomerRecord {
            customer_id: customer_id.to_string(),
            sequence: seq,
            effective_date: day(2024, 6, 15),
            account_open_date: day(2021, 1, 4),
            card_type: CardType::Standard,
            credit_limit: 12_000,
            first_name: "Ada".into(),
            last_name: "Moreno".into(),
            email: "ada.moreno@example.com".into(),
            age: 41,
            state: "CO".into(),
            employment_status: EmploymentStatus::Employed,
        }
    }

    fn staged(txn: &str, customer_id: &str, ingested: &str) -> StagedFact {
        StagedFact {
            transaction_id: txn.to_string(),
            customer_id: customer_id.to_string(),
            event_date: day(2024, 6, 10),
            amount: 42.5,
            merchant_name: "Cascade Grocers".into(),
            category_code: "groceries".into(),
            channel: Channel::InStore,
            status: TransactionStatus::Approved,
            ingested_at: ingested.parse().unwrap(),
        }
    }

    async fn seeded_storage() -> Arc<MemoryBackend> {
        let storage: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
        let dims = DimensionStore::new(storage.clone());
        dims.initialize(
            &CalendarDimension::build(day(2021, 1, 1), day(2025, 12, 31)),
            &CategoryDimension::standard(),
        )
        .await
        .unwrap();
        dims.run_batch(vec![customer("CUST00000001", 1), customer("CUST00000002", 2)])
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn first_run_appends_and_sets_watermark() {
        let storage = seeded_storage().await;
        let engine = IngestionEngine::new(storage.clone());

        let summary = engine
            .run(
                vec![
                    staged("t1", "CUST00000001", "2024-06-11T01:00:00Z"),
                    staged("t2", "CUST00000002", "2024-06-11T02:00:00Z"),
                ],
                LinkMode::PointInTime,
                WatermarkStart::Beginning,
            )
            .await
            .unwrap();

        assert_eq!(summary.selected, 2);
        assert_eq!(summary.appended, 2);
        assert!(!summary.warning);
        assert_eq!(
            summary.watermark,
            Some("2024-06-11T02:00:00Z".parse().unwrap())
        );

        let facts = FactStore::new(storage);
        assert_eq!(facts.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn second_run_with_unchanged_source_is_noop() {
        let storage = seeded_storage().await;
        let engine = IngestionEngine::new(storage.clone());
        let source = vec![
            staged("t1", "CUST00000001", "2024-06-11T01:00:00Z"),
            staged("t2", "CUST00000002", "2024-06-11T02:00:00Z"),
        ];

        engine
            .run(source.clone(), LinkMode::PointInTime, WatermarkStart::Beginning)
            .await
            .unwrap();
        let second = engine
            .run(source, LinkMode::PointInTime, WatermarkStart::Beginning)
            .await
            .unwrap();

        assert_eq!(second.selected, 0);
        assert_eq!(second.appended, 0);
        assert_eq!(second.partitions_written, 0);

        let facts = FactStore::new(storage);
        assert_eq!(facts.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn small_rejection_rate_warns_but_succeeds() {
        let storage = seeded_storage().await;
        let engine = IngestionEngine::new(storage.clone());

        // 100 records, 3 referencing an absent customer: 3% rejection.
        let mut source = Vec::new();
        for i in 0..97 {
            source.push(staged(
                &format!("t{i}"),
                "CUST00000001",
                "2024-06-11T01:00:00Z",
            ));
        }
        for i in 0..3 {
            source.push(staged(
                &format!("x{i}"),
                "CUST09999999",
                "2024-06-11T01:00:00Z",
            ));
        }

        let summary = engine
            .run(source, LinkMode::PointInTime, WatermarkStart::Beginning)
            .await
            .unwrap();

        assert_eq!(summary.selected, 100);
        assert_eq!(summary.appended, 97);
        assert_eq!(summary.rejected_total(), 3);
        assert!(summary.warning);
        assert!((summary.rejection_rate - 0.03).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn excessive_rejection_rate_fails_without_committing() {
        let storage = seeded_storage().await;
        let engine = IngestionEngine::new(storage.clone());

        let source = vec![
            staged("t1", "CUST00000001", "2024-06-11T01:00:00Z"),
            staged("x1", "CUST09999999", "2024-06-11T01:00:00Z"),
        ];

        let err = engine
            .run(source, LinkMode::PointInTime, WatermarkStart::Beginning)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::RejectionRateExceeded { .. }));

        // Nothing visible changed: no facts, no watermark.
        let facts = FactStore::new(storage.clone());
        assert_eq!(facts.count().await.unwrap(), 0);
        let watermarks = WatermarkStore::new(storage);
        assert!(watermarks.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partitions_are_grouped_by_event_date() {
        let storage = seeded_storage().await;
        let engine = IngestionEngine::new(storage.clone());

        let mut a = staged("t1", "CUST00000001", "2024-06-11T01:00:00Z");
        a.event_date = day(2024, 6, 9);
        let mut b = staged("t2", "CUST00000001", "2024-06-11T01:00:00Z");
        b.event_date = day(2024, 6, 10);
        let mut c = staged("t3", "CUST00000001", "2024-06-11T01:00:00Z");
        c.event_date = day(2024, 6, 10);

        let summary = engine
            .run(vec![a, b, c], LinkMode::PointInTime, WatermarkStart::Beginning)
            .await
            .unwrap();
        assert_eq!(summary.partitions_written, 2);

        let facts = FactStore::new(storage);
        let june_10 = facts
            .scan_range(Some(day(2024, 6, 10)), Some(day(2024, 6, 11)))
            .await
            .unwrap();
        assert_eq!(june_10.len(), 2);
    }

    #[tokio::test]
    async fn explicit_start_skips_older_records() {
        let storage = seeded_storage().await;
        let engine = IngestionEngine::new(storage.clone());

        let summary = engine
            .run(
                vec![
                    staged("t1", "CUST00000001", "2024-06-11T01:00:00Z"),
                    staged("t2", "CUST00000001", "2024-06-12T01:00:00Z"),
                ],
                LinkMode::CurrentState,
                WatermarkStart::At("2024-06-11T12:00:00Z".parse().unwrap()),
            )
            .await
            .unwrap();

        assert_eq!(summary.selected, 1);
        assert_eq!(summary.appended, 1);
    }

    #[tokio::test]
    async fn declined_status_is_still_ingested() {
        // Ingestion stores facts regardless of status; segmentation is
        // what filters to approved spend.
        let storage = seeded_storage().await;
        let engine = IngestionEngine::new(storage.clone());

        let mut declined = staged("t1", "CUST00000001", "2024-06-11T01:00:00Z");
        declined.status = TransactionStatus::Declined;
        let summary = engine
            .run(vec![declined], LinkMode::CurrentState, WatermarkStart::Beginning)
            .await
            .unwrap();
        assert_eq!(summary.appended, 1);
    }
}
