//! The segmentation engine.
//!
//! One run: scan the fact history, aggregate per-customer windows, assign
//! labels through the decision list, and publish. Publication is a two
//! step swap: the full assignment relation is written as an immutable run
//! object, then the pointer document is CAS-swapped to reference it.
//! Readers follow the pointer, so they see either the previous relation or
//! the new one, never a mix - and a failed run leaves the previous
//! snapshot published.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};

use strata_core::storage::{StorageBackend, WritePrecondition, WriteResult};
use strata_core::{canonical_json_bytes, observability, RunId, WarehousePaths};
use strata_dims::DimensionStore;
use strata_ingest::FactStore;

use crate::activity::{compute_activities, CustomerActivity};
use crate::config::SegmentationConfig;
use crate::error::{Result, SegmentationError};
use crate::metrics::{record_run, record_scored};
use crate::rules::{assign, decision_list, SegmentLabel};
use crate::window::RollingWindow;

/// One labeled customer in the published relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentAssignment {
    /// The window aggregates the label was derived from.
    #[serde(flatten)]
    pub activity: CustomerActivity,
    /// The assigned label.
    pub segment: SegmentLabel,
}

/// The full assignment relation for one run. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSnapshot {
    /// The run that produced this snapshot.
    pub run_id: RunId,
    /// The as-of date the windows were anchored to.
    pub as_of: NaiveDate,
    /// Window length the run used.
    pub window_days: i64,
    /// When the snapshot was generated.
    pub generated_at: DateTime<Utc>,
    /// One assignment per customer with at least one fact, ordered by
    /// customer ID.
    pub assignments: Vec<SegmentAssignment>,
}

/// The pointer document readers follow to the published snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPointer {
    /// The published run.
    pub run_id: RunId,
    /// As-of date of the published snapshot.
    pub as_of: NaiveDate,
    /// Object path of the published snapshot.
    pub snapshot_path: String,
    /// When the pointer was swapped.
    pub published_at: DateTime<Utc>,
}

/// Machine-readable outcome of one segmentation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationSummary {
    /// The run that produced this summary.
    pub run_id: RunId,
    /// As-of date the run was anchored to.
    pub as_of: NaiveDate,
    /// Fact rows scanned.
    pub facts_scanned: usize,
    /// Customers scored (one label each).
    pub customers_scored: usize,
    /// Label distribution over the scored customers.
    pub distribution: BTreeMap<SegmentLabel, usize>,
    /// Object path of the published snapshot.
    pub snapshot_path: String,
}

/// The rolling-window segmentation engine.
pub struct SegmentationEngine {
    storage: Arc<dyn StorageBackend>,
    paths: WarehousePaths,
    config: SegmentationConfig,
}

impl SegmentationEngine {
    /// Creates an engine over the given backend with default thresholds.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            paths: WarehousePaths::new(),
            config: SegmentationConfig::default(),
        }
    }

    /// Overrides the segmentation configuration.
    #[must_use]
    pub fn with_config(mut self, config: SegmentationConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs one segmentation pass anchored at `as_of`.
    ///
    /// The whole output relation is recomputed and replaced; running twice
    /// with identical inputs and the same `as_of` publishes an identical
    /// relation.
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid configuration, storage failure, or a
    /// pointer swap lost to a concurrent publish. On failure the
    /// previously published snapshot stays in place.
    pub async fn run(&self, as_of: NaiveDate) -> Result<SegmentationSummary> {
        self.config.validate()?;
        let run_id = RunId::generate();
        let span = observability::segment_span("run", &run_id.to_string());

        async {
            let outcome = self.run_inner(run_id, as_of).await;
            match &outcome {
                Ok(summary) => {
                    record_run("success");
                    info!(
                        customers = summary.customers_scored,
                        facts = summary.facts_scanned,
                        snapshot = %summary.snapshot_path,
                        "segmentation run published"
                    );
                }
                Err(e) => {
                    record_run("failed");
                    tracing::warn!(error = %e, "segmentation run failed");
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_inner(&self, run_id: RunId, as_of: NaiveDate) -> Result<SegmentationSummary> {
        let dims = DimensionStore::new(self.storage.clone());
        let (customers, _) = dims.load_customers().await?;
        let categories = dims.load_categories().await?;

        let facts = FactStore::new(self.storage.clone()).scan_all().await?;
        let window = RollingWindow::new(as_of, self.config.window_days);

        let activities = compute_activities(&facts, &customers, &categories, &window);
        let rules = decision_list(&self.config);

        let mut distribution: BTreeMap<SegmentLabel, usize> = BTreeMap::new();
        let assignments: Vec<SegmentAssignment> = activities
            .into_iter()
            .map(|activity| {
                let segment = assign(&rules, &activity);
                *distribution.entry(segment).or_default() += 1;
                SegmentAssignment { activity, segment }
            })
            .collect();

        let snapshot = SegmentSnapshot {
            run_id,
            as_of,
            window_days: self.config.window_days,
            generated_at: Utc::now(),
            assignments,
        };

        let snapshot_path = self.write_snapshot(&snapshot).await?;
        if let Err(e) = self.swap_pointer(&snapshot, &snapshot_path).await {
            // The orphaned run object is unreachable either way; removing
            // it keeps the runs prefix equal to the publish history.
            let _ = self.storage.delete(&snapshot_path).await;
            return Err(e);
        }

        for (&label, &count) in &distribution {
            record_scored(label, count as u64);
        }

        Ok(SegmentationSummary {
            run_id,
            as_of,
            facts_scanned: facts.len(),
            customers_scored: snapshot.assignments.len(),
            distribution,
            snapshot_path,
        })
    }

    async fn write_snapshot(&self, snapshot: &SegmentSnapshot) -> Result<String> {
        let path = self.paths.segment_run(snapshot.run_id);
        let bytes = canonical_json_bytes(snapshot).map_err(SegmentationError::from)?;

        match self
            .storage
            .put(&path, Bytes::from(bytes), WritePrecondition::DoesNotExist)
            .await
            .map_err(SegmentationError::from)?
        {
            WriteResult::Success { .. } => Ok(path),
            WriteResult::PreconditionFailed { .. } => Err(SegmentationError::PublishConflict {
                message: format!("snapshot object {path} already exists"),
            }),
        }
    }

    async fn swap_pointer(&self, snapshot: &SegmentSnapshot, snapshot_path: &str) -> Result<()> {
        let path = self.paths.segment_pointer();
        let precondition = match self.load_pointer().await? {
            Some((_, token)) => WritePrecondition::MatchesVersion(token),
            None => WritePrecondition::DoesNotExist,
        };

        let pointer = SegmentPointer {
            run_id: snapshot.run_id,
            as_of: snapshot.as_of,
            snapshot_path: snapshot_path.to_string(),
            published_at: Utc::now(),
        };
        let bytes = canonical_json_bytes(&pointer).map_err(SegmentationError::from)?;

        match self
            .storage
            .put(&path, Bytes::from(bytes), precondition)
            .await
            .map_err(SegmentationError::from)?
        {
            WriteResult::Success { .. } => Ok(()),
            WriteResult::PreconditionFailed { current_version } => {
                Err(SegmentationError::PublishConflict {
                    message: format!(
                        "segment pointer advanced to version {current_version} during the run"
                    ),
                })
            }
        }
    }

    /// Loads the pointer document and its CAS token, if published.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or
    /// parsed.
    pub async fn load_pointer(&self) -> Result<Option<(SegmentPointer, String)>> {
        let path = self.paths.segment_pointer();
        match self.storage.get(&path).await {
            Ok(data) => {
                let pointer: SegmentPointer =
                    serde_json::from_slice(&data).map_err(|e| SegmentationError::Serialization {
                        message: format!("parse {path}: {e}"),
                    })?;
                let meta = self
                    .storage
                    .head(&path)
                    .await
                    .map_err(SegmentationError::from)?;
                let token = meta
                    .map(|m| m.version)
                    .ok_or_else(|| SegmentationError::Storage {
                        message: format!("{path} disappeared during load"),
                    })?;
                Ok(Some((pointer, token)))
            }
            Err(strata_core::Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads the currently published snapshot, if any.
    ///
    /// This is the reader path: follow the pointer, read the run object it
    /// references.
    ///
    /// # Errors
    ///
    /// Returns an error if the pointer or the snapshot it references
    /// cannot be read or parsed.
    pub async fn load_current(&self) -> Result<Option<SegmentSnapshot>> {
        let Some((pointer, _)) = self.load_pointer().await? else {
            return Ok(None);
        };

        let data = self
            .storage
            .get(&pointer.snapshot_path)
            .await
            .map_err(SegmentationError::from)?;
        let snapshot: SegmentSnapshot =
            serde_json::from_slice(&data).map_err(|e| SegmentationError::Serialization {
                message: format!("parse {}: {e}", pointer.snapshot_path),
            })?;
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use strata_core::MemoryBackend;
    use strata_dims::{
        CalendarDimension, CardType, CategoryDimension, CustomerRecord, EmploymentStatus,
    };
    use strata_ingest::{
        Channel, IngestionEngine, LinkMode, StagedFact, TransactionStatus, WatermarkStart,
    };

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn customer(customer_id: &str, seq: u64, opened: NaiveDate) -> CustomerRecord {
        CustomerRecord {
            customer_id: customer_id.to_string(),
            sequence: seq,
            effective_date: opened,
            account_open_date: opened,
            card_type: CardType::Standard,
            credit_limit: 15_000,
            first_name: "Iris".into(),
            last_name: "Calloway".into(),
            email: "iris.calloway@example.com".into(),
            age: 34,
            state: "OR".into(),
            employment_status: EmploymentStatus::Employed,
        }
    }

    fn staged(
        txn: &str,
        customer_id: &str,
        event_date: NaiveDate,
        amount: f64,
        category_code: &str,
    ) -> StagedFact {
        StagedFact {
            transaction_id: txn.to_string(),
            customer_id: customer_id.to_string(),
            event_date,
            amount,
            merchant_name: "Meridian".into(),
            category_code: category_code.to_string(),
            channel: Channel::Online,
            status: TransactionStatus::Approved,
            ingested_at: "2024-07-01T06:00:00Z".parse().unwrap(),
        }
    }

    /// Dimension state plus a fact history built for as-of 2024-07-01:
    /// trailing window [2024-04-02, 2024-07-01), prior [2024-01-03,
    /// 2024-04-02).
    async fn seeded_storage() -> Arc<MemoryBackend> {
        let storage: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
        let dims = DimensionStore::new(storage.clone());
        dims.initialize(
            &CalendarDimension::build(day(2021, 1, 1), day(2025, 12, 31)),
            &CategoryDimension::standard(),
        )
        .await
        .unwrap();
        dims.run_batch(vec![
            // Declining: 10k prior, 6k trailing in groceries.
            customer("CUST00000001", 1, day(2022, 3, 1)),
            // High-value traveler: 18k trailing, half of it travel.
            customer("CUST00000002", 2, day(2021, 8, 1)),
            // No facts at all: must be absent from the output.
            customer("CUST00000003", 3, day(2023, 5, 1)),
        ])
        .await
        .unwrap();

        let source = vec![
            staged("t1", "CUST00000001", day(2024, 2, 10), 10_000.0, "groceries"),
            staged("t2", "CUST00000001", day(2024, 5, 10), 6_000.0, "groceries"),
            staged("t3", "CUST00000002", day(2024, 4, 20), 9_000.0, "airlines"),
            staged("t4", "CUST00000002", day(2024, 6, 5), 9_000.0, "retail"),
        ];
        IngestionEngine::new(storage.clone())
            .run(source, LinkMode::PointInTime, WatermarkStart::Beginning)
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn run_scores_and_publishes() {
        let storage = seeded_storage().await;
        let engine = SegmentationEngine::new(storage.clone());

        let summary = engine.run(day(2024, 7, 1)).await.unwrap();
        assert_eq!(summary.customers_scored, 2);
        assert_eq!(summary.facts_scanned, 4);
        assert_eq!(summary.distribution[&SegmentLabel::Declining], 1);
        assert_eq!(summary.distribution[&SegmentLabel::HighValueTravelers], 1);

        let snapshot = engine.load_current().await.unwrap().unwrap();
        assert_eq!(snapshot.run_id, summary.run_id);
        assert_eq!(snapshot.as_of, day(2024, 7, 1));

        let declining = snapshot
            .assignments
            .iter()
            .find(|a| a.activity.customer_id == "CUST00000001")
            .unwrap();
        assert_eq!(declining.segment, SegmentLabel::Declining);
        assert!((declining.activity.trend_pct.unwrap() - -40.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn zero_fact_customer_is_absent() {
        let storage = seeded_storage().await;
        let engine = SegmentationEngine::new(storage.clone());
        engine.run(day(2024, 7, 1)).await.unwrap();

        let snapshot = engine.load_current().await.unwrap().unwrap();
        assert!(snapshot
            .assignments
            .iter()
            .all(|a| a.activity.customer_id != "CUST00000003"));
    }

    #[tokio::test]
    async fn rerun_publishes_identical_relation() {
        let storage = seeded_storage().await;
        let engine = SegmentationEngine::new(storage.clone());

        let first = engine.run(day(2024, 7, 1)).await.unwrap();
        let first_snapshot = engine.load_current().await.unwrap().unwrap();

        let second = engine.run(day(2024, 7, 1)).await.unwrap();
        let second_snapshot = engine.load_current().await.unwrap().unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.distribution, second.distribution);
        assert_eq!(
            canonical_json_bytes(&first_snapshot.assignments).unwrap(),
            canonical_json_bytes(&second_snapshot.assignments).unwrap()
        );
    }

    #[tokio::test]
    async fn pointer_follows_latest_run() {
        let storage = seeded_storage().await;
        let engine = SegmentationEngine::new(storage.clone());

        let first = engine.run(day(2024, 7, 1)).await.unwrap();
        let second = engine.run(day(2024, 8, 1)).await.unwrap();

        let (pointer, _) = engine.load_pointer().await.unwrap().unwrap();
        assert_eq!(pointer.run_id, second.run_id);
        assert_eq!(pointer.as_of, day(2024, 8, 1));

        // Earlier snapshots stay on disk, immutable; only the pointer moved.
        let runs = storage.list("segments/runs/").await.unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs
            .iter()
            .any(|m| m.path == format!("segments/runs/{}.json", first.run_id)));
    }

    #[tokio::test]
    async fn unpublished_store_reads_as_none() {
        let engine = SegmentationEngine::new(Arc::new(MemoryBackend::new()));
        assert!(engine.load_pointer().await.unwrap().is_none());
        assert!(engine.load_current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_fact_store_publishes_empty_relation() {
        let storage: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
        let dims = DimensionStore::new(storage.clone());
        dims.initialize(
            &CalendarDimension::build(day(2024, 1, 1), day(2024, 12, 31)),
            &CategoryDimension::standard(),
        )
        .await
        .unwrap();

        let engine = SegmentationEngine::new(storage);
        let summary = engine.run(day(2024, 7, 1)).await.unwrap();
        assert_eq!(summary.customers_scored, 0);
        assert!(summary.distribution.is_empty());

        let snapshot = engine.load_current().await.unwrap().unwrap();
        assert!(snapshot.assignments.is_empty());
    }

    #[tokio::test]
    async fn window_length_comes_from_config() {
        let storage = seeded_storage().await;
        let mut config = SegmentationConfig::default();
        config.window_days = 30;
        let engine = SegmentationEngine::new(storage).with_config(config);

        // A 30-day window re-slices the same history: the first customer's
        // 6k May spend is now the prior window against an empty trailing
        // window (a full decline), and the traveler's April airline spend
        // drops out entirely, leaving only the June retail purchase.
        let summary = engine.run(day(2024, 7, 1)).await.unwrap();
        assert_eq!(summary.customers_scored, 2);
        assert_eq!(summary.distribution[&SegmentLabel::Declining], 1);
        assert_eq!(summary.distribution[&SegmentLabel::StableMidSpenders], 1);
    }

    #[tokio::test]
    async fn invalid_config_fails_before_touching_storage() {
        let storage: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
        let mut config = SegmentationConfig::default();
        config.window_days = 0;
        let engine = SegmentationEngine::new(storage.clone()).with_config(config);

        let err = engine.run(day(2024, 7, 1)).await.unwrap_err();
        assert!(matches!(err, SegmentationError::InvalidConfig { .. }));
        assert!(storage.list("segments/").await.unwrap().is_empty());
    }
}
