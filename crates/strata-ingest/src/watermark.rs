//! The ingestion watermark.
//!
//! The watermark document records the highest ingestion timestamp already
//! committed to the fact store. Runs select only records strictly newer
//! than it, which is what makes re-running with an unchanged source a
//! no-op.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use strata_core::storage::{StorageBackend, WritePrecondition, WriteResult};
use strata_core::{canonical_json_bytes, RunId, WarehousePaths};

use crate::error::{IngestError, Result};

/// The stored watermark document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    /// Highest ingestion timestamp committed so far.
    pub high_water: DateTime<Utc>,
    /// When the watermark was advanced.
    pub advanced_at: DateTime<Utc>,
    /// The run that advanced it.
    pub run_id: RunId,
}

/// Where ingestion starts when the destination has no stored watermark.
///
/// An empty destination does not default to anything: the caller states
/// the starting point explicitly, so "ingest everything" is a documented
/// choice rather than an accident of null comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkStart {
    /// Ingest every record the source has.
    Beginning,
    /// Ingest records with an ingestion timestamp strictly after `0`.
    At(DateTime<Utc>),
}

impl WatermarkStart {
    /// Returns the cutoff timestamp this start represents.
    #[must_use]
    pub fn cutoff(self) -> DateTime<Utc> {
        match self {
            Self::Beginning => DateTime::<Utc>::MIN_UTC,
            Self::At(ts) => ts,
        }
    }
}

/// Load/commit access to the watermark document.
pub struct WatermarkStore {
    storage: Arc<dyn StorageBackend>,
    paths: WarehousePaths,
}

impl WatermarkStore {
    /// Creates a watermark store over the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            paths: WarehousePaths::new(),
        }
    }

    /// Loads the stored watermark and its CAS token, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or
    /// parsed.
    pub async fn load(&self) -> Result<Option<(Watermark, String)>> {
        let path = self.paths.watermark();
        match self.storage.get(&path).await {
            Ok(data) => {
                let watermark: Watermark =
                    serde_json::from_slice(&data).map_err(|e| IngestError::Serialization {
                        message: format!("parse {path}: {e}"),
                    })?;
                let meta = self.storage.head(&path).await.map_err(IngestError::from)?;
                let token = meta
                    .map(|m| m.version)
                    .ok_or_else(|| IngestError::Storage {
                        message: format!("{path} disappeared during load"),
                    })?;
                Ok(Some((watermark, token)))
            }
            Err(strata_core::Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Commits an advanced watermark via CAS.
    ///
    /// `token` is the version loaded with the previous watermark, or
    /// `None` when the document did not exist. A lost race returns
    /// [`IngestError::CommitConflict`]; the caller must treat its appended
    /// output as uncommitted.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure or a lost CAS race.
    pub async fn commit(&self, watermark: &Watermark, token: Option<String>) -> Result<()> {
        let path = self.paths.watermark();
        let bytes = canonical_json_bytes(watermark).map_err(IngestError::from)?;
        let precondition = match token {
            Some(version) => WritePrecondition::MatchesVersion(version),
            None => WritePrecondition::DoesNotExist,
        };

        match self
            .storage
            .put(&path, Bytes::from(bytes), precondition)
            .await
            .map_err(IngestError::from)?
        {
            WriteResult::Success { .. } => Ok(()),
            WriteResult::PreconditionFailed { current_version } => {
                Err(IngestError::CommitConflict {
                    message: format!(
                        "watermark advanced to version {current_version} by a concurrent run"
                    ),
                })
            }
        }
    }

    /// Resets the watermark to an explicit start, unconditionally.
    ///
    /// This is the deliberate-replay path. Re-ingesting a window that was
    /// already committed inserts duplicate fact rows unless the caller
    /// also dedupes by transaction ID - the engine does not guard this.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written or deleted.
    pub async fn reset(&self, start: WatermarkStart) -> Result<()> {
        let path = self.paths.watermark();
        match start {
            WatermarkStart::Beginning => {
                self.storage.delete(&path).await.map_err(IngestError::from)
            }
            WatermarkStart::At(ts) => {
                let watermark = Watermark {
                    high_water: ts,
                    advanced_at: Utc::now(),
                    run_id: RunId::generate(),
                };
                let bytes = canonical_json_bytes(&watermark).map_err(IngestError::from)?;
                match self
                    .storage
                    .put(&path, Bytes::from(bytes), WritePrecondition::None)
                    .await
                    .map_err(IngestError::from)?
                {
                    WriteResult::Success { .. } => Ok(()),
                    WriteResult::PreconditionFailed { current_version } => {
                        Err(IngestError::CommitConflict {
                            message: format!("unconditional reset failed at {current_version}"),
                        })
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::MemoryBackend;

    fn store() -> WatermarkStore {
        WatermarkStore::new(Arc::new(MemoryBackend::new()))
    }

    fn watermark(ts: &str) -> Watermark {
        Watermark {
            high_water: ts.parse().unwrap(),
            advanced_at: Utc::now(),
            run_id: RunId::generate(),
        }
    }

    #[tokio::test]
    async fn absent_watermark_loads_none() {
        let store = store();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_and_reload() {
        let store = store();
        store
            .commit(&watermark("2024-06-16T00:00:00Z"), None)
            .await
            .unwrap();

        let (loaded, token) = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.high_water, "2024-06-16T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(token, "1");
    }

    #[tokio::test]
    async fn stale_token_loses_commit() {
        let store = store();
        store
            .commit(&watermark("2024-06-16T00:00:00Z"), None)
            .await
            .unwrap();
        let (_, token) = store.load().await.unwrap().unwrap();

        store
            .commit(&watermark("2024-06-17T00:00:00Z"), Some(token.clone()))
            .await
            .unwrap();

        // The first token is now stale.
        let err = store
            .commit(&watermark("2024-06-18T00:00:00Z"), Some(token))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::CommitConflict { .. }));
    }

    #[tokio::test]
    async fn reset_to_beginning_deletes_document() {
        let store = store();
        store
            .commit(&watermark("2024-06-16T00:00:00Z"), None)
            .await
            .unwrap();

        store.reset(WatermarkStart::Beginning).await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_to_timestamp_overwrites() {
        let store = store();
        store
            .commit(&watermark("2024-06-16T00:00:00Z"), None)
            .await
            .unwrap();

        store
            .reset(WatermarkStart::At("2024-01-01T00:00:00Z".parse().unwrap()))
            .await
            .unwrap();
        let (loaded, _) = store.load().await.unwrap().unwrap();
        assert_eq!(
            loaded.high_water,
            "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }
}
