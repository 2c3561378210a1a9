//! Single-writer lock over warehouse storage.
//!
//! Every commit section in strata (dimension snapshot commit, watermark
//! advance) runs under a lock held in the same storage as the data. It
//! uses:
//! - **CAS acquisition**: the lock file is written with a `DoesNotExist`
//!   precondition, so only one writer can create it
//! - **TTL expiry**: a crashed holder's lock is taken over once expired
//! - **Fencing sequence**: each acquisition increments a sequence number so
//!   stale holders are detectable
//! - **Retry with capped backoff** for transient contention
//!
//! # Example
//!
//! ```rust,ignore
//! let lock = StoreLock::new(storage.clone(), paths.ingest_lock());
//! let guard = lock.acquire(Duration::from_secs(30), 5, Some("Ingest".into())).await?;
//! // critical section: read watermark, append facts, commit watermark
//! guard.release().await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::storage::{StorageBackend, WritePrecondition, WriteResult};

/// Default lock TTL (30 seconds).
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Default maximum retry attempts for lock acquisition.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Base backoff duration for retries.
const BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Maximum backoff duration.
const BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Lock file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    /// Unique lock holder ID.
    pub holder_id: String,

    /// When the lock expires.
    pub expires_at: DateTime<Utc>,

    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,

    /// Monotonically increasing sequence number for fencing.
    #[serde(default)]
    pub sequence_number: u64,

    /// Optional description of the operation holding the lock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl LockInfo {
    /// Creates a new lock info with the given holder ID, TTL, and sequence number.
    #[must_use]
    pub fn new(holder_id: impl Into<String>, ttl: Duration, sequence_number: u64) -> Self {
        let now = Utc::now();
        Self {
            holder_id: holder_id.into(),
            expires_at: now
                + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(30)),
            acquired_at: now,
            sequence_number,
            operation: None,
        }
    }

    /// Returns whether this lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

enum AcquireError {
    AlreadyHeld(String),
    Storage(Error),
}

/// A single-writer lock backed by warehouse storage.
pub struct StoreLock<S: StorageBackend + ?Sized> {
    storage: Arc<S>,
    lock_path: String,
    holder_id: String,
}

impl<S: StorageBackend + ?Sized> Clone for StoreLock<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            lock_path: self.lock_path.clone(),
            holder_id: self.holder_id.clone(),
        }
    }
}

impl<S: StorageBackend + ?Sized> StoreLock<S> {
    /// Creates a new lock over the given path.
    ///
    /// Each lock instance gets a unique holder ID for identification.
    #[must_use]
    pub fn new(storage: Arc<S>, lock_path: impl Into<String>) -> Self {
        Self {
            storage,
            lock_path: lock_path.into(),
            holder_id: Ulid::new().to_string(),
        }
    }

    /// Returns the holder ID for this lock instance.
    #[must_use]
    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Attempts to acquire the lock, retrying with capped backoff.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockUnavailable`] if the lock is still held after
    /// all retries, or a storage error.
    pub async fn acquire(
        &self,
        ttl: Duration,
        max_retries: u32,
        operation: Option<String>,
    ) -> Result<LockGuard<S>> {
        let mut attempts = 0;
        let mut backoff = BACKOFF_BASE;

        loop {
            match self.try_acquire(ttl, operation.clone()).await {
                Ok(guard) => return Ok(guard),
                Err(AcquireError::AlreadyHeld(holder)) => {
                    attempts += 1;
                    if attempts >= max_retries {
                        return Err(Error::LockUnavailable {
                            message: format!(
                                "{} held by {holder} after {max_retries} retries",
                                self.lock_path
                            ),
                        });
                    }

                    let jitter = Duration::from_millis(nano_jitter());
                    tokio::time::sleep(backoff.min(BACKOFF_MAX) + jitter).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(AcquireError::Storage(e)) => return Err(e),
            }
        }
    }

    /// Attempts to acquire the lock once (no retries).
    async fn try_acquire(
        &self,
        ttl: Duration,
        operation: Option<String>,
    ) -> std::result::Result<LockGuard<S>, AcquireError> {
        // New locks start at sequence 1.
        let mut info = LockInfo::new(&self.holder_id, ttl, 1);
        info.operation.clone_from(&operation);

        let bytes = encode_lock(&info).map_err(AcquireError::Storage)?;

        match self
            .storage
            .put(&self.lock_path, bytes, WritePrecondition::DoesNotExist)
            .await
            .map_err(AcquireError::Storage)?
        {
            WriteResult::Success { version } => {
                return Ok(LockGuard {
                    storage: self.storage.clone(),
                    lock_path: self.lock_path.clone(),
                    holder_id: self.holder_id.clone(),
                    version,
                    sequence_number: 1,
                    released: false,
                });
            }
            WriteResult::PreconditionFailed { .. } => {}
        }

        // Lock file exists. Bind the expiry decision to the version from
        // HEAD so a takeover between HEAD and GET loses the CAS below.
        let meta = self
            .storage
            .head(&self.lock_path)
            .await
            .map_err(AcquireError::Storage)?;

        let Some(meta) = meta else {
            // Lock disappeared between the create attempt and now.
            return Err(AcquireError::AlreadyHeld("race".into()));
        };

        let existing = self.read_lock().await.map_err(AcquireError::Storage)?;

        match existing {
            Some(info) if info.is_expired() => {
                let sequence = info.sequence_number.saturating_add(1);
                let mut new_info = LockInfo::new(&self.holder_id, ttl, sequence);
                new_info.operation = operation;

                let bytes = encode_lock(&new_info).map_err(AcquireError::Storage)?;

                match self
                    .storage
                    .put(
                        &self.lock_path,
                        bytes,
                        WritePrecondition::MatchesVersion(meta.version),
                    )
                    .await
                    .map_err(AcquireError::Storage)?
                {
                    WriteResult::Success { version } => Ok(LockGuard {
                        storage: self.storage.clone(),
                        lock_path: self.lock_path.clone(),
                        holder_id: self.holder_id.clone(),
                        version,
                        sequence_number: sequence,
                        released: false,
                    }),
                    WriteResult::PreconditionFailed { .. } => {
                        Err(AcquireError::AlreadyHeld("takeover race".into()))
                    }
                }
            }
            Some(info) => Err(AcquireError::AlreadyHeld(info.holder_id)),
            None => Err(AcquireError::AlreadyHeld("race".into())),
        }
    }

    /// Checks if the lock is currently held (regardless of holder).
    ///
    /// # Errors
    ///
    /// Returns an error if the lock state could not be read.
    pub async fn is_locked(&self) -> Result<bool> {
        Ok(self
            .read_lock()
            .await?
            .is_some_and(|info| !info.is_expired()))
    }

    /// Reads the current lock info without acquiring the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock state could not be read.
    pub async fn read_lock_info(&self) -> Result<Option<LockInfo>> {
        self.read_lock().await
    }

    async fn read_lock(&self) -> Result<Option<LockInfo>> {
        match self.storage.get(&self.lock_path).await {
            Ok(data) => {
                let info: LockInfo = serde_json::from_slice(&data).map_err(|e| Error::Internal {
                    message: format!("parse lock: {e}"),
                })?;
                Ok(Some(info))
            }
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn encode_lock(info: &LockInfo) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(info).map_err(|e| {
        Error::Internal {
            message: format!("serialize lock: {e}"),
        }
    })?))
}

fn nano_jitter() -> u64 {
    // Subsecond nanos are jittery enough here; avoids a rand dependency.
    use std::time::SystemTime;
    let seed = u64::from(
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos(),
    );
    seed % 50
}

/// Guard for a held lock.
///
/// Call [`LockGuard::release`] when done; an unreleased guard expires via
/// TTL and the next acquisition takes the lock over.
pub struct LockGuard<S: StorageBackend + ?Sized> {
    storage: Arc<S>,
    lock_path: String,
    holder_id: String,
    version: String,
    sequence_number: u64,
    released: bool,
}

impl<S: StorageBackend + ?Sized> LockGuard<S> {
    /// Returns the holder ID for this lock.
    #[must_use]
    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Returns the fencing sequence number from this acquisition.
    #[must_use]
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Explicitly releases the lock.
    ///
    /// Writes an already-expired lock record via CAS instead of deleting:
    /// if a takeover happened after our last ownership check, the CAS
    /// fails and the new holder's lock is left intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock state could not be read or written.
    pub async fn release(mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }

        let current = match self.storage.get(&self.lock_path).await {
            Ok(data) => serde_json::from_slice::<LockInfo>(&data).ok(),
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        if let Some(info) = current {
            if info.holder_id == self.holder_id {
                let expired = LockInfo {
                    holder_id: self.holder_id.clone(),
                    expires_at: Utc::now() - chrono::Duration::seconds(1),
                    acquired_at: info.acquired_at,
                    sequence_number: info.sequence_number,
                    operation: None,
                };
                let bytes = encode_lock(&expired)?;

                // PreconditionFailed means another holder already took over;
                // leave their lock alone.
                let _ = self
                    .storage
                    .put(
                        &self.lock_path,
                        bytes,
                        WritePrecondition::MatchesVersion(self.version.clone()),
                    )
                    .await?;
            }
        }

        self.released = true;
        Ok(())
    }
}

impl<S: StorageBackend + ?Sized> Drop for LockGuard<S> {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(
                lock = %self.lock_path,
                holder = %self.holder_id,
                "lock guard dropped without release; waiting on TTL expiry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn lock_pair() -> (Arc<MemoryBackend>, StoreLock<MemoryBackend>, StoreLock<MemoryBackend>) {
        let storage = Arc::new(MemoryBackend::new());
        let a = StoreLock::new(storage.clone(), "locks/ingest.lock");
        let b = StoreLock::new(storage.clone(), "locks/ingest.lock");
        (storage, a, b)
    }

    #[tokio::test]
    async fn acquire_and_release() {
        let (_s, lock, _b) = lock_pair();

        let guard = lock
            .acquire(Duration::from_secs(30), 1, Some("Test".into()))
            .await
            .unwrap();
        assert_eq!(guard.sequence_number(), 1);
        assert!(lock.is_locked().await.unwrap());

        guard.release().await.unwrap();
        assert!(!lock.is_locked().await.unwrap());
    }

    #[tokio::test]
    async fn second_holder_is_rejected_while_held() {
        let (_s, a, b) = lock_pair();

        let guard = a
            .acquire(Duration::from_secs(30), 1, None)
            .await
            .unwrap();

        let contended = b.acquire(Duration::from_secs(30), 1, None).await;
        assert!(matches!(contended, Err(Error::LockUnavailable { .. })));

        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn released_lock_can_be_reacquired_with_higher_sequence() {
        let (_s, a, b) = lock_pair();

        let guard = a.acquire(Duration::from_secs(30), 1, None).await.unwrap();
        guard.release().await.unwrap();

        // The release record is expired, so acquisition takes it over.
        let guard = b.acquire(Duration::from_secs(30), 3, None).await.unwrap();
        assert_eq!(guard.sequence_number(), 2);
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn expired_lock_is_taken_over() {
        let (_s, a, b) = lock_pair();

        let guard = a
            .acquire(Duration::from_millis(0), 1, None)
            .await
            .unwrap();
        // Zero TTL: the lock is immediately expired, drop without release.
        drop(guard);

        let guard = b.acquire(Duration::from_secs(30), 3, None).await.unwrap();
        assert_eq!(guard.sequence_number(), 2);
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn lock_info_survives_roundtrip() {
        let (_s, a, _b) = lock_pair();
        let guard = a
            .acquire(Duration::from_secs(30), 1, Some("VersioningRun".into()))
            .await
            .unwrap();

        let info = a.read_lock_info().await.unwrap().unwrap();
        assert_eq!(info.holder_id, guard.holder_id());
        assert_eq!(info.operation.as_deref(), Some("VersioningRun"));

        guard.release().await.unwrap();
    }
}
