//! Local filesystem storage backend.
//!
//! [`FsBackend`] stores each object as a file under a root directory and
//! keeps version counters in a parallel `.versions/` tree. Writes go
//! through a temp file followed by an atomic rename; `DoesNotExist`
//! preconditions map to `O_CREAT | O_EXCL` so concurrent lock acquisition
//! stays correct across processes.
//!
//! Like [`crate::storage::MemoryBackend`], this is a development and
//! single-host backend. `MatchesVersion` checks are serialized per backend
//! instance; cross-process CAS writers must coordinate through
//! [`crate::lock::StoreLock`], which only relies on the atomic
//! `DoesNotExist` path.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::storage::{ObjectMeta, StorageBackend, WritePrecondition, WriteResult};

/// Directory under the root holding version counter files.
const VERSIONS_DIR: &str = ".versions";

/// Filesystem-backed storage rooted at a local directory.
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
    write_gate: Mutex<()>,
}

impl FsBackend {
    /// Creates a backend rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| Error::storage_with_source(format!("create root {}", root.display()), e))?;
        Ok(Self {
            root,
            write_gate: Mutex::new(()),
        })
    }

    /// Returns the root directory of this backend.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn version_path(&self, path: &str) -> PathBuf {
        self.root.join(VERSIONS_DIR).join(path)
    }

    fn read_version(&self, path: &str) -> u64 {
        fs::read_to_string(self.version_path(path))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            // An object written out-of-band (no counter file) counts as v1.
            .unwrap_or(1)
    }

    fn write_version(&self, path: &str, version: u64) -> Result<()> {
        let vpath = self.version_path(path);
        if let Some(parent) = vpath.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::storage_with_source("create version dir", e))?;
        }
        fs::write(&vpath, version.to_string())
            .map_err(|e| Error::storage_with_source("write version counter", e))
    }

    fn exists(&self, path: &str) -> bool {
        self.data_path(path).is_file()
    }

    fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                if path.file_name().is_some_and(|n| n == VERSIONS_DIR) {
                    continue;
                }
                Self::collect_files(&path, out)?;
            } else {
                out.push(path);
            }
        }
        Ok(())
    }

    fn meta_for(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let data_path = self.data_path(path);
        let metadata = match fs::metadata(&data_path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage_with_source("stat object", e)),
        };
        let last_modified = metadata
            .modified()
            .ok()
            .map(DateTime::<Utc>::from);
        Ok(Some(ObjectMeta {
            path: path.to_string(),
            size: metadata.len(),
            version: self.read_version(path).to_string(),
            last_modified,
        }))
    }
}

#[async_trait]
impl StorageBackend for FsBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        match fs::read(self.data_path(path)) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object not found: {path}")))
            }
            Err(e) => Err(Error::storage_with_source(format!("read {path}"), e)),
        }
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let _gate = self.write_gate.lock().map_err(|_| Error::Internal {
            message: "write gate poisoned".into(),
        })?;

        let data_path = self.data_path(path);
        if let Some(parent) = data_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::storage_with_source("create object dir", e))?;
        }

        match precondition {
            WritePrecondition::DoesNotExist => {
                // O_CREAT | O_EXCL gives cross-process atomicity for the
                // lock-file path without needing the write gate.
                let mut file = match fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&data_path)
                {
                    Ok(f) => f,
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                        return Ok(WriteResult::PreconditionFailed {
                            current_version: self.read_version(path).to_string(),
                        });
                    }
                    Err(e) => return Err(Error::storage_with_source(format!("create {path}"), e)),
                };
                file.write_all(&data)
                    .and_then(|()| file.sync_all())
                    .map_err(|e| Error::storage_with_source(format!("write {path}"), e))?;
                self.write_version(path, 1)?;
                return Ok(WriteResult::Success {
                    version: "1".to_string(),
                });
            }
            WritePrecondition::MatchesVersion(ref expected) => {
                if !self.exists(path) {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: "0".to_string(),
                    });
                }
                let current = self.read_version(path);
                if current.to_string() != *expected {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: current.to_string(),
                    });
                }
            }
            WritePrecondition::None => {}
        }

        let new_version = if self.exists(path) {
            self.read_version(path) + 1
        } else {
            1
        };

        let tmp_path = self.root.join(format!("{path}.tmp-{}", Ulid::new()));
        fs::write(&tmp_path, &data)
            .map_err(|e| Error::storage_with_source(format!("write temp for {path}"), e))?;
        fs::rename(&tmp_path, &data_path)
            .map_err(|e| Error::storage_with_source(format!("rename into {path}"), e))?;
        self.write_version(path, new_version)?;

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        for target in [self.data_path(path), self.version_path(path)] {
            match fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::storage_with_source(format!("delete {path}"), e)),
            }
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let mut files = Vec::new();
        match Self::collect_files(&self.root, &mut files) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage_with_source("list objects", e)),
        }

        let mut out = Vec::new();
        for file in files {
            let Ok(rel) = file.strip_prefix(&self.root) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(meta) = self.meta_for(&key)? {
                out.push(meta);
            }
        }
        Ok(out)
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        self.meta_for(path)
    }
}
