//! File-backed storage backend.
//!
//! Stores each queued write as its own file in a single directory:
//!
//! ```text
//! offline-queue/
//! ├── 0b6f5c7e-....json
//! └── 9d1e2a40-....json
//! ```
//!
//! Writes go to a temporary file in the same directory, are fsynced, then
//! renamed into place, so a crash leaves either the whole record or nothing.
//! Deletes remove one file. No operation touches more than one record.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::backend::{StorageBackend, StorageError};

const RECORD_EXTENSION: &str = "json";

/// Directory-per-queue, file-per-record backend.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of this backend.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if self.dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::Unavailable {
            message: format!("cannot create queue directory {}: {}", self.dir.display(), e),
            source: Some(Box::new(e)),
        })
    }

    fn record_path(&self, key: &str) -> Option<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.dir.join(format!("{}.{}", key, RECORD_EXTENSION)))
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.record_path(key).ok_or_else(|| StorageError::Backend {
            message: format!("invalid record key: {key:?}"),
            source: None,
        })?;
        self.ensure_dir()?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| {
            StorageError::Unavailable {
                message: format!("cannot write to {}: {}", self.dir.display(), e),
                source: Some(Box::new(e)),
            }
        })?;
        tmp.write_all(data)
            .map_err(|e| StorageError::io("write record", e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StorageError::io("sync record", e))?;
        tmp.persist(&path)
            .map_err(|e| StorageError::io("commit record", e.error))?;

        tracing::trace!(path = %path.display(), "Persisted queue record");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let Some(path) = self.record_path(key) else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io("delete record", e)),
        }
    }

    async fn list(&self) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::Unavailable {
                    message: format!("cannot read {}: {}", self.dir.display(), e),
                    source: Some(Box::new(e)),
                })
            },
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| StorageError::io("read queue directory", e))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let key = key.to_string();
            match fs::read(&path) {
                Ok(data) => records.push((key, data)),
                // Removed by a concurrent drain between read_dir and read.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => return Err(StorageError::io("read record", e)),
            }
        }
        Ok(records)
    }
}
