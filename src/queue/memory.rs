//! In-memory storage backend.
//!
//! [`InMemoryBackend`] is a thread-safe [`StorageBackend`] for tests and for
//! hosts that accept losing queued writes on restart. It can be switched to
//! an unavailable state to exercise the "queue persistence failed" path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::backend::{StorageBackend, StorageError};

/// Thread-safe in-memory storage backend.
///
/// # Examples
///
/// ```
/// use fintrack_client::queue::memory::InMemoryBackend;
/// use fintrack_client::queue::QueueStore;
///
/// let store = QueueStore::new(InMemoryBackend::new());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a disabled storage engine: every operation fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                message: "in-memory store disabled".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.check()?;
        self.data.write().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.check()?;
        Ok(self.data.write().remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        self.check()?;
        Ok(self
            .data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
