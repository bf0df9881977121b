//! Durable offline write queue.
//!
//! Writes that could not reach the server are stored as [`QueuedWrite`]
//! records and replayed later by [`QueueDrainer`](drain::QueueDrainer).
//!
//! # Module Organization
//!
//! - [`backend`] - [`StorageBackend`](backend::StorageBackend) KV trait and errors
//! - [`memory`] - in-memory backend
//! - [`file`] - crash-durable file-per-record backend
//! - [`drain`] - replay on connectivity restore
//!
//! # Ordering
//!
//! Backends return records in unspecified order. Replay order is
//! reconstructed from [`QueuedWrite::enqueued_at`] (ties broken by id);
//! [`QueueStore::sorted`] does this for callers.

pub mod backend;
pub mod drain;
pub mod file;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::WriteMethod;
use backend::StorageBackend;

/// One write operation that could not be delivered synchronously.
///
/// Records are immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedWrite {
    /// Unique id, also the storage key.
    pub id: String,
    /// Write verb; a read can never be queued.
    pub method: WriteMethod,
    /// Logical resource path, opaque to the queue.
    pub path: String,
    /// Serialized JSON payload, `None` for body-less requests.
    pub body: Option<String>,
    /// Replay order key.
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedWrite {
    /// Sort records into replay order.
    pub fn sort_for_replay(records: &mut [QueuedWrite]) {
        records.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

impl fmt::Display for QueuedWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({})",
            self.enqueued_at.to_rfc3339(),
            self.method,
            self.path,
            self.id
        )
    }
}

/// Persistent store of pending writes.
///
/// Thin domain layer over a [`StorageBackend`]: assigns ids and timestamps,
/// serializes records, and maps storage failures onto crate errors.
#[derive(Clone)]
pub struct QueueStore {
    backend: Arc<dyn StorageBackend>,
    last_stamp: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl fmt::Debug for QueueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueStore")
            .field("last_stamp", &*self.last_stamp.lock())
            .finish()
    }
}

impl QueueStore {
    /// Wrap a storage backend.
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Wrap a shared storage backend.
    pub fn from_arc(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            last_stamp: Arc::new(Mutex::new(None)),
        }
    }

    /// Strictly increasing timestamp within this process.
    fn next_stamp(&self) -> DateTime<Utc> {
        let mut last = self.last_stamp.lock();
        let now = Utc::now();
        let stamp = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }

    /// Append a new record with a fresh id and the current timestamp.
    ///
    /// The record is durable once this returns `Ok`.
    ///
    /// # Errors
    ///
    /// [`Error::QueuePersistence`] if the backend refused the write. The
    /// caller's write is lost in that case and must not be reported as queued.
    pub async fn enqueue(
        &self,
        method: WriteMethod,
        path: impl Into<String>,
        body: Option<String>,
    ) -> Result<QueuedWrite> {
        let record = QueuedWrite {
            id: uuid::Uuid::new_v4().to_string(),
            method,
            path: path.into(),
            body,
            enqueued_at: self.next_stamp(),
        };
        let data = serde_json::to_vec(&record)?;

        self.backend
            .put(&record.id, &data)
            .await
            .map_err(|e| Error::queue_persistence(e.to_string()))?;

        tracing::info!(
            id = %record.id,
            method = %record.method,
            path = %record.path,
            "Queued write for later delivery"
        );
        Ok(record)
    }

    /// Every stored record, in unspecified order.
    ///
    /// Records that fail to decode are skipped with a warning rather than
    /// blocking the rest of the queue.
    pub async fn list_all(&self) -> Result<Vec<QueuedWrite>> {
        let raw = self.backend.list().await?;
        let mut records = Vec::with_capacity(raw.len());
        for (key, data) in raw {
            match serde_json::from_slice::<QueuedWrite>(&data) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(key = %key, error = %e, "Skipping unreadable queue record"),
            }
        }
        Ok(records)
    }

    /// Every stored record in replay order.
    pub async fn sorted(&self) -> Result<Vec<QueuedWrite>> {
        let mut records = self.list_all().await?;
        QueuedWrite::sort_for_replay(&mut records);
        Ok(records)
    }

    /// Delete one record. Removing an absent id is not an error.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let existed = self.backend.delete(id).await?;
        if !existed {
            tracing::debug!(id = %id, "Queue record already absent");
        }
        Ok(())
    }

    /// Number of pending records.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.backend.list().await?.len())
    }

    /// Whether nothing is pending.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
