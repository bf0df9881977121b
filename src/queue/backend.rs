//! Low-level key-value storage backend trait for the offline queue.
//!
//! The [`StorageBackend`] trait defines the contract every storage engine
//! implements: [`put`](StorageBackend::put), [`delete`](StorageBackend::delete)
//! and [`list`](StorageBackend::list). Each operation is atomic on its own;
//! the queue never needs multi-record transactions.
//!
//! Domain logic (id assignment, timestamps, serialization, replay order) does
//! **not** belong here. Backends are dumb KV stores keyed by record id; the
//! domain logic lives in [`QueueStore`](crate::queue::QueueStore).

use std::fmt;

use async_trait::async_trait;

/// Errors that can occur during raw storage operations.
///
/// [`QueueStore`](crate::queue::QueueStore) maps these to
/// [`Error`](crate::error::Error) variants before surfacing them to callers.
///
/// # Examples
///
/// ```
/// use fintrack_client::queue::backend::StorageError;
///
/// let err = StorageError::Unavailable { message: "read-only filesystem".to_string(), source: None };
/// assert!(err.to_string().contains("read-only filesystem"));
/// ```
#[derive(Debug)]
pub enum StorageError {
    /// The storage engine cannot be used at all (disabled, missing
    /// directory that cannot be created, permissions).
    Unavailable {
        /// Human-readable description.
        message: String,
        /// The underlying error, if available.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An I/O or backend-specific error on an otherwise usable store.
    Backend {
        /// Human-readable description.
        message: String,
        /// The underlying error, if available.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Build a [`StorageError::Backend`] from an I/O error.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Backend {
            message: format!("{}: {}", message.into(), err),
            source: Some(Box::new(err)),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { message, .. } => write!(f, "storage unavailable: {message}"),
            Self::Backend { message, .. } => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unavailable {
                source: Some(src), ..
            }
            | Self::Backend {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

/// Key-value storage backend for queued writes.
///
/// Keys are record ids. Values are the serialized record bytes produced by
/// [`QueueStore`](crate::queue::QueueStore). Backends must store and return
/// both verbatim.
///
/// # Durability
///
/// A successful [`put`](StorageBackend::put) means the record survives a
/// process restart (for persistent backends). Iteration order of
/// [`list`](StorageBackend::list) is unspecified.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stores a record under `key`, replacing nothing: keys are fresh ids.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Unavailable`] if the store cannot be written at all.
    /// - [`StorageError::Backend`] on I/O failures.
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Deletes a record by key.
    ///
    /// Returns `true` if the key existed, `false` otherwise (idempotent delete).
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Returns every stored `(key, bytes)` pair in unspecified order.
    async fn list(&self) -> Result<Vec<(String, Vec<u8>)>, StorageError>;
}
