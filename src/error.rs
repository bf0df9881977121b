//! Error types for the FinTrack network access layer.
//!
//! Every fallible public operation returns [`Result<T>`]. The variants map
//! one-to-one onto the failure classes callers need to tell apart: a read
//! made while offline ([`Error::Transport`]), a server-side rejection with a
//! displayable message ([`Error::Api`]), and a write that could not even be
//! queued ([`Error::QueuePersistence`]), which means the write is lost.

use serde::Deserialize;
use thiserror::Error;

use crate::queue::backend::StorageError;

/// Fallback message when an error body cannot be parsed as JSON.
pub const REQUEST_FAILED: &str = "Request failed";

/// Fallback message when an upload error body cannot be parsed as JSON.
pub const UPLOAD_FAILED: &str = "Upload failed";

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the request client and the offline queue.
#[derive(Debug, Error)]
pub enum Error {
    /// No response was obtained (offline, DNS failure, connection reset, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    ///
    /// `message` is suitable for direct display to the user.
    #[error("{message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Human-readable message extracted from the response body.
        message: String,
    },

    /// The server answered but the response body could not be read in full.
    ///
    /// Not a transport failure: the server may already have applied a write,
    /// so the client does not queue it.
    #[error("Response from server was cut off (status {status}): {message}")]
    IncompleteResponse {
        /// HTTP status code from the status line.
        status: u16,
        /// Underlying read error.
        message: String,
    },

    /// A write failed to reach the server AND could not be queued.
    #[error("Write could not be queued for later delivery: {0}")]
    QueuePersistence(String),

    /// The offline queue could not be read or pruned.
    #[error("Queue storage error: {0}")]
    Storage(String),

    /// A body could not be serialized or a response could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an application-level error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a queue persistence error.
    pub fn queue_persistence(msg: impl Into<String>) -> Self {
        Self::QueuePersistence(msg.into())
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status when the server answered, `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::IncompleteResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure happened before any response was obtained.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(format!("TOML parse error: {}", err))
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Error body shapes produced by the API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Detail>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Detail {
    Message(String),
    Validation(Vec<ValidationEntry>),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct ValidationEntry {
    #[serde(default)]
    msg: Option<String>,
}

/// Extract one displayable message from an error response body.
///
/// - `{"detail": "text"}` yields `text`.
/// - `{"detail": [{"msg": "a"}, {"msg": "b"}]}` yields `a; b`.
/// - A JSON body without a usable `detail` yields the status reason phrase.
/// - A body that is not JSON yields `fallback`.
///
/// # Examples
///
/// ```
/// use fintrack_client::error::{extract_error_message, REQUEST_FAILED};
///
/// let body = br#"{"detail": [{"msg": "amount must be positive"}, {"msg": "date is required"}]}"#;
/// assert_eq!(
///     extract_error_message(422, body, REQUEST_FAILED),
///     "amount must be positive; date is required"
/// );
/// assert_eq!(extract_error_message(500, b"<html>", REQUEST_FAILED), "Request failed");
/// ```
pub fn extract_error_message(status: u16, body: &[u8], fallback: &str) -> String {
    let parsed: ErrorBody = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(_) => return fallback.to_string(),
    };

    let message = match parsed.detail {
        Some(Detail::Message(text)) => text,
        Some(Detail::Validation(entries)) => entries
            .into_iter()
            .filter_map(|entry| entry.msg)
            .collect::<Vec<_>>()
            .join("; "),
        Some(Detail::Other(_)) | None => String::new(),
    };

    if message.is_empty() {
        status_text(status)
    } else {
        message
    }
}

/// Canonical reason phrase for a status code.
fn status_text(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}
