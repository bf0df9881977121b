//! # fintrack-client
//!
//! Network access layer for the FinTrack personal finance app. Every screen
//! sends its requests through one [`ApiClient`], which transparently
//! survives:
//!
//! - expired sessions, renewed through a single-flight
//!   [`RefreshCoordinator`] so a burst of concurrent 401s costs one renewal call;
//! - loss of connectivity, by accepting writes into a durable
//!   [`QueueStore`] and replaying them in order with a [`QueueDrainer`] once
//!   the host reports the network is back.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fintrack_client::{ApiClient, ClientConfig, ConnectivityMonitor, QueueDrainer};
//!
//! # async fn example() -> fintrack_client::Result<()> {
//! let client = Arc::new(ApiClient::new(ClientConfig::from_env())?);
//!
//! // Replay queued writes whenever the host reports the network is back.
//! let monitor = ConnectivityMonitor::new(true);
//! let drainer = Arc::new(QueueDrainer::new(Arc::clone(&client)));
//! let _task = drainer.spawn(&monitor);
//!
//! let summary = client.get::<serde_json::Value>("/dashboard/summary").await?;
//! println!("{:?}", summary);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod error;
#[cfg(feature = "logging")]
pub mod logging;
pub mod queue;
pub mod shared;
pub mod types;

pub use client::http_logging_middleware::HttpLoggingMiddleware;
pub use client::http_middleware::{HttpMiddleware, HttpMiddlewareChain};
pub use client::navigator::{LoggingNavigator, Navigator, RecordingNavigator};
pub use client::refresh::RefreshCoordinator;
pub use client::{ApiClient, ApiClientBuilder};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use queue::backend::{StorageBackend, StorageError};
pub use queue::drain::{Connectivity, ConnectivityMonitor, QueueDrainer, ReplayOutcome};
pub use queue::file::FileBackend;
pub use queue::memory::InMemoryBackend;
pub use queue::{QueueStore, QueuedWrite};
pub use shared::transport::{ReqwestTransport, Transport};
pub use types::{ApiResponse, Method, UploadForm, UploadPart, WriteMethod};

#[cfg(feature = "logging")]
pub use logging::init_logging;
