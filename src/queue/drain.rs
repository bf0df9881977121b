//! Replay of queued writes once connectivity returns.
//!
//! A pass lists every record, sorts it into enqueue order and replays the
//! records one at a time through [`ApiClient::replay`]. A record is removed
//! only after the server accepted it or reported it as already applied.
//! The first record that fails for any other reason ends the pass, leaving
//! it and everything after it queued for the next pass.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::client::ApiClient;
use crate::error::Result;

/// What happened when one record was replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// 2xx.
    Delivered,
    /// Conflict status: the write had already been applied.
    AlreadyApplied,
    /// Any other status.
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },
    /// No response was obtained.
    Unreachable,
    /// The session could not be renewed. The sign-in redirect has been issued.
    Unauthorized,
    /// The request could not be built or was refused by middleware.
    Failed {
        /// Error description.
        message: String,
    },
}

impl ReplayOutcome {
    /// Whether the record can be removed from the queue.
    pub fn prunes(&self) -> bool {
        matches!(self, Self::Delivered | Self::AlreadyApplied)
    }
}

/// Drains the offline queue of one client.
#[derive(Debug)]
pub struct QueueDrainer {
    client: Arc<ApiClient>,
    pass: Mutex<()>,
}

impl QueueDrainer {
    /// Create a drainer for `client`'s queue.
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            pass: Mutex::new(()),
        }
    }

    /// The client records are replayed through.
    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Run one drain pass and return how many records were removed.
    ///
    /// Passes never overlap: a call made while another pass is running
    /// waits for it and then starts from the records that remain.
    ///
    /// # Errors
    ///
    /// [`Error::Storage`](crate::error::Error::Storage) if the queue cannot
    /// be listed or a delivered record cannot be removed. A record that fails to replay is not an error.
    pub async fn drain(&self) -> Result<usize> {
        let _pass = self.pass.lock().await;
        let queue = self.client.queue();
        let records = queue.sorted().await?;
        if records.is_empty() {
            return Ok(0);
        }

        tracing::info!(pending = records.len(), "Draining offline queue");
        let mut drained = 0;
        for record in &records {
            let outcome = self.client.replay(record).await;
            if !outcome.prunes() {
                tracing::warn!(
                    id = %record.id,
                    method = %record.method,
                    path = %record.path,
                    outcome = ?outcome,
                    remaining = records.len() - drained,
                    "Replay failed, stopping drain pass"
                );
                break;
            }
            tracing::debug!(id = %record.id, outcome = ?outcome, "Replayed queued write");
            if let Err(e) = queue.remove(&record.id).await {
                // Delivered but still stored: it is replayed again on the next pass.
                tracing::error!(
                    id = %record.id,
                    drained,
                    error = %e,
                    "Delivered write could not be removed from the queue"
                );
                return Err(e);
            }
            drained += 1;
        }

        tracing::info!(drained, "Drain pass finished");
        Ok(drained)
    }

    /// Drain on every offline to online transition signalled by `monitor`,
    /// and once at start if the monitor already reports online.
    ///
    /// The task ends when every handle to the monitor has been dropped.
    pub fn spawn(self: Arc<Self>, monitor: &ConnectivityMonitor) -> JoinHandle<()> {
        let mut signal = monitor.subscribe();
        tokio::spawn(async move {
            let mut handled: Option<u64> = None;
            loop {
                let state = *signal.borrow_and_update();
                if state.online && handled != Some(state.restorations) {
                    handled = Some(state.restorations);
                    if let Err(e) = self.drain().await {
                        tracing::error!(error = %e, "Drain pass failed");
                    }
                }
                if signal.changed().await.is_err() {
                    break;
                }
            }
            tracing::debug!("Connectivity monitor dropped, drain task exiting");
        })
    }
}

/// Snapshot of the connectivity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connectivity {
    /// Whether the host reports the network as available.
    pub online: bool,
    /// Number of offline to online transitions so far.
    pub restorations: u64,
}

/// Connectivity signal fed by the host environment.
///
/// Cloning yields another handle to the same signal.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<Connectivity>>,
}

impl ConnectivityMonitor {
    /// Create a monitor with an initial state.
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(Connectivity {
            online,
            restorations: 0,
        });
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Report the current network state. Repeating the same state is a no-op.
    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|state| {
            if state.online == online {
                return false;
            }
            state.online = online;
            if online {
                state.restorations += 1;
            }
            true
        });
    }

    /// Last reported network state.
    pub fn is_online(&self) -> bool {
        self.sender.borrow().online
    }

    /// Current snapshot.
    pub fn state(&self) -> Connectivity {
        *self.sender.borrow()
    }

    /// Receiver that observes every change.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.sender.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
