//! Single-flight session refresh.
//!
//! When many requests see an expired session at once, exactly one renewal
//! call is made and every caller awaits that one outcome. Once the cycle
//! finishes the coordinator is idle again, so a later expiry starts a
//! brand-new renewal instead of reusing the old, already-resolved result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::client::http_middleware::{HttpRequest, RequestBody};
use crate::shared::transport::Transport;
use crate::types::Method;

type RefreshOutcome = Shared<BoxFuture<'static, bool>>;

#[derive(Default)]
struct RefreshState {
    /// Id of the most recently started cycle.
    cycle: u64,
    /// Outcome of the in-flight cycle. `Some` exactly while a renewal is in progress.
    in_flight: Option<RefreshOutcome>,
}

/// Clears the in-flight outcome when the renewal future finishes, panics or
/// is dropped, but only if it still belongs to the same cycle.
///
/// Holds the state weakly: the state owns the future that owns this guard.
struct ResetOnDrop {
    state: Weak<Mutex<RefreshState>>,
    cycle: u64,
}

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let finished = {
            let mut state = state.lock();
            if state.cycle == self.cycle {
                state.in_flight.take()
            } else {
                None
            }
        };
        // Dropped outside the lock: it may be the last handle to the renewal.
        drop(finished);
    }
}

/// De-duplicates concurrent session renewals.
///
/// One coordinator is owned by each [`ApiClient`](crate::client::ApiClient);
/// independent coordinators never share state.
pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    refresh_path: String,
    state: Arc<Mutex<RefreshState>>,
    renewals: AtomicU64,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_path", &self.refresh_path)
            .field("in_progress", &self.is_refreshing())
            .field("renewals", &self.renewal_count())
            .finish()
    }
}

impl RefreshCoordinator {
    /// Create an idle coordinator that renews through `refresh_path`.
    pub fn new(transport: Arc<dyn Transport>, refresh_path: impl Into<String>) -> Self {
        Self {
            transport,
            refresh_path: refresh_path.into(),
            state: Arc::new(Mutex::new(RefreshState::default())),
            renewals: AtomicU64::new(0),
        }
    }

    /// The renewal endpoint path.
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    /// Whether a renewal is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    /// Number of renewal calls started by this coordinator.
    pub fn renewal_count(&self) -> u64 {
        self.renewals.load(Ordering::SeqCst)
    }

    /// Renew the session, joining the in-flight renewal if there is one.
    ///
    /// Returns whether the session was renewed.
    pub async fn coordinate_refresh(&self) -> bool {
        let outcome = {
            let mut state = self.state.lock();
            match &state.in_flight {
                Some(in_flight) => {
                    tracing::debug!(cycle = state.cycle, "Joining in-flight session refresh");
                    in_flight.clone()
                },
                None => {
                    state.cycle += 1;
                    let reset = ResetOnDrop {
                        state: Arc::downgrade(&self.state),
                        cycle: state.cycle,
                    };
                    let outcome = Self::renew(
                        Arc::clone(&self.transport),
                        self.refresh_path.clone(),
                        reset,
                    )
                    .boxed()
                    .shared();
                    state.in_flight = Some(outcome.clone());
                    self.renewals.fetch_add(1, Ordering::SeqCst);
                    tracing::info!(cycle = state.cycle, "Starting session refresh");
                    outcome
                },
            }
        };
        outcome.await
    }

    async fn renew(transport: Arc<dyn Transport>, path: String, reset: ResetOnDrop) -> bool {
        let request = HttpRequest::new(Method::Post, path, RequestBody::None);
        let renewed = match transport.send(request).await {
            Ok(response) if response.is_success() => true,
            Ok(response) => {
                tracing::warn!(status = response.status, "Session refresh rejected");
                false
            },
            Err(e) => {
                tracing::warn!(error = %e, "Session refresh failed");
                false
            },
        };
        // Reset is the last step of the cycle, before any waiter resumes.
        drop(reset);
        renewed
    }
}
