//! Sign-in redirect seam.
//!
//! When the session cannot be renewed the client hands control to the host
//! environment through a [`Navigator`]: a browser shell changes location, a
//! desktop app swaps to its sign-in screen, a CLI prints a hint.

use parking_lot::Mutex;

/// Host hook invoked on unrecoverable authentication failure.
pub trait Navigator: Send + Sync {
    /// Send the user to `target` (the configured sign-in path).
    fn redirect(&self, target: &str);
}

/// Navigator that only logs. Default for headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn redirect(&self, target: &str) {
        tracing::warn!(target = %target, "Session expired; sign-in required");
    }
}

/// Navigator that records every redirect, for tests and embedding hosts
/// that poll instead of reacting to callbacks.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All redirect targets, oldest first.
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().clone()
    }

    /// Most recent redirect target.
    pub fn last(&self) -> Option<String> {
        self.redirects.lock().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, target: &str) {
        self.redirects.lock().push(target.to_string());
    }
}

impl<N: Navigator + ?Sized> Navigator for std::sync::Arc<N> {
    fn redirect(&self, target: &str) {
        (**self).redirect(target);
    }
}
