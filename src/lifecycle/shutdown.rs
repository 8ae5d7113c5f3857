//! Shutdown coordination for the relay.

use crate::lifecycle::cancel::Cancellation;

/// Coordinator for graceful shutdown.
///
/// Holds the root cancellation signal. The HTTP server drains on it and
/// every session derives its own signal from it.
pub struct Shutdown {
    root: Cancellation,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            root: Cancellation::new(),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> Cancellation {
        self.root.clone()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        tracing::info!("Shutdown triggered");
        self.root.cancel();
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
