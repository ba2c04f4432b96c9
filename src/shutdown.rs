use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Process-wide trip wire. Once the cache backend is lost the server stops
/// taking requests and exits, leaving restarts to the supervisor.
#[derive(Debug, Clone, Default)]
pub struct FatalSignal {
    tripped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl FatalSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self, reason: &str) {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            tracing::error!("Fatal cache failure, shutting down: {}", reason);
            self.notify.notify_one();
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Resolves once `trip` has been called, even if that happened first.
    pub async fn wait(&self) {
        if self.is_tripped() {
            return;
        }
        self.notify.notified().await;
    }
}
